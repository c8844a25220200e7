//! `deepsift ask`: Research one question and print the cited answer.

use deepsift_config::{
    AppConfig, EffortTier, LlmProviderKind, Overrides, ResearchBudget, SearchProviderKind,
};
use deepsift_core::{Conversation, ProgressEvent};
use deepsift_research::{ResearchController, ResearchOutcome, ResearchRequest};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

pub struct AskArgs {
    pub question: String,
    pub effort: Option<EffortTier>,
    pub queries: Option<u32>,
    pub loops: Option<u32>,
    pub search: Option<SearchProviderKind>,
    pub llm: Option<LlmProviderKind>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub json: bool,
}

pub async fn run(args: AskArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.question.trim().is_empty() {
        return Err("The question is empty.".into());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let overrides = Overrides {
        llm_provider: args.llm,
        search_provider: args.search,
        model: args.model.clone(),
        base_url: args.base_url.clone(),
    };
    let providers = config.provider_config(&overrides)?;
    let budget = resolve_budget(&config, args.effort, args.queries, args.loops);

    let model = deepsift_providers::build_language_model(&providers.llm)?;
    let search = deepsift_search::build_search_provider(&providers.search)?;
    let controller = ResearchController::new(model, search);
    tracing::debug!(
        search = %providers.search.kind(),
        llm = %providers.llm.kind(),
        queries = budget.initial_query_count,
        loops = budget.max_loops,
        "Providers built"
    );

    if !args.json {
        eprintln!();
        eprintln!("  Search:  {}", providers.search.kind());
        eprintln!("  LLM:     {}", providers.llm.kind());
        eprintln!(
            "  Budget:  {} queries, {} loops",
            budget.initial_query_count, budget.max_loops
        );
        eprintln!();
    }

    // Timeline on stderr until the controller (and its bus) is dropped
    let mut rx = controller.event_bus().subscribe();
    let timeline = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => eprintln!("  {}", describe(&event)),
                Err(RecvError::Lagged(n)) => eprintln!("  ... {n} events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("  Cancelling...");
                cancel.cancel();
            }
        })
    };

    let request = ResearchRequest::new(
        Conversation::from_question(args.question.trim()),
        budget,
        providers.llm.models().clone(),
    );
    let result = controller.run(request, cancel).await;

    ctrl_c.abort();
    drop(controller);
    let _ = timeline.await;

    let outcome = result?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", render_answer(&outcome));
    }
    Ok(())
}

/// Explicit counts win over the effort tier; the tier wins over config.
fn resolve_budget(
    config: &AppConfig,
    effort: Option<EffortTier>,
    queries: Option<u32>,
    loops: Option<u32>,
) -> ResearchBudget {
    match effort {
        Some(tier) => ResearchBudget::resolve(tier, queries, loops),
        None => {
            let base = config.budget();
            ResearchBudget::new(
                queries.unwrap_or(base.initial_query_count),
                loops.unwrap_or(base.max_loops),
            )
        }
    }
}

/// One timeline line per progress event.
fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Generating {
            iteration, queries, ..
        } => {
            if queries.is_empty() {
                format!("[{iteration}] No new queries")
            } else {
                format!("[{iteration}] Searching: {}", queries.join(" | "))
            }
        }
        ProgressEvent::Researching {
            iteration,
            source_count,
            sample_labels,
            failed_tasks,
        } => {
            let mut line = format!("[{iteration}] {source_count} sources");
            if !sample_labels.is_empty() {
                line.push_str(&format!(" (e.g. {})", sample_labels.join(", ")));
            }
            if *failed_tasks > 0 {
                line.push_str(&format!(", {failed_tasks} failed"));
            }
            line
        }
        ProgressEvent::Reflecting {
            loop_count,
            is_sufficient,
            knowledge_gap,
            ..
        } => {
            if *is_sufficient {
                format!("Reflection {loop_count}: sufficient")
            } else if knowledge_gap.is_empty() {
                format!("Reflection {loop_count}: needs more research")
            } else {
                format!("Reflection {loop_count}: missing {knowledge_gap}")
            }
        }
        ProgressEvent::Finalizing { summary_count } => {
            format!("Writing answer from {summary_count} summaries")
        }
        ProgressEvent::Done { cited_sources } => format!("Done, {cited_sources} sources cited"),
        ProgressEvent::Errored { kind, message } => format!("Failed ({kind}): {message}"),
    }
}

/// The answer followed by the sources it cites.
fn render_answer(outcome: &ResearchOutcome) -> String {
    let mut out = format!("\n{}\n", outcome.answer.text);
    if !outcome.answer.citations.is_empty() {
        out.push_str("\nSources:\n");
        for source in &outcome.answer.citations {
            out.push_str(&format!("  [{}] {} - {}\n", source.id, source.label, source.url));
        }
    }
    out
}
