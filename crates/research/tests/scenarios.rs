//! End-to-end scenarios for the research loop.
//!
//! These drive `ResearchController` with scripted search and language-model
//! backends and check the whole request: queries issued, sources
//! registered, loop accounting, events, and the cited answer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use deepsift_config::{ModelSelection, ResearchBudget};
use deepsift_core::{
    Conversation, Error, LanguageModel, ProgressEvent, ProviderError, SearchHit, SearchProvider,
    StructuredRequest,
};
use deepsift_research::state::normalize_query;
use deepsift_research::{
    FinishReason, ResearchController, ResearchOutcome, ResearchRequest, RetryPolicy, Sufficiency,
};
use proptest::prelude::*;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ── Scripted backends ────────────────────────────────────────────────────

/// Answers from per-schema queues; summaries cite every hit by default.
#[derive(Default)]
struct ScriptedModel {
    queues: Mutex<HashMap<String, VecDeque<Value>>>,
    calls: Mutex<Vec<StructuredRequest>>,
}

impl ScriptedModel {
    fn with(mut self, schema_name: &str, response: Value) -> Self {
        self.queues
            .get_mut()
            .unwrap()
            .entry(schema_name.to_string())
            .or_default()
            .push_back(response);
        self
    }

    fn calls_for(&self, schema_name: &str) -> Vec<StructuredRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.schema_name == schema_name)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scenario_model"
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        let next = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.schema_name)
            .and_then(|q| q.pop_front());
        if let Some(value) = next {
            return Ok(value);
        }
        if request.schema_name == "GroundedSummary" {
            let cited: Vec<String> = request
                .prompt
                .lines()
                .filter_map(|l| {
                    let (n, title) = l.strip_prefix('[')?.split_once("] ")?;
                    n.parse::<u32>().ok()?;
                    Some(format!("{title} [{n}]."))
                })
                .collect();
            return Ok(json!({ "summary": cited.join(" ") }));
        }
        Err(ProviderError::MalformedOutput(format!(
            "scenario has no {} response",
            request.schema_name
        )))
    }
}

/// Fixed per-query results; unknown queries find nothing.
#[derive(Default)]
struct ScriptedSearch {
    results: HashMap<String, Result<Vec<SearchHit>, ProviderError>>,
    calls: Mutex<HashMap<String, u32>>,
    /// Signalled on every search; the search then never completes
    hang: Option<Arc<Notify>>,
}

impl ScriptedSearch {
    fn hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_string(), Ok(hits));
        self
    }

    fn error(mut self, query: &str, error: ProviderError) -> Self {
        self.results.insert(query.to_string(), Err(error));
        self
    }

    fn calls(&self, query: &str) -> u32 {
        self.calls.lock().unwrap().get(query).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scenario_search"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        *self.calls.lock().unwrap().entry(query.to_string()).or_insert(0) += 1;
        if let Some(started) = &self.hang {
            started.notify_one();
            std::future::pending::<()>().await;
        }
        self.results.get(query).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn request(question: &str, queries: u32, loops: u32) -> ResearchRequest {
    ResearchRequest::new(
        Conversation::from_question(question),
        ResearchBudget::new(queries, loops),
        ModelSelection::uniform("scenario-model"),
    )
}

async fn run(
    model: &Arc<ScriptedModel>,
    search: &Arc<ScriptedSearch>,
    request: ResearchRequest,
) -> Result<ResearchOutcome, Error> {
    ResearchController::new(model.clone(), search.clone())
        .with_retry_policy(RetryPolicy::immediate())
        .run(request, CancellationToken::new())
        .await
}

fn insufficient(gap: &str, follow_ups: &[&str]) -> Value {
    json!({"is_sufficient": false, "knowledge_gap": gap, "follow_up_queries": follow_ups})
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_pass_registers_both_hits_and_cites_a_subset() {
    let model = Arc::new(
        ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["capital of australia"]}))
            .with(
                "GroundedSummary",
                json!({"summary": "Canberra is the capital [1]. Sydney is the largest city [2]."}),
            )
            .with("ReflectionVerdict", json!({"is_sufficient": true}))
            .with("SynthesizedAnswer", json!({"answer": "The capital is Canberra [S1]."})),
    );
    let search = Arc::new(ScriptedSearch::default().hits(
        "capital of australia",
        vec![
            SearchHit::new("https://en.wikipedia.org/wiki/Canberra", "Canberra", "capital"),
            SearchHit::new("https://en.wikipedia.org/wiki/Sydney", "Sydney", "largest city"),
        ],
    ));

    let outcome = run(&model, &search, request("What is the capital of Australia?", 1, 1))
        .await
        .unwrap();

    assert_eq!(outcome.sources.len(), 2);
    assert_eq!(outcome.finish_reason, FinishReason::Sufficient);
    assert_eq!(outcome.is_sufficient, Sufficiency::Sufficient);
    assert_eq!(outcome.loop_count, 1);

    let registered: HashSet<_> = outcome.sources.iter().map(|s| s.id).collect();
    assert!(!outcome.answer.citations.is_empty());
    assert!(outcome.answer.citations.iter().all(|c| registered.contains(&c.id)));
}

#[tokio::test]
async fn budget_exhaustion_still_produces_an_answer() {
    let model = Arc::new(
        ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["q1"]}))
            .with("ReflectionVerdict", insufficient("more", &["q2"]))
            .with("ReflectionVerdict", insufficient("more", &["q3"]))
            .with("ReflectionVerdict", insufficient("still more", &["q4"]))
            .with("SynthesizedAnswer", json!({"answer": "Best effort answer [S1]."})),
    );
    let search = Arc::new(
        ScriptedSearch::default()
            .hits("q1", vec![SearchHit::new("https://one.dev", "One", "")])
            .hits("q2", vec![SearchHit::new("https://two.dev", "Two", "")])
            .hits("q3", vec![SearchHit::new("https://three.dev", "Three", "")]),
    );

    let outcome = run(&model, &search, request("Hard question", 1, 3)).await.unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::BudgetExhausted);
    assert_eq!(outcome.loop_count, 3);
    assert_eq!(outcome.research_iterations, 3);
    assert_eq!(outcome.is_sufficient, Sufficiency::Insufficient);
    assert_eq!(outcome.issued_queries, vec!["q1", "q2", "q3"]);
    assert_eq!(search.calls("q4"), 0);
    assert_eq!(model.calls_for("ReflectionVerdict").len(), 3);
    assert_eq!(outcome.answer.text, "Best effort answer [S1].");
}

#[tokio::test]
async fn duplicate_follow_up_is_never_reexecuted() {
    let model = Arc::new(
        ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["x"]}))
            .with("ReflectionVerdict", insufficient("gap", &["X "]))
            .with("ReflectionVerdict", insufficient("gap", &["x"]))
            .with("SynthesizedAnswer", json!({"answer": "Answer [S1]."})),
    );
    let search = Arc::new(
        ScriptedSearch::default().hits("x", vec![SearchHit::new("https://x.dev", "X", "")]),
    );

    let outcome = run(&model, &search, request("About x", 1, 2)).await.unwrap();

    assert_eq!(search.calls("x"), 1);
    assert_eq!(search.calls("X "), 0);
    assert_eq!(outcome.issued_queries, vec!["x"]);
    assert_eq!(outcome.research_iterations, 2);
    assert_eq!(outcome.loop_count, 2);
    assert_eq!(outcome.summaries.len(), 1);

    // The second reflection sees exactly the first iteration's summary
    let reflections = model.calls_for("ReflectionVerdict");
    assert_eq!(reflections[0].prompt, reflections[1].prompt);
}

#[tokio::test]
async fn auth_failure_on_one_task_is_absorbed() {
    let model = Arc::new(
        ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["good", "bad"]}))
            .with("ReflectionVerdict", json!({"is_sufficient": true}))
            .with("SynthesizedAnswer", json!({"answer": "From the good one [S1]."})),
    );
    let search = Arc::new(
        ScriptedSearch::default()
            .hits("good", vec![SearchHit::new("https://good.dev", "Good", "")])
            .error("bad", ProviderError::AuthenticationFailed("invalid key".into())),
    );

    let outcome = run(&model, &search, request("Mixed", 2, 1)).await.unwrap();

    assert_eq!(search.calls("bad"), 1);
    assert_eq!(outcome.summaries.len(), 1);
    assert_eq!(outcome.summaries[0].query, "good");
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].query, "bad");
    assert_eq!(outcome.answer.citations.len(), 1);
}

#[tokio::test]
async fn all_tasks_failing_ends_the_request() {
    let model = Arc::new(
        ScriptedModel::default().with("SearchQueryList", json!({"query": ["a", "b"]})),
    );
    let search = Arc::new(
        ScriptedSearch::default()
            .error("a", ProviderError::Network("unreachable".into()))
            .error("b", ProviderError::Timeout("10s".into())),
    );

    let controller = ResearchController::new(model.clone(), search.clone())
        .with_retry_policy(RetryPolicy::immediate());
    let mut rx = controller.event_bus().subscribe();
    let err = controller
        .run(request("Offline", 2, 2), CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::ResearchIterationFailed { iteration, failures } => {
            assert_eq!(iteration, 1);
            assert_eq!(failures.len(), 2);
        }
        other => panic!("expected ResearchIterationFailed, got {other:?}"),
    }
    // Transient failures get their single retry
    assert_eq!(search.calls("a"), 2);
    assert!(model.calls_for("ReflectionVerdict").is_empty());
    assert!(model.calls_for("SynthesizedAnswer").is_empty());

    let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert!(matches!(
        events.last().map(|e| e.as_ref()),
        Some(ProgressEvent::Errored { kind, .. }) if kind == "research_iteration_failed"
    ));
}

#[tokio::test]
async fn cancellation_stops_in_flight_searches() {
    let started = Arc::new(Notify::new());
    let model = Arc::new(
        ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["slow one", "slow two"]}))
            .with("ReflectionVerdict", json!({"is_sufficient": true}))
            .with("SynthesizedAnswer", json!({"answer": "never"})),
    );
    let search = Arc::new(ScriptedSearch {
        hang: Some(started.clone()),
        ..Default::default()
    });

    let controller = ResearchController::new(model.clone(), search.clone());
    let cancel = CancellationToken::new();
    let (result, ()) = tokio::join!(
        controller.run(request("Slow", 2, 2), cancel.clone()),
        async {
            started.notified().await;
            cancel.cancel();
        }
    );

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(model.calls_for("GroundedSummary").is_empty());
    assert!(model.calls_for("SynthesizedAnswer").is_empty());
}

#[tokio::test]
async fn zero_budget_answers_without_research() {
    for (queries, loops) in [(0, 3), (3, 0)] {
        let model = Arc::new(
            ScriptedModel::default()
                .with("SynthesizedAnswer", json!({"answer": "Paris [S1]."})),
        );
        let search = Arc::new(ScriptedSearch::default());

        let outcome = run(&model, &search, request("Capital of France?", queries, loops))
            .await
            .unwrap();

        assert_eq!(outcome.finish_reason, FinishReason::NoResearch);
        assert_eq!(outcome.loop_count, 0);
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.answer.text, "Paris.");
        assert!(model.calls_for("SearchQueryList").is_empty());
        assert_eq!(outcome.is_sufficient, Sufficiency::Unknown);
    }
}

#[tokio::test]
async fn insufficient_without_proposals_finalizes_early() {
    let model = Arc::new(
        ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["only query"]}))
            .with("ReflectionVerdict", insufficient("unknowable", &[]))
            .with("SynthesizedAnswer", json!({"answer": "Partial."})),
    );
    let search = Arc::new(ScriptedSearch::default());

    let outcome = run(&model, &search, request("Unknowable", 1, 5)).await.unwrap();
    assert_eq!(outcome.finish_reason, FinishReason::NoFollowUps);
    assert_eq!(outcome.loop_count, 1);
    assert_eq!(outcome.research_iterations, 1);
}

#[tokio::test]
async fn conversation_history_reaches_query_generation() {
    let model = Arc::new(
        ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["ferris mascot origin"]}))
            .with("ReflectionVerdict", json!({"is_sufficient": true}))
            .with("SynthesizedAnswer", json!({"answer": "Ferris."})),
    );
    let search = Arc::new(ScriptedSearch::default());
    let conversation: Conversation = [
        deepsift_core::Turn::user("What is Rust's mascot?"),
        deepsift_core::Turn::assistant("A crab named Ferris."),
        deepsift_core::Turn::user("Where did it come from?"),
    ]
    .into_iter()
    .collect();

    run(
        &model,
        &search,
        ResearchRequest::new(conversation, ResearchBudget::new(1, 1), ModelSelection::uniform("m")),
    )
    .await
    .unwrap();

    let prompt = &model.calls_for("SearchQueryList")[0].prompt;
    assert!(prompt.contains("A crab named Ferris."));
    assert!(prompt.contains("Where did it come from?"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn loop_count_never_exceeds_budget(
        initial in 1u32..4,
        max_loops in 1u32..5,
        verdicts in proptest::collection::vec(proptest::bool::ANY, 6),
    ) {
        let mut model = ScriptedModel::default()
            .with("SearchQueryList", json!({"query": ["seed a", "seed b", "seed c"]}));
        for (i, sufficient) in verdicts.iter().enumerate() {
            let verdict = if *sufficient {
                json!({"is_sufficient": true})
            } else {
                // The first follow-up repeats a seed to exercise the filter
                let follow = format!("follow {i}");
                insufficient("gap", &["SEED A", follow.as_str()])
            };
            model = model.with("ReflectionVerdict", verdict);
        }
        let model = Arc::new(model.with("SynthesizedAnswer", json!({"answer": "ok"})));
        let search = Arc::new(ScriptedSearch::default());

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let outcome = runtime
            .block_on(run(&model, &search, request("prop", initial, max_loops)))
            .unwrap();

        prop_assert!(outcome.loop_count <= max_loops);
        prop_assert!(outcome.loop_count >= 1);

        let normalized: HashSet<String> =
            outcome.issued_queries.iter().map(|q| normalize_query(q)).collect();
        prop_assert_eq!(normalized.len(), outcome.issued_queries.len());
    }
}
