//! Loop Controller: drives one research request from question to answer.
//!
//! ```text
//! Init → Generating → Researching → Reflecting ─┬─→ Finalizing → Done
//!                          ↑                     │
//!                          └────── Looping ←─────┘
//! ```
//!
//! `Errored` is reachable from every state. The controller owns the
//! [`ResearchState`] exclusively and mutates it only between awaits.

use chrono::{DateTime, Utc};
use deepsift_config::{ModelSelection, ResearchBudget};
use deepsift_core::{
    Conversation, Error, EventBus, LanguageModel, ProgressEvent, SearchProvider, Source, TaskFailure,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::executor::{IterationReport, WebResearchExecutor};
use crate::finalizer::AnswerFinalizer;
use crate::query_gen::QueryGenerator;
use crate::reflection::ReflectionEngine;
use crate::retry::RetryPolicy;
use crate::state::{FinalAnswer, Phase, QuerySummary, ResearchState, Sufficiency};

/// Labels shown per iteration in a `Researching` event.
const SAMPLE_LABELS: usize = 3;

/// Everything one request needs beyond the capability backends.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub conversation: Conversation,
    pub budget: ResearchBudget,
    pub models: ModelSelection,
}

impl ResearchRequest {
    pub fn new(conversation: Conversation, budget: ResearchBudget, models: ModelSelection) -> Self {
        Self {
            conversation,
            budget,
            models,
        }
    }
}

/// Why the loop stopped researching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Reflection judged the research sufficient
    Sufficient,
    /// `max_loops` reflections ran without a sufficient verdict
    BudgetExhausted,
    /// Reflection was insufficient but proposed nothing to search
    NoFollowUps,
    /// The budget disabled research
    NoResearch,
}

/// The result of a completed request.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    pub request_id: Uuid,
    pub answer: FinalAnswer,
    pub finish_reason: FinishReason,
    pub loop_count: u32,
    pub research_iterations: u32,
    pub is_sufficient: Sufficiency,
    pub issued_queries: Vec<String>,
    /// Every registered source, cited or not
    pub sources: Vec<Source>,
    pub summaries: Vec<QuerySummary>,
    pub failures: Vec<TaskFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Orchestrates query generation, fan-out, reflection, and finalization.
pub struct ResearchController {
    /// The LLM backend serving every generation step
    model: Arc<dyn LanguageModel>,

    /// The search backend for the fan-out
    search: Arc<dyn SearchProvider>,

    /// Progress events for observers
    events: EventBus,

    retry: RetryPolicy,
}

impl ResearchController {
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            model,
            search,
            events: EventBus::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Run a request to completion.
    ///
    /// Cancelling `cancel` abandons the request at the next await; in-flight
    /// search tasks are dropped and no answer is produced.
    pub async fn run(
        &self,
        request: ResearchRequest,
        cancel: CancellationToken,
    ) -> Result<ResearchOutcome, Error> {
        let request_id = Uuid::new_v4();
        let span = info_span!("research", %request_id);
        self.run_inner(request_id, request, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        request_id: Uuid,
        request: ResearchRequest,
        cancel: CancellationToken,
    ) -> Result<ResearchOutcome, Error> {
        let started_at = Utc::now();
        let ResearchRequest {
            conversation,
            budget,
            models,
        } = request;
        info!(
            initial_queries = budget.initial_query_count,
            max_loops = budget.max_loops,
            search = self.search.name(),
            model = self.model.name(),
            "Research request started"
        );

        let mut state = ResearchState::new(conversation, budget);
        match self.drive(&mut state, &models, &cancel).await {
            Ok((finish_reason, answer)) => {
                info!(
                    ?finish_reason,
                    loop_count = state.loop_count,
                    sources = state.sources.len(),
                    cited = answer.citations.len(),
                    "Research request done"
                );
                Ok(ResearchOutcome {
                    request_id,
                    answer,
                    finish_reason,
                    loop_count: state.loop_count,
                    research_iterations: state.iteration,
                    is_sufficient: state.is_sufficient,
                    issued_queries: state.issued_queries().to_vec(),
                    sources: state.sources.snapshot(),
                    summaries: std::mem::take(&mut state.summaries),
                    failures: std::mem::take(&mut state.failures),
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                let from = state.phase;
                state.phase = Phase::Errored;
                if matches!(e, Error::Cancelled) {
                    warn!(?from, "Research request cancelled");
                } else {
                    error!(?from, kind = e.kind(), error = %e, "Research request failed");
                }
                self.events.publish(ProgressEvent::Errored {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        state: &mut ResearchState,
        models: &ModelSelection,
        cancel: &CancellationToken,
    ) -> Result<(FinishReason, FinalAnswer), Error> {
        let budget = ResearchBudget::new(state.initial_query_count, state.max_loops);
        let finish_reason = if budget.allows_research() {
            self.research(state, models, cancel).await?
        } else {
            info!("Research budget is zero, answering from the conversation");
            FinishReason::NoResearch
        };

        state.phase = Phase::Finalizing;
        self.events.publish(ProgressEvent::Finalizing {
            summary_count: state.summaries.len(),
        });
        let finalizer = AnswerFinalizer::new(self.model.clone(), &models.answer_model)
            .with_retry_policy(self.retry);
        let answer = guard(cancel, finalizer.finalize(state)).await?;

        let answer = state.finish(answer).clone();
        self.events.publish(ProgressEvent::Done {
            cited_sources: answer.citations.len(),
        });
        Ok((finish_reason, answer))
    }

    /// The Generating → Researching → Reflecting loop.
    async fn research(
        &self,
        state: &mut ResearchState,
        models: &ModelSelection,
        cancel: &CancellationToken,
    ) -> Result<FinishReason, Error> {
        let generator = QueryGenerator::new(self.model.clone(), &models.query_model)
            .with_retry_policy(self.retry);
        let executor =
            WebResearchExecutor::new(self.search.clone(), self.model.clone(), &models.query_model)
                .with_retry_policy(self.retry);
        let reflection = ReflectionEngine::new(self.model.clone(), &models.reflection_model)
            .with_retry_policy(self.retry);

        state.phase = Phase::Generating;
        let generated = guard(cancel, generator.generate(state, state.breadth(), None)).await?;
        state.begin_iteration(generated.queries);
        self.publish_generating(state, generated.rationale);

        loop {
            state.phase = Phase::Researching;
            let report = guard(cancel, async {
                Ok(executor
                    .execute(state.iteration, &state.active_queries, &state.sources)
                    .await)
            })
            .await?;
            self.absorb(state, report)?;

            state.phase = Phase::Reflecting;
            let verdict = guard(cancel, reflection.reflect(state)).await?;
            state.record_reflection(
                verdict.is_sufficient,
                verdict.knowledge_gap.clone(),
                verdict.follow_up_queries.clone(),
            );
            self.events.publish(ProgressEvent::Reflecting {
                loop_count: state.loop_count,
                is_sufficient: verdict.is_sufficient,
                knowledge_gap: verdict.knowledge_gap,
                follow_up_queries: verdict.follow_up_queries,
            });

            if verdict.is_sufficient {
                return Ok(FinishReason::Sufficient);
            }
            if state.loop_count >= state.max_loops {
                info!(loop_count = state.loop_count, "Loop budget exhausted");
                return Ok(FinishReason::BudgetExhausted);
            }
            if verdict.proposed == 0 {
                info!("Reflection proposed no follow-up queries");
                return Ok(FinishReason::NoFollowUps);
            }

            state.phase = Phase::Looping;
            let follow_ups = std::mem::take(&mut state.pending_follow_ups);
            state.begin_iteration(follow_ups);
            let rationale = state.knowledge_gap.clone().unwrap_or_default();
            self.publish_generating(state, rationale);
        }
    }

    /// Fold one iteration's report into the state.
    fn absorb(&self, state: &mut ResearchState, report: IterationReport) -> Result<(), Error> {
        if report.all_failed() {
            return Err(Error::ResearchIterationFailed {
                iteration: state.iteration,
                failures: report.failures,
            });
        }

        let mut sample_labels: Vec<String> = Vec::new();
        for id in report.summaries.iter().flat_map(|s| &s.sources) {
            if sample_labels.len() == SAMPLE_LABELS {
                break;
            }
            if let Some(source) = state.sources.resolve(*id)
                && !sample_labels.contains(&source.label)
            {
                sample_labels.push(source.label);
            }
        }

        let failed_tasks = report.failures.len();
        state.summaries.extend(report.summaries);
        state.failures.extend(report.failures);
        self.events.publish(ProgressEvent::Researching {
            iteration: state.iteration,
            source_count: state.sources.len(),
            sample_labels,
            failed_tasks,
        });
        Ok(())
    }

    fn publish_generating(&self, state: &ResearchState, rationale: String) {
        info!(
            iteration = state.iteration,
            queries = ?state.active_queries,
            "Research iteration queued"
        );
        self.events.publish(ProgressEvent::Generating {
            iteration: state.iteration,
            queries: state.active_queries.clone(),
            rationale,
        });
    }
}

/// Await `fut` unless `cancel` fires first.
async fn guard<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
