//! Web Research Executor: one search-and-summarize task per active query.
//!
//! Tasks run concurrently inside a single `join_all` barrier owned by the
//! caller. Dropping the returned future drops every in-flight task with it,
//! which is how cancellation reaches the fan-out.

use deepsift_core::provider::generate;
use deepsift_core::{LanguageModel, ProviderError, SearchHit, SearchProvider, SourceId, TaskFailure};
use futures::future::join_all;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::citation;
use crate::prompts;
use crate::registry::{SourceRegistry, normalize_url};
use crate::retry::{RetryPolicy, with_retry};
use crate::state::QuerySummary;

/// Structured output of the summarizing call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GroundedSummary {
    /// Summary text citing hits by number, e.g. [1] or [2, 3]
    pub summary: String,
}

/// What one iteration's fan-out produced.
#[derive(Debug, Default)]
pub struct IterationReport {
    /// Successful summaries, in active-query order
    pub summaries: Vec<QuerySummary>,
    pub failures: Vec<TaskFailure>,
}

impl IterationReport {
    /// True when tasks ran and none of them succeeded.
    pub fn all_failed(&self) -> bool {
        self.summaries.is_empty() && !self.failures.is_empty()
    }
}

pub struct WebResearchExecutor {
    search: Arc<dyn SearchProvider>,
    model: Arc<dyn LanguageModel>,
    model_name: String,
    retry: RetryPolicy,
}

impl WebResearchExecutor {
    const TEMPERATURE: f32 = 0.0;

    pub fn new(
        search: Arc<dyn SearchProvider>,
        model: Arc<dyn LanguageModel>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            search,
            model,
            model_name: model_name.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run every query concurrently and wait for all of them.
    ///
    /// A task failure is recorded and never aborts its siblings.
    pub async fn execute(
        &self,
        iteration: u32,
        queries: &[String],
        registry: &SourceRegistry,
    ) -> IterationReport {
        let date = prompts::current_date();
        let tasks = queries
            .iter()
            .map(|query| self.run_task(iteration, query, registry, &date));
        let outcomes = join_all(tasks).await;

        let mut report = IterationReport::default();
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(summary) => report.summaries.push(summary),
                Err(e) => {
                    warn!(iteration, query = %query, error = %e, "Search task failed");
                    report.failures.push(TaskFailure {
                        query: query.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            iteration,
            succeeded = report.summaries.len(),
            failed = report.failures.len(),
            sources = registry.len(),
            "Research iteration complete"
        );
        report
    }

    async fn run_task(
        &self,
        iteration: u32,
        query: &str,
        registry: &SourceRegistry,
        date: &str,
    ) -> Result<QuerySummary, ProviderError> {
        let hits = with_retry(self.retry, self.search.name(), || self.search.search(query)).await?;
        let hits = dedupe_hits(hits);
        debug!(query, hits = hits.len(), provider = self.search.name(), "Search returned");

        if hits.is_empty() {
            return Ok(QuerySummary {
                iteration,
                query: query.to_string(),
                summary: format!("No results found for: {query}"),
                sources: Vec::new(),
            });
        }

        let prompt = prompts::summarizer(query, &hits, date);
        let (model, model_name, prompt) = (self.model.as_ref(), self.model_name.as_str(), &prompt);
        let output = with_retry(self.retry, "summarization", || async move {
            let output: GroundedSummary =
                generate(model, model_name, prompt.clone(), Self::TEMPERATURE).await?;
            if output.summary.trim().is_empty() {
                return Err(ProviderError::MalformedOutput("empty summary".into()));
            }
            Ok::<_, ProviderError>(output)
        })
        .await?;

        // Hits the summary actually cites; an uncited summary used all of them
        let mut cited: Vec<usize> = citation::local_refs(&output.summary)
            .into_iter()
            .filter(|n| (1..=hits.len()).contains(n))
            .collect();
        if cited.is_empty() {
            cited = (1..=hits.len()).collect();
        }

        let mut ids: HashMap<usize, SourceId> = HashMap::new();
        let mut sources = Vec::with_capacity(cited.len());
        for n in cited {
            let hit = &hits[n - 1];
            let id = registry.upsert(&hit.url, &hit.title, &hit.snippet);
            ids.insert(n, id);
            if !sources.contains(&id) {
                sources.push(id);
            }
        }

        let summary = citation::rewrite_local(output.summary.trim(), |n| ids.get(&n).copied());
        Ok(QuerySummary {
            iteration,
            query: query.to_string(),
            summary,
            sources,
        })
    }
}

/// Drop hits without a URL and repeats of an already-seen normalized URL.
fn dedupe_hits(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| !h.url.trim().is_empty() && seen.insert(normalize_url(&h.url)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedModel, ScriptedSearch};
    use serde_json::json;

    fn executor(search: Arc<ScriptedSearch>, model: Arc<ScriptedModel>) -> WebResearchExecutor {
        WebResearchExecutor::new(search, model, "summary-model")
            .with_retry_policy(RetryPolicy::immediate())
    }

    #[tokio::test]
    async fn summary_markers_become_source_ids() {
        let search = Arc::new(ScriptedSearch::new());
        search.respond(
            "rust editions",
            vec![
                SearchHit::new("https://a.dev/", "A", "alpha"),
                SearchHit::new("https://b.dev", "B", "beta"),
                SearchHit::new("https://c.dev", "C", "gamma"),
            ],
        );
        let model = Arc::new(ScriptedModel::new());
        model.push(
            "GroundedSummary",
            Ok(json!({"summary": "Editions ship every three years [3]. The first was 2015 [1, 9]."})),
        );

        let registry = SourceRegistry::new();
        let report = executor(search, model.clone())
            .execute(1, &["rust editions".to_string()], &registry)
            .await;

        assert!(report.failures.is_empty());
        let summary = &report.summaries[0];
        assert_eq!(registry.len(), 2);
        let c = registry.lookup("https://c.dev").unwrap();
        let a = registry.lookup("https://a.dev").unwrap();
        assert_eq!(summary.sources, vec![c, a]);
        assert_eq!(
            summary.summary,
            format!("Editions ship every three years [{c}]. The first was 2015 [{a}].")
        );
        assert!(model.calls()[0].temperature.abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn uncited_summary_registers_every_hit() {
        let search = Arc::new(ScriptedSearch::new());
        search.respond(
            "q",
            vec![
                SearchHit::new("https://a.dev", "A", ""),
                SearchHit::new("https://a.dev/#top", "A again", ""),
                SearchHit::new("", "no url", ""),
                SearchHit::new("https://b.dev", "B", ""),
            ],
        );
        let model = Arc::new(ScriptedModel::new());
        model.push("GroundedSummary", Ok(json!({"summary": "Plain text."})));

        let registry = SourceRegistry::new();
        let report = executor(search, model)
            .execute(1, &["q".to_string()], &registry)
            .await;
        assert_eq!(registry.len(), 2);
        assert_eq!(report.summaries[0].sources.len(), 2);
    }

    #[tokio::test]
    async fn empty_results_skip_the_model() {
        let search = Arc::new(ScriptedSearch::new());
        let model = Arc::new(ScriptedModel::new());
        let registry = SourceRegistry::new();
        let report = executor(search, model.clone())
            .execute(2, &["obscure".to_string()], &registry)
            .await;
        assert_eq!(report.summaries[0].summary, "No results found for: obscure");
        assert_eq!(report.summaries[0].iteration, 2);
        assert!(model.calls().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_sink_the_iteration() {
        let search = Arc::new(ScriptedSearch::new());
        search.respond("good", vec![SearchHit::new("https://a.dev", "A", "")]);
        search.fail("bad", ProviderError::AuthenticationFailed("invalid token".into()));
        let model = Arc::new(ScriptedModel::new());

        let registry = SourceRegistry::new();
        let queries = vec!["good".to_string(), "bad".to_string()];
        let report = executor(search.clone(), model).execute(1, &queries, &registry).await;

        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].query, "bad");
        assert!(!report.all_failed());
        assert_eq!(search.calls("bad"), 1);
    }

    #[tokio::test]
    async fn network_failure_retried_once() {
        let search = Arc::new(ScriptedSearch::new());
        search.fail("flaky", ProviderError::Network("connection reset".into()));
        let model = Arc::new(ScriptedModel::new());
        let registry = SourceRegistry::new();
        let report = executor(search.clone(), model)
            .execute(1, &["flaky".to_string()], &registry)
            .await;
        assert!(report.all_failed());
        assert_eq!(search.calls("flaky"), 2);
    }

    #[tokio::test]
    async fn empty_query_set_is_not_a_failure() {
        let report = executor(Arc::new(ScriptedSearch::new()), Arc::new(ScriptedModel::new()))
            .execute(3, &[], &SourceRegistry::new())
            .await;
        assert!(report.summaries.is_empty());
        assert!(!report.all_failed());
    }
}
