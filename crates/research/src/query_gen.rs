//! Query generation for the first research iteration.

use deepsift_core::provider::generate;
use deepsift_core::{Error, LanguageModel, Stage};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::prompts;
use crate::retry::{RetryPolicy, with_retry};
use crate::state::ResearchState;

/// Structured output of the query-writing call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchQueryList {
    /// Search queries to run
    pub query: Vec<String>,
    /// Why these queries are relevant
    #[serde(default)]
    pub rationale: String,
}

/// Queries for one iteration, already filtered against the issued set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedQueries {
    pub queries: Vec<String>,
    pub rationale: String,
}

/// Turns the conversation into a batch of novel web search queries.
pub struct QueryGenerator {
    /// The LLM backend to use
    model: Arc<dyn LanguageModel>,

    /// Model name passed to the backend
    model_name: String,

    retry: RetryPolicy,
}

impl QueryGenerator {
    const TEMPERATURE: f32 = 1.0;

    pub fn new(model: Arc<dyn LanguageModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Produce up to `count` distinct queries not yet issued in `state`.
    ///
    /// A shortfall after filtering is accepted.
    pub async fn generate(
        &self,
        state: &ResearchState,
        count: usize,
        knowledge_gap: Option<&str>,
    ) -> Result<GeneratedQueries, Error> {
        if count == 0 {
            return Ok(GeneratedQueries::default());
        }

        let prompt = prompts::query_writer(
            &state.research_topic(),
            count,
            knowledge_gap,
            state.issued_queries(),
            &prompts::current_date(),
        );

        let output: SearchQueryList = with_retry(self.retry, "query_generation", || {
            generate(
                self.model.as_ref(),
                &self.model_name,
                prompt.clone(),
                Self::TEMPERATURE,
            )
        })
        .await
        .map_err(|e| Error::generation(Stage::QueryGeneration, e))?;

        let proposed = output.query.len();
        let queries = state.novel_queries(output.query, count);
        if queries.len() < count {
            debug!(
                requested = count,
                proposed,
                accepted = queries.len(),
                "Query generation fell short after filtering"
            );
        }
        info!(count = queries.len(), "Generated search queries");

        Ok(GeneratedQueries {
            queries,
            rationale: output.rationale.trim().to_string(),
        })
    }
}
