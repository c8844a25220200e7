//! Reflection Engine: decides whether the gathered research is enough.

use deepsift_core::provider::generate;
use deepsift_core::{Error, LanguageModel, Stage};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::prompts;
use crate::retry::{RetryPolicy, with_retry};
use crate::state::ResearchState;

/// Structured output of the reflection call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReflectionVerdict {
    /// Whether the summaries answer the question
    pub is_sufficient: bool,
    /// What is missing, if anything
    #[serde(default)]
    pub knowledge_gap: String,
    /// Queries that would close the gap
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    pub is_sufficient: bool,
    pub knowledge_gap: String,
    /// Non-empty follow-ups the model proposed, before duplicate filtering
    pub proposed: usize,
    /// Novel follow-ups, at most the per-iteration breadth; empty when sufficient
    pub follow_up_queries: Vec<String>,
}

pub struct ReflectionEngine {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    retry: RetryPolicy,
}

impl ReflectionEngine {
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

    /// Judge every summary gathered so far.
    pub async fn reflect(&self, state: &ResearchState) -> Result<Reflection, Error> {
        let breadth = state.breadth().max(1);
        let prompt = prompts::reflection(
            &state.research_topic(),
            &state.summaries,
            breadth,
            &prompts::current_date(),
        );

        let verdict: ReflectionVerdict = with_retry(self.retry, "reflection", || {
            generate(
                self.model.as_ref(),
                &self.model_name,
                prompt.clone(),
                Self::TEMPERATURE,
            )
        })
        .await
        .map_err(|e| Error::generation(Stage::Reflection, e))?;

        let proposed = verdict
            .follow_up_queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .count();
        let follow_up_queries = if verdict.is_sufficient {
            Vec::new()
        } else {
            state.novel_queries(verdict.follow_up_queries, breadth)
        };

        info!(
            loop_count = state.loop_count + 1,
            is_sufficient = verdict.is_sufficient,
            proposed,
            follow_ups = follow_up_queries.len(),
            "Reflection complete"
        );

        Ok(Reflection {
            is_sufficient: verdict.is_sufficient,
            knowledge_gap: verdict.knowledge_gap.trim().to_string(),
            proposed,
            follow_up_queries,
        })
    }
}
