//! Answer Finalizer: synthesizes the cited answer from all summaries.
//!
//! The registry is the only authority on valid ids: markers the answer
//! model invents are stripped before the answer leaves this module.

use deepsift_core::provider::generate;
use deepsift_core::{Error, LanguageModel, ProviderError, Stage};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::citation;
use crate::prompts;
use crate::registry::SourceRegistry;
use crate::retry::{RetryPolicy, with_retry};
use crate::state::{FinalAnswer, ResearchState};

/// Structured output of the answer call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SynthesizedAnswer {
    /// Final answer with inline [S#] citations
    pub answer: String,
}

pub struct AnswerFinalizer {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    retry: RetryPolicy,
}

impl AnswerFinalizer {
    const TEMPERATURE: f32 = 0.0;

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

    pub async fn finalize(&self, state: &ResearchState) -> Result<FinalAnswer, Error> {
        let prompt = prompts::answer(
            &state.research_topic(),
            &state.summaries,
            &state.sources.snapshot(),
            &prompts::current_date(),
        );

        let (model, model_name, prompt) = (self.model.as_ref(), self.model_name.as_str(), &prompt);
        let raw = with_retry(self.retry, "finalization", || async move {
            let output: SynthesizedAnswer =
                generate(model, model_name, prompt.clone(), Self::TEMPERATURE).await?;
            if output.answer.trim().is_empty() {
                return Err(ProviderError::MalformedOutput("empty answer".into()));
            }
            Ok(output.answer)
        })
        .await
        .map_err(|e| Error::generation(Stage::Finalization, e))?;

        let answer = compile_answer(&raw, &state.sources);
        info!(
            cited = answer.citations.len(),
            available = state.sources.len(),
            "Answer finalized"
        );
        Ok(answer)
    }
}

/// Strip markers the registry cannot resolve and list the cited sources
/// in order of first citation.
pub fn compile_answer(raw: &str, registry: &SourceRegistry) -> FinalAnswer {
    let (text, dropped) = citation::retain_known(raw.trim(), |id| registry.contains(id));
    if !dropped.is_empty() {
        warn!(dropped = ?dropped, "Removed citation markers with no matching source");
    }

    let citations = citation::source_refs(&text)
        .into_iter()
        .filter_map(|id| registry.resolve(id))
        .collect();

    FinalAnswer { text, citations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::QuerySummary;
    use crate::test_helpers::ScriptedModel;
    use deepsift_config::ResearchBudget;
    use deepsift_core::{Conversation, SourceId};
    use proptest::prelude::*;
    use serde_json::json;

    fn registry_with(n: u32) -> SourceRegistry {
        let registry = SourceRegistry::new();
        for i in 1..=n {
            registry.upsert(&format!("https://site{i}.dev"), &format!("Site {i}"), "");
        }
        registry
    }

    #[test]
    fn citations_follow_first_appearance() {
        let registry = registry_with(3);
        let answer = compile_answer("B first [S2]. Then A [S1, S2]. Bogus [S9].", &registry);
        assert_eq!(answer.text, "B first [S2]. Then A [S1, S2]. Bogus.");
        let ids: Vec<_> = answer.citations.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![SourceId::new(2), SourceId::new(1)]);
    }

    #[test]
    fn answer_without_research_has_no_citations() {
        let answer = compile_answer("Paris is the capital of France [1].", &SourceRegistry::new());
        assert_eq!(answer.text, "Paris is the capital of France.");
        assert!(answer.citations.is_empty());
    }

    #[tokio::test]
    async fn finalize_uses_answer_model_at_zero_temperature() {
        let mut state = ResearchState::new(
            Conversation::from_question("Q?"),
            ResearchBudget::new(1, 1),
        );
        let id = state.sources.upsert("https://a.dev", "A", "");
        state.summaries.push(QuerySummary {
            iteration: 1,
            query: "q".into(),
            summary: format!("fact [{id}]"),
            sources: vec![id],
        });

        let model = Arc::new(ScriptedModel::new());
        model.push("SynthesizedAnswer", Ok(json!({"answer": "  "})));
        model.push("SynthesizedAnswer", Ok(json!({"answer": "The fact [S1]."})));
        let finalizer = AnswerFinalizer::new(model.clone(), "answer-model")
            .with_retry_policy(RetryPolicy::immediate());

        let answer = finalizer.finalize(&state).await.unwrap();
        assert_eq!(answer.text, "The fact [S1].");
        assert_eq!(answer.citations[0].url, "https://a.dev");

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].model, "answer-model");
        assert!(calls[0].temperature.abs() < f32::EPSILON);
        assert!(calls[0].prompt.contains("[S1] A (https://a.dev)"));
    }

    #[tokio::test]
    async fn finalize_failure_is_fatal() {
        let state = ResearchState::new(Conversation::from_question("Q?"), ResearchBudget::new(0, 0));
        let model = Arc::new(ScriptedModel::new());
        model.push(
            "SynthesizedAnswer",
            Err(ProviderError::AuthenticationFailed("revoked".into())),
        );
        let finalizer = AnswerFinalizer::new(model, "m").with_retry_policy(RetryPolicy::immediate());
        let err = finalizer.finalize(&state).await.unwrap_err();
        assert!(matches!(err, Error::Generation { stage: Stage::Finalization, .. }));
    }

    fn marker() -> impl Strategy<Value = String> {
        prop_oneof![
            (1u32..12).prop_map(|n| format!("[S{n}]")),
            ((1u32..12), (1u32..12)).prop_map(|(a, b)| format!("[S{a}, S{b}]")),
            (1usize..5).prop_map(|n| format!("[{n}]")),
            "[a-z ]{1,6}".prop_map(|t| format!("[{t}]")),
        ]
    }

    proptest! {
        #[test]
        fn never_emits_dangling_citations(
            known in 0u32..6,
            parts in proptest::collection::vec(("[A-Za-z ,.]{0,12}", marker()), 0..10),
        ) {
            let registry = registry_with(known);
            let raw: String = parts.iter().map(|(t, m)| format!("{t}{m}")).collect();
            let answer = compile_answer(&raw, &registry);

            for id in citation::source_refs(&answer.text) {
                prop_assert!(registry.contains(id), "dangling {id} in {:?}", answer.text);
            }
            prop_assert!(citation::local_refs(&answer.text).is_empty());
            prop_assert_eq!(answer.citations.len(), citation::source_refs(&answer.text).len());
        }
    }
}
