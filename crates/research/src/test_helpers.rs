//! Shared test doubles for the research loop.

use async_trait::async_trait;
use deepsift_core::{LanguageModel, ProviderError, SearchHit, SearchProvider, StructuredRequest};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A language model that answers from per-schema queues.
///
/// Responses are keyed by the requested schema name (`SearchQueryList`,
/// `GroundedSummary`, ...). When the `GroundedSummary` queue is empty the
/// model cites every numbered hit in the prompt, so executor tests only
/// script what they assert on. Any other empty queue is a malformed-output
/// error.
pub struct ScriptedModel {
    queues: Mutex<HashMap<String, VecDeque<Result<Value, ProviderError>>>>,
    calls: Mutex<Vec<StructuredRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, schema_name: &str, response: Result<Value, ProviderError>) {
        self.queues
            .lock()
            .unwrap()
            .entry(schema_name.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<StructuredRequest> {
        self.calls.lock().unwrap().clone()
    }
}

/// Cite every `[n] title` line of a summarizer prompt.
pub fn cite_all_hits(prompt: &str) -> Value {
    let sentences: Vec<String> = prompt
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix('[')?;
            let (n, title) = rest.split_once("] ")?;
            n.parse::<usize>().ok()?;
            Some(format!("{title} [{n}]."))
        })
        .collect();
    json!({ "summary": sentences.join(" ") })
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_structured(
        &self,
        request: StructuredRequest,
    ) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        let next = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.schema_name)
            .and_then(|q| q.pop_front());

        match next {
            Some(response) => response,
            None if request.schema_name == "GroundedSummary" => Ok(cite_all_hits(&request.prompt)),
            None => Err(ProviderError::MalformedOutput(format!(
                "no scripted {} response",
                request.schema_name
            ))),
        }
    }
}

/// A search backend with fixed per-query results.
///
/// Unknown queries return no hits.
pub struct ScriptedSearch {
    results: Mutex<HashMap<String, Result<Vec<SearchHit>, ProviderError>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn respond(&self, query: &str, hits: Vec<SearchHit>) {
        self.results.lock().unwrap().insert(query.to_string(), Ok(hits));
    }

    pub fn fail(&self, query: &str, error: ProviderError) {
        self.results.lock().unwrap().insert(query.to_string(), Err(error));
    }

    /// How many times `query` was searched.
    pub fn calls(&self, query: &str) -> u32 {
        self.calls.lock().unwrap().get(query).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        *self.calls.lock().unwrap().entry(query.to_string()).or_insert(0) += 1;
        self.results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
