//! Research state: the aggregate the controller owns for one request.

use deepsift_config::ResearchBudget;
use deepsift_core::{Conversation, Source, SourceId, TaskFailure};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::registry::SourceRegistry;

/// Where the research loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Generating,
    Researching,
    Reflecting,
    Looping,
    Finalizing,
    Done,
    Errored,
}

/// Verdict of the most recent reflection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sufficiency {
    #[default]
    Unknown,
    Sufficient,
    Insufficient,
}

/// The grounded summary one search task produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySummary {
    pub iteration: u32,
    pub query: String,
    /// Summary text with `[S#]` markers
    pub summary: String,
    pub sources: Vec<SourceId>,
}

/// The synthesized answer and the sources it cites, in order of first citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub text: String,
    pub citations: Vec<Source>,
}

/// Case-insensitive, whitespace-collapsed form used to compare queries.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug)]
pub struct ResearchState {
    pub conversation: Conversation,
    pub phase: Phase,
    pub active_queries: Vec<String>,
    issued_queries: Vec<String>,
    issued_normalized: HashSet<String>,
    pub sources: SourceRegistry,
    pub summaries: Vec<QuerySummary>,
    pub failures: Vec<TaskFailure>,
    pub iteration: u32,
    pub loop_count: u32,
    pub max_loops: u32,
    pub initial_query_count: u32,
    pub is_sufficient: Sufficiency,
    pub knowledge_gap: Option<String>,
    pub pending_follow_ups: Vec<String>,
    /// Set only once the request reaches `Phase::Done`
    pub final_answer: Option<FinalAnswer>,
}

impl ResearchState {
    pub fn new(conversation: Conversation, budget: ResearchBudget) -> Self {
        Self {
            conversation,
            phase: Phase::Init,
            active_queries: Vec::new(),
            issued_queries: Vec::new(),
            issued_normalized: HashSet::new(),
            sources: SourceRegistry::new(),
            summaries: Vec::new(),
            failures: Vec::new(),
            iteration: 0,
            loop_count: 0,
            max_loops: budget.max_loops,
            initial_query_count: budget.initial_query_count,
            is_sufficient: Sufficiency::Unknown,
            knowledge_gap: None,
            pending_follow_ups: Vec::new(),
            final_answer: None,
        }
    }

    pub fn research_topic(&self) -> String {
        self.conversation.research_topic()
    }

    /// Every query issued so far, in issue order.
    pub fn issued_queries(&self) -> &[String] {
        &self.issued_queries
    }

    pub fn is_issued(&self, query: &str) -> bool {
        self.issued_normalized.contains(&normalize_query(query))
    }

    /// Keep the candidates that are non-empty, not yet issued, and not
    /// repeated within the batch, up to `limit`.
    pub fn novel_queries<I>(&self, candidates: I, limit: usize) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .filter(|q| {
                let key = normalize_query(q);
                !self.issued_normalized.contains(&key) && seen.insert(key)
            })
            .take(limit)
            .collect()
    }

    /// Make `queries` the active set for a new iteration and mark them issued.
    pub fn begin_iteration(&mut self, queries: Vec<String>) {
        self.iteration += 1;
        self.active_queries.clear();
        for query in queries {
            if self.issued_normalized.insert(normalize_query(&query)) {
                self.issued_queries.push(query.clone());
                self.active_queries.push(query);
            }
        }
    }

    pub fn record_reflection(
        &mut self,
        is_sufficient: bool,
        knowledge_gap: String,
        follow_ups: Vec<String>,
    ) {
        self.loop_count += 1;
        self.is_sufficient = if is_sufficient {
            Sufficiency::Sufficient
        } else {
            Sufficiency::Insufficient
        };
        self.knowledge_gap = Some(knowledge_gap).filter(|g| !g.trim().is_empty());
        self.pending_follow_ups = follow_ups;
    }

    /// Enter the terminal state holding `answer`.
    pub fn finish(&mut self, answer: FinalAnswer) -> &FinalAnswer {
        self.phase = Phase::Done;
        self.pending_follow_ups.clear();
        self.final_answer.insert(answer)
    }

    /// Budget for follow-up breadth, reusing the first iteration's.
    pub fn breadth(&self) -> usize {
        self.initial_query_count as usize
    }
}
