//! Effort tiers and the research budget they map to.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coarse caller-chosen research effort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortTier {
    Low,
    #[default]
    Medium,
    High,
}

impl EffortTier {
    pub fn budget(self) -> ResearchBudget {
        match self {
            Self::Low => ResearchBudget::new(1, 1),
            Self::Medium => ResearchBudget::new(3, 3),
            Self::High => ResearchBudget::new(5, 10),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for EffortTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown effort tier '{other}' (expected low, medium or high)")),
        }
    }
}

impl std::fmt::Display for EffortTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breadth and depth limits for one request.
///
/// Zero in either field is valid and means "answer from the conversation
/// without searching".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchBudget {
    /// Queries generated for the first iteration; also caps follow-ups
    pub initial_query_count: u32,
    /// Maximum completed reflections
    pub max_loops: u32,
}

impl ResearchBudget {
    pub fn new(initial_query_count: u32, max_loops: u32) -> Self {
        Self {
            initial_query_count,
            max_loops,
        }
    }

    /// Start from `tier` and replace whichever limits are given explicitly.
    pub fn resolve(tier: EffortTier, queries: Option<u32>, loops: Option<u32>) -> Self {
        let base = tier.budget();
        Self {
            initial_query_count: queries.unwrap_or(base.initial_query_count),
            max_loops: loops.unwrap_or(base.max_loops),
        }
    }

    /// Whether this budget permits any web research at all.
    pub fn allows_research(&self) -> bool {
        self.initial_query_count > 0 && self.max_loops > 0
    }
}

impl Default for ResearchBudget {
    fn default() -> Self {
        EffortTier::default().budget()
    }
}

impl From<EffortTier> for ResearchBudget {
    fn from(tier: EffortTier) -> Self {
        tier.budget()
    }
}
