//! Citable web sources.

use serde::{Deserialize, Serialize};

/// Short, request-stable citation id (`S1`, `S2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SourceId(u32);

impl SourceId {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// Inline citation marker, e.g. `[S3]`.
    pub fn marker(self) -> String {
        format!("[{self}]")
    }

    /// Parse `S<n>` (case-insensitive prefix, n >= 1).
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.trim().strip_prefix(['S', 's'])?;
        match digits.parse::<u32>() {
            Ok(n) if n > 0 => Some(Self(n)),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SourceId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid source id: {value}"))
    }
}

/// One deduplicated web document available for citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    /// Normalized URL, the identity key within a request
    pub url: String,
    pub label: String,
    pub snippet: String,
}
