//! Conversation domain types.
//!
//! The conversation is the caller-supplied history a research request starts
//! from. The engine reads it to derive the research topic and never mutates it.

use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who wrote this turn
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Turn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation holding a single user question.
    pub fn from_question(question: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(question)],
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// The text of the most recent user turn, if any.
    pub fn latest_question(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }

    /// Render the conversation as the topic the research is about.
    ///
    /// A single turn is used verbatim. Longer histories are rendered one
    /// `Role: text` line per turn so the model sees the full context.
    pub fn research_topic(&self) -> String {
        match self.turns.as_slice() {
            [] => String::new(),
            [only] => only.content.clone(),
            turns => turns
                .iter()
                .map(|t| format!("{}: {}", t.role.label(), t.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl FromIterator<Turn> for Conversation {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}
