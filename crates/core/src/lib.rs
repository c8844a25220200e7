//! # deepsift Core
//!
//! Domain types, capability traits, and error definitions for the deepsift
//! research engine. Nothing in here talks to the network: this crate defines
//! the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two external capabilities the engine consumes (a web search backend
//! and a structured-output language model) are traits here. Implementations
//! live in `deepsift-search` and `deepsift-providers`. This enables:
//! - Selecting backends per request instead of per process
//! - Testing the research loop with scripted stand-ins
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod search;
pub mod source;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, Stage, TaskFailure};
pub use event::{EventBus, ProgressEvent};
pub use message::{Conversation, Role, Turn};
pub use provider::{LanguageModel, StructuredRequest};
pub use search::{SearchHit, SearchProvider};
pub use source::{Source, SourceId};
