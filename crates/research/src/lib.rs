//! The iterative research loop: the heart of deepsift.
//!
//! A request follows a **Generate → Research → Reflect** cycle:
//!
//! 1. **Generate** search queries from the conversation
//! 2. **Research** every query concurrently: search, then summarize the hits
//!    with citations into the request's source registry
//! 3. **Reflect** on all summaries so far; if something is missing, the
//!    proposed follow-up queries become the next iteration
//! 4. **Finalize** a cited answer once research is sufficient or the loop
//!    budget runs out
//!
//! Every step's progress is published on the controller's event bus.

pub mod citation;
pub mod controller;
pub mod executor;
pub mod finalizer;
pub mod prompts;
pub mod query_gen;
pub mod reflection;
pub mod registry;
pub mod retry;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use controller::{FinishReason, ResearchController, ResearchOutcome, ResearchRequest};
pub use executor::{IterationReport, WebResearchExecutor};
pub use finalizer::{AnswerFinalizer, compile_answer};
pub use query_gen::{GeneratedQueries, QueryGenerator};
pub use reflection::{Reflection, ReflectionEngine};
pub use registry::{SourceRegistry, normalize_url};
pub use retry::RetryPolicy;
pub use state::{FinalAnswer, Phase, QuerySummary, ResearchState, Sufficiency};
