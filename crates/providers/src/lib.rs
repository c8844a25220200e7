//! Language-model backends for deepsift.
//!
//! All backends implement the `deepsift_core::LanguageModel` trait.
//! The factory builds the one a request's configuration selects.

pub mod factory;
pub mod gemini;
pub mod http;
pub mod openai_compat;
pub mod structured;

pub use factory::build_language_model;
pub use gemini::{GeminiClient, GeminiModel, LLM_TIMEOUT};
pub use openai_compat::OpenAiCompatModel;
