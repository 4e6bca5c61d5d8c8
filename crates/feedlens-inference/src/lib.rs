//! # feedlens-inference
//!
//! Model access for feedlens.
//!
//! This crate provides:
//! - Ollama generation backend (default, feature `ollama`)
//! - Retry of empty model output
//! - JSON object extraction from free-form model output
//! - Prompt templates and the two comment-analysis stages
//! - LLM-backed sentiment classification
//! - Scripted mock backend (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use feedlens_inference::{extract_category, OllamaBackend, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env().unwrap();
//!     let category = extract_category(&backend, RetryPolicy::default(), "خطای ورود", "issue", "account")
//!         .await
//!         .unwrap();
//!     println!("{category}");
//! }
//! ```

pub mod extraction;
pub mod prompts;
pub mod retry;
pub mod sentiment;
pub mod structured;

#[cfg(feature = "ollama")]
pub mod ollama;

// Mock backend for tests here and in dependent crates
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use extraction::{
    extract_category, extract_semantic, merge_summaries, summarize_chunk, SemanticExtraction,
    SummaryContext,
};
pub use retry::{generate_non_empty, RetryPolicy};
pub use sentiment::LlmSentimentClassifier;
pub use structured::{extract_json_object, strip_fences};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

pub use feedlens_core::{GenerationBackend, SentimentClassifier};
