//! # feedlens-core
//!
//! Core types, traits, and analysis rules for feedlens.
//!
//! This crate holds the task and comment models, the closed vocabularies
//! used by analysis records, the validation/repair engine, the duplicate
//! detector, and the repository and backend traits the other crates
//! implement.

pub mod defaults;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod models;
pub mod ngrams;
pub mod script;
pub mod taxonomy;
pub mod text;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use duplicates::{DuplicateDetector, ScanRow};
pub use error::{Error, Result};
pub use models::*;
pub use ngrams::NgramExtractor;
pub use taxonomy::{AiTitle, Category, CommentType, Level};
pub use traits::*;
pub use validation::{Candidate, Repair, SchemaViolation, Validation, Validator};
