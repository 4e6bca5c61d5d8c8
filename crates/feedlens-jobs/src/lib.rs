//! # feedlens-jobs
//!
//! Background task orchestration for feedlens.
//!
//! This crate provides:
//! - An in-process task registry with a one-way status state machine
//! - A bounded worker pool fed by a bounded job queue
//! - An exclusive lock for jobs that drive the inference device
//! - The comment analysis pipeline and every job body
//!
//! ## Example
//!
//! ```ignore
//! use feedlens_jobs::{DispatcherBuilder, DuplicateDetectionHandler, WorkerConfig};
//! use feedlens_core::JobKind;
//!
//! let dispatcher = DispatcherBuilder::new()
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(DuplicateDetectionHandler::new(comments))
//!     .build();
//!
//! let task_id = dispatcher.submit(JobKind::DuplicateDetection, serde_json::Value::Null)?;
//! let view = dispatcher.wait(task_id).await?;
//! ```

pub mod analysis;
pub mod exclusive;
pub mod gate;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod worker;

// Re-export core types
pub use feedlens_core::*;

pub use analysis::CommentAnalyzer;
pub use exclusive::{ExclusiveGuard, ExclusiveResource};
pub use gate::{CrawlGate, CrawlPass};
pub use handler::{Admission, JobContext, JobHandler, JobResult, NoOpHandler};
pub use handlers::{
    CommentAnalysisHandler, CrawlHandler, CrawlSummary, DuplicateDetectionHandler, NgramHandler,
    SentimentHandler, SummarizationHandler, SummarizationOutput,
};
pub use registry::TaskRegistry;
pub use worker::{Dispatcher, DispatcherBuilder, WorkerConfig, WorkerEvent};
