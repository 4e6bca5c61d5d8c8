//! Structured logging field name constants.
//!
//! Every crate uses these names so log queries work the same across
//! subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Job failed, requires operator attention |
//! | WARN  | Recoverable issue: a repair was applied, a record was skipped |
//! | INFO  | Lifecycle events and job completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-record iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID of the HTTP request (UUIDv7).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs", "core"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "dispatcher", "worker", "ollama", "validation", "duplicates"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Task identifier.
pub const TASK_ID: &str = "task_id";

/// Job kind being executed.
pub const JOB_KIND: &str = "job_kind";

/// Comment being processed.
pub const COMMENT_ID: &str = "comment_id";

/// Store application id.
pub const APP_ID: &str = "app_id";

/// Record field touched by a repair.
pub const FIELD: &str = "field";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Milliseconds spent waiting for a lock.
pub const WAIT_MS: &str = "wait_ms";

/// Number of records in a batch.
pub const BATCH_SIZE: &str = "batch_size";

/// Attempt number of a retried call (1-based).
pub const ATTEMPT: &str = "attempt";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
