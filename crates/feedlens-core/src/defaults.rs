//! Centralized default constants for feedlens.
//!
//! **This module is the single source of truth** for shared default values.
//! Environment-driven configs (`from_env()`) fall back to these when a
//! variable is unset or unparsable.

// =============================================================================
// TASK ORCHESTRATION
// =============================================================================

/// Number of worker loops draining the job queue.
pub const TASK_WORKERS: usize = 4;

/// Maximum number of submitted jobs waiting for a worker.
pub const TASK_QUEUE_CAPACITY: usize = 256;

/// Capacity of the worker event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Waiting longer than this for the exclusive resource is logged as slow.
pub const EXCLUSIVE_WAIT_WARN_MS: u64 = 5_000;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama API endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "phi4:latest";

/// Sampling temperature for extraction calls. Zero keeps output stable.
pub const GEN_TEMPERATURE: f32 = 0.0;

/// HTTP timeout for a single generation request.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Generation slower than this is logged as slow.
pub const SLOW_GENERATION_MS: u128 = 30_000;

/// Extra attempts after an empty model response.
pub const LLM_MAX_RETRIES: u32 = 2;

// =============================================================================
// COMMENT ANALYSIS
// =============================================================================

/// Comments fetched per analysis batch.
pub const ANALYSIS_BATCH_SIZE: i64 = 100;

/// Upper bound on words in a short title.
pub const SHORT_TITLE_MAX_WORDS: usize = 20;

/// Comments with fewer normalized words skip the model entirely.
pub const SHORT_COMMENT_MIN_WORDS: usize = 3;

/// Characters of raw text used when evidence cannot be located.
pub const EVIDENCE_FALLBACK_CHARS: usize = 300;

/// Maximum number of keywords kept on a record.
pub const MAX_KEYWORDS: usize = 6;

/// Keyword used when no valid keyword survives validation.
pub const KEYWORD_SENTINEL: &str = "عمومی";

/// Model identifier stored for rule-based records.
pub const RULE_BASED_MODEL: &str = "rule_based_short_comment";

// =============================================================================
// DUPLICATE DETECTION
// =============================================================================

/// Maximum seconds between a comment and its duplicate.
pub const DUPLICATE_WINDOW_SECS: i64 = 3600;

// =============================================================================
// SENTIMENT
// =============================================================================

/// Comments scored per sentiment batch.
pub const SENTIMENT_BATCH_SIZE: i64 = 100;

// =============================================================================
// SUMMARIZATION
// =============================================================================

/// Normalized titles sent to the model per summary chunk.
pub const SUMMARY_CHUNK_SIZE: usize = 80;

/// Combinations with fewer comments than this are skipped.
pub const SUMMARY_MIN_COMMENTS: usize = 6;

// =============================================================================
// N-GRAMS
// =============================================================================

/// Number of top n-grams returned per order.
pub const NGRAM_TOP_K: usize = 30;

/// Minimum document frequency for an n-gram to be kept.
pub const NGRAM_MIN_DF: usize = 3;

/// Maximum document frequency ratio for an n-gram to be kept.
pub const NGRAM_MAX_DF: f64 = 0.6;

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default HTTP port.
pub const SERVER_PORT: u16 = 5000;

/// Request timeout for the comment source (seconds).
pub const SOURCE_TIMEOUT_SECS: u64 = 30;

/// Default database URL.
pub const DATABASE_URL: &str = "postgres://localhost/feedlens";

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Maximum pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Minimum idle connections.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Seconds to wait for a pooled connection.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds before an idle connection is closed.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Seconds between pool metric log lines.
pub const DB_METRICS_INTERVAL_SECS: u64 = 60;
