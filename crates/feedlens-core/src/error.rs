//! Error types for feedlens.

use thiserror::Error;

/// Result type alias using feedlens's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for feedlens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Inference/generation failed at the transport level
    #[error("Inference error: {0}")]
    Inference(String),

    /// The model kept returning empty output after every retry.
    #[error("Empty model response after {attempts} attempts")]
    EmptyResponse { attempts: u32 },

    /// Model output contained no parseable JSON object.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// A record broke a hard schema constraint that cannot be repaired.
    #[error("Schema violation on {field}: {reason}")]
    SchemaViolation { field: String, reason: String },

    /// Task state machine rejected a transition
    #[error("Invalid task transition: {0}")]
    InvalidTransition(String),

    /// Job execution error
    #[error("Job error: {0}")]
    Job(String),

    /// Job queue cannot accept more work
    #[error("Job queue is full (capacity {0})")]
    QueueFull(usize),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("task 7".to_string());
        assert_eq!(err.to_string(), "Not found: task 7");
    }

    #[test]
    fn test_error_display_empty_response() {
        let err = Error::EmptyResponse { attempts: 3 };
        assert_eq!(err.to_string(), "Empty model response after 3 attempts");
    }

    #[test]
    fn test_error_display_malformed_output() {
        let err = Error::MalformedOutput("no JSON object found".to_string());
        assert_eq!(
            err.to_string(),
            "Malformed model output: no JSON object found"
        );
    }

    #[test]
    fn test_error_display_schema_violation() {
        let err = Error::SchemaViolation {
            field: "short_title".to_string(),
            reason: "24 words exceeds limit of 20".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Schema violation on short_title: 24 words exceeds limit of 20"
        );
    }

    #[test]
    fn test_error_display_invalid_transition() {
        let err = Error::InvalidTransition("completed -> working".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid task transition: completed -> working"
        );
    }

    #[test]
    fn test_error_display_queue_full() {
        let err = Error::QueueFull(256);
        assert_eq!(err.to_string(), "Job queue is full (capacity 256)");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("bad TASK_WORKERS".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad TASK_WORKERS");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }
}
