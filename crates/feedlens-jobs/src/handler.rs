//! Job handler trait and execution context.

use std::any::Any;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use feedlens_core::{Error, JobKind, Result, TaskId};

/// Value a handler takes when its job is submitted. The dispatcher drops
/// it once the job ends, or when a queued job is discarded at shutdown.
pub type Admission = Box<dyn Any + Send>;

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    pub task_id: TaskId,
    pub kind: JobKind,
    /// Arguments given at submission (a JSON object, possibly empty).
    pub args: JsonValue,
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    pub fn new(task_id: TaskId, kind: JobKind, args: JsonValue) -> Self {
        Self {
            task_id,
            kind,
            args,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, percent: i32, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// Deserialize the arguments. `null` is treated as an empty object.
    pub fn args_as<T: DeserializeOwned>(&self) -> Result<T> {
        let args = match &self.args {
            JsonValue::Null => JsonValue::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(args)
            .map_err(|e| Error::InvalidInput(format!("invalid {} arguments: {e}", self.kind)))
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message.
    Failed(String),
}

impl JobResult {
    /// Serialize an `Ok` value as the result; turn `Err` into a failure.
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(|v| serde_json::to_value(v).map_err(Error::from)) {
            Ok(value) => JobResult::Success(Some(value)),
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn kind(&self) -> JobKind;

    /// Whether the body needs the inference device for its whole run.
    fn requires_exclusive(&self) -> bool {
        false
    }

    /// Called by `Dispatcher::submit` before the job is queued.
    fn admit(&self, _args: &JsonValue) -> Option<Admission> {
        None
    }

    /// Runs before the exclusive lock is taken. Waits that do not need the
    /// inference device belong here.
    async fn prepare(&self, _ctx: &JobContext) {}

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job kind.
    fn can_handle(&self, kind: JobKind) -> bool {
        self.kind() == kind
    }
}

/// No-op handler for testing.
pub struct NoOpHandler {
    kind: JobKind,
}

impl NoOpHandler {
    pub fn new(kind: JobKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(50, Some("Processing..."));
        ctx.report_progress(100, Some("Done"));
        JobResult::Success(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::{Arc, Mutex};

    #[derive(Deserialize)]
    struct Args {
        #[serde(default)]
        limit: Option<i64>,
    }

    #[test]
    fn test_args_null_is_empty_object() {
        let ctx = JobContext::new(TaskId(1), JobKind::CommentAnalysis, JsonValue::Null);
        let args: Args = ctx.args_as().unwrap();
        assert!(args.limit.is_none());
    }

    #[test]
    fn test_args_wrong_shape() {
        let ctx = JobContext::new(
            TaskId(1),
            JobKind::CommentAnalysis,
            serde_json::json!({"limit": "many"}),
        );
        let err = ctx.args_as::<Args>().err().unwrap();
        assert!(err.to_string().contains("comment_analysis"));
    }

    #[test]
    fn test_from_result() {
        assert!(matches!(
            JobResult::from_result(Ok(3)),
            JobResult::Success(Some(JsonValue::Number(_)))
        ));
        match JobResult::from_result::<()>(Err(Error::Job("nope".into()))) {
            JobResult::Failed(msg) => assert_eq!(msg, "Job error: nope"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_noop_handler_reports_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let ctx = JobContext::new(TaskId(7), JobKind::Ngram, JsonValue::Null)
            .with_progress_callback(move |p, _| seen2.lock().unwrap().push(p));

        let handler = NoOpHandler::new(JobKind::Ngram);
        assert!(handler.can_handle(JobKind::Ngram));
        assert!(!handler.can_handle(JobKind::Crawl));
        assert!(!handler.requires_exclusive());
        assert!(handler.admit(&JsonValue::Null).is_none());
        assert!(matches!(handler.execute(ctx).await, JobResult::Success(None)));
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }
}
