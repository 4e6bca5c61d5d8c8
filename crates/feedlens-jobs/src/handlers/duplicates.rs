//! Duplicate detection job.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument};

use feedlens_core::{CommentRepository, DuplicateDetector, JobKind, Result};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Scan every eligible comment and replace the stored repetitive flags.
/// Returns the number of comments flagged.
pub async fn run_duplicate_detection(
    comments: &dyn CommentRepository,
    detector: &DuplicateDetector,
) -> Result<u64> {
    let start = Instant::now();
    let rows = comments.fetch_for_duplicate_scan().await?;
    let links = detector.detect(&rows);
    let flagged = comments.replace_duplicate_flags(&links).await?;

    info!(
        subsystem = "jobs",
        component = "duplicates",
        scanned = rows.len(),
        flagged,
        duration_ms = start.elapsed().as_millis() as u64,
        "Duplicate detection finished"
    );
    Ok(flagged)
}

pub struct DuplicateDetectionHandler {
    comments: Arc<dyn CommentRepository>,
    detector: DuplicateDetector,
}

impl DuplicateDetectionHandler {
    pub fn new(comments: Arc<dyn CommentRepository>) -> Self {
        Self {
            comments,
            detector: DuplicateDetector::default(),
        }
    }

    pub fn with_detector(mut self, detector: DuplicateDetector) -> Self {
        self.detector = detector;
        self
    }
}

#[async_trait]
impl JobHandler for DuplicateDetectionHandler {
    fn kind(&self) -> JobKind {
        JobKind::DuplicateDetection
    }

    #[instrument(skip(self, ctx), fields(subsystem = "jobs", component = "duplicates", op = "execute", task_id = %ctx.task_id))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(10, Some("Scanning comments"));
        let result = run_duplicate_detection(self.comments.as_ref(), &self.detector)
            .await
            .map(|flagged| json!({ "flagged": flagged }));
        ctx.report_progress(100, Some("Duplicate detection complete"));
        JobResult::from_result(result)
    }
}
