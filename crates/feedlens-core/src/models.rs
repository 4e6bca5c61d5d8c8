//! Core data models for feedlens.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::taxonomy::{AiTitle, Category, CommentType, Level};
use crate::Error;

// =============================================================================
// TASKS
// =============================================================================

/// Identifier of a submitted task.
///
/// Allocated from a monotonically increasing counter and rendered as a
/// decimal string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(TaskId)
            .map_err(|_| Error::InvalidInput(format!("invalid task id: {s}")))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(TaskId(n)),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Lifecycle state of a task.
///
/// Transitions only move forward: `started → working → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Working,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Started => "started",
            TaskStatus::Working => "working",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Started, TaskStatus::Working)
                | (TaskStatus::Working, TaskStatus::Completed)
                | (TaskStatus::Working, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of background job a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Pull fresh comments for a set of store apps
    Crawl,
    /// Score comment sentiment
    Sentiment,
    /// TF-IDF bigram/trigram statistics
    Ngram,
    /// Two-stage model extraction over unanalyzed comments
    CommentAnalysis,
    /// Chunked summaries of analyzed comments
    Summarization,
    /// Flag repeated comments from the same user
    DuplicateDetection,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::Crawl,
        JobKind::Sentiment,
        JobKind::Ngram,
        JobKind::CommentAnalysis,
        JobKind::Summarization,
        JobKind::DuplicateDetection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Crawl => "crawl",
            JobKind::Sentiment => "sentiment",
            JobKind::Ngram => "ngram",
            JobKind::CommentAnalysis => "comment_analysis",
            JobKind::Summarization => "summarization",
            JobKind::DuplicateDetection => "duplicate_detection",
        }
    }

    /// Human-readable task description recorded at submission.
    pub fn description(&self) -> &'static str {
        match self {
            JobKind::Crawl => "Crawling comments",
            JobKind::Sentiment => "Sentiment analysis",
            JobKind::Ngram => "N-gram analysis",
            JobKind::CommentAnalysis => "Comment analysis",
            JobKind::Summarization => "Summarization",
            JobKind::DuplicateDetection => "Duplicate detection",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown job kind: {s}")))
    }
}

/// A task as held by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: JobKind,
    pub description: String,
    pub status: TaskStatus,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            description: kind.description().to_string(),
            status: TaskStatus::Started,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn view(&self) -> TaskView {
        TaskView {
            status: self.status,
            description: self.description.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// Externally visible projection of a task. `result` and `error` are
/// always present on the wire, `null` until set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub status: TaskStatus,
    pub description: String,
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of a status lookup. Unknown ids are a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskLookup {
    Found(TaskView),
    NotFound,
}

impl TaskLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, TaskLookup::Found(_))
    }
}

impl Serialize for TaskLookup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TaskLookup::Found(view) => view.serialize(serializer),
            TaskLookup::NotFound => serde_json::json!({
                "status": "error",
                "message": "Task ID not found",
            })
            .serialize(serializer),
        }
    }
}

// =============================================================================
// COMMENTS
// =============================================================================

/// A stored user comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub user_hash: String,
    pub app_id: Option<i64>,
    /// Source-section title the comment was left under.
    pub title: Option<String>,
    pub description: Option<String>,
    pub grade: Option<i32>,
    pub sentiment_result: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_repetitive: bool,
    pub duplicate_of: Option<i64>,
    #[serde(default)]
    pub is_analyzed: bool,
}

impl Comment {
    pub fn text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// A crawled comment ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub user_hash: String,
    pub app_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub grade: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Comment as yielded by a store crawler, before identifier hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    pub user_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub grade: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Duplicate detector verdict for one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateLink {
    pub comment_id: i64,
    pub is_repetitive: bool,
    pub duplicate_of: Option<i64>,
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Validated structured analysis of one comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub comment_id: i64,
    #[serde(rename = "type")]
    pub comment_type: CommentType,
    pub category: Category,
    pub ai_title: AiTitle,
    pub short_title: String,
    pub normalized_title: String,
    pub keywords: Vec<String>,
    pub evidence: String,
    pub severity: Option<Level>,
    pub priority: Option<Level>,
    pub model: String,
    /// Source-section title, copied from the comment.
    pub title: Option<String>,
    pub sentiment_result: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: DateTime<Utc>,
}

/// Counters returned by batch jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub repaired: usize,
}

// =============================================================================
// SENTIMENT
// =============================================================================

/// Sentiment label assigned to a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "very negative")]
    VeryNegative,
    #[serde(rename = "negative")]
    Negative,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "mixed")]
    Mixed,
    #[serde(rename = "positive")]
    Positive,
    #[serde(rename = "very positive")]
    VeryPositive,
    #[serde(rename = "no sentiment expressed")]
    NoSentiment,
    #[serde(rename = "no comments")]
    NoComments,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 8] = [
        SentimentLabel::VeryNegative,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Mixed,
        SentimentLabel::Positive,
        SentimentLabel::VeryPositive,
        SentimentLabel::NoSentiment,
        SentimentLabel::NoComments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::VeryNegative => "very negative",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Mixed => "mixed",
            SentimentLabel::Positive => "positive",
            SentimentLabel::VeryPositive => "very positive",
            SentimentLabel::NoSentiment => "no sentiment expressed",
            SentimentLabel::NoComments => "no comments",
        }
    }

    /// Numeric score stored alongside the label.
    pub fn score(&self) -> i32 {
        match self {
            SentimentLabel::VeryNegative => 1,
            SentimentLabel::Negative => 2,
            SentimentLabel::Neutral | SentimentLabel::Mixed | SentimentLabel::NoSentiment => 3,
            SentimentLabel::Positive => 4,
            SentimentLabel::VeryPositive => 5,
            SentimentLabel::NoComments => 0,
        }
    }

    /// Labels belonging to an n-gram sentiment group.
    ///
    /// `None` for `"all"` and for unknown groups, meaning no filter.
    pub fn group(name: &str) -> Option<&'static [SentimentLabel]> {
        match name.trim().to_lowercase().as_str() {
            "negative" => Some(&[SentimentLabel::Negative, SentimentLabel::VeryNegative]),
            "positive" => Some(&[SentimentLabel::Positive, SentimentLabel::VeryPositive]),
            "neutral" => Some(&[
                SentimentLabel::Neutral,
                SentimentLabel::Mixed,
                SentimentLabel::NoSentiment,
            ]),
            _ => None,
        }
    }

    /// Lenient parse of a model label. Unknown labels yield `None`.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .to_lowercase()
            .replace(['_', '-'], " ");
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        SentimentLabel::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == cleaned)
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a sentiment job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub processed_comments: usize,
    pub failed: usize,
    pub flagged_repetitive: usize,
}

// =============================================================================
// N-GRAMS
// =============================================================================

/// Filter for the n-gram corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NgramFilter {
    /// Sentiment group: "negative", "positive", "neutral" or `None` for all.
    pub sentiment: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// One scored n-gram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgramScore {
    pub ngram: String,
    /// Number of tokens (2 or 3).
    pub n: usize,
    pub score: f64,
}

/// N-gram job output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NgramReport {
    pub sentiment: String,
    pub document_count: usize,
    pub ngrams: Vec<NgramScore>,
}

// =============================================================================
// SUMMARIES
// =============================================================================

/// Natural key of a stored summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryKey {
    pub title: String,
    #[serde(rename = "type")]
    pub comment_type: String,
    pub category: String,
    pub sentiment: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Summary of one (title, type, category, sentiment) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentSummary {
    #[serde(flatten)]
    pub key: SummaryKey,
    pub comment_count: usize,
    pub chunk_count: usize,
    pub summary: String,
    pub processed_at: DateTime<Utc>,
}
