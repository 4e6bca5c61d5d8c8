//! The two model stages of comment analysis, plus chunk summarization.
//!
//! Each call goes through [`generate_non_empty`] and the brace-balanced
//! object scan. Field values are returned raw; enumeration checks happen
//! later in validation.

use tracing::{debug, instrument};

use feedlens_core::{Error, GenerationBackend, Result};

use crate::prompts;
use crate::retry::{generate_non_empty, RetryPolicy};
use crate::structured::{extract_json_object, lenient_string, lenient_string_list};

/// Raw output of the semantic stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticExtraction {
    pub comment_type: String,
    pub ai_title: String,
    pub short_title: String,
    pub normalized_title: String,
    pub keywords: Vec<String>,
    pub evidence: String,
    pub severity: Option<String>,
    pub priority: Option<String>,
}

/// Stage 1: semantic fields from the comment text and the section hint.
#[instrument(skip(backend, comment_text), fields(subsystem = "inference", component = "extraction", op = "semantic", model = %backend.model_name()))]
pub async fn extract_semantic(
    backend: &dyn GenerationBackend,
    policy: RetryPolicy,
    comment_text: &str,
    ai_title_hint: &str,
) -> Result<SemanticExtraction> {
    let prompt = prompts::semantic_prompt(comment_text, ai_title_hint);
    let raw = generate_non_empty(backend, prompts::EXTRACTION_SYSTEM, &prompt, policy).await?;
    let map = extract_json_object(&raw)?;

    let text = |key: &str| lenient_string(map.get(key)).unwrap_or_default();
    let out = SemanticExtraction {
        comment_type: text("type"),
        ai_title: text("ai_title"),
        short_title: text("short_title").trim().to_string(),
        normalized_title: text("normalized_title").trim().to_string(),
        keywords: lenient_string_list(map.get("keywords")),
        evidence: text("evidence"),
        severity: lenient_string(map.get("severity")),
        priority: lenient_string(map.get("priority")),
    };
    debug!(
        comment_type = %out.comment_type,
        ai_title = %out.ai_title,
        keywords = out.keywords.len(),
        "Semantic stage parsed"
    );
    Ok(out)
}

/// Stage 2: raw category label for a stage 1 result.
#[instrument(skip(backend, normalized_title), fields(subsystem = "inference", component = "extraction", op = "category", model = %backend.model_name()))]
pub async fn extract_category(
    backend: &dyn GenerationBackend,
    policy: RetryPolicy,
    normalized_title: &str,
    comment_type: &str,
    ai_title: &str,
) -> Result<String> {
    let prompt = prompts::category_prompt(normalized_title, comment_type, ai_title);
    let raw = generate_non_empty(backend, prompts::EXTRACTION_SYSTEM, &prompt, policy).await?;
    let map = extract_json_object(&raw)?;
    Ok(lenient_string(map.get("category")).unwrap_or_default())
}

/// Labels shared by every comment of one summary combination.
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext<'a> {
    pub title: &'a str,
    pub comment_type: &'a str,
    pub category: &'a str,
    pub sentiment: &'a str,
}

/// Summarize one chunk of normalized titles.
pub async fn summarize_chunk(
    backend: &dyn GenerationBackend,
    policy: RetryPolicy,
    ctx: SummaryContext<'_>,
    normalized_titles: &[String],
) -> Result<String> {
    let prompt = prompts::summarize_prompt(
        ctx.title,
        ctx.comment_type,
        ctx.category,
        ctx.sentiment,
        normalized_titles,
    );
    summary_call(backend, policy, &prompt).await
}

/// Merge partial summaries of one combination.
pub async fn merge_summaries(
    backend: &dyn GenerationBackend,
    policy: RetryPolicy,
    ctx: SummaryContext<'_>,
    partials: &[String],
) -> Result<String> {
    let prompt =
        prompts::merge_prompt(ctx.title, ctx.comment_type, ctx.category, ctx.sentiment, partials);
    summary_call(backend, policy, &prompt).await
}

async fn summary_call(backend: &dyn GenerationBackend, policy: RetryPolicy, prompt: &str) -> Result<String> {
    let raw = generate_non_empty(backend, prompts::EXTRACTION_SYSTEM, prompt, policy).await?;
    let map = extract_json_object(&raw)?;
    lenient_string(map.get("summarized_comment"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MalformedOutput("missing summarized_comment".to_string()))
}
