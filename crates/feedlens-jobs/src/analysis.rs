//! Per-comment structured analysis.
//!
//! Short comments get a rule-based record; everything else goes through
//! the semantic and category model stages. Both paths end in validation,
//! and a batch keeps going when a single comment fails.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use feedlens_core::taxonomy::is_forced_neutral;
use feedlens_core::text::{normalize_for_match, word_count};
use feedlens_core::{
    defaults, AiTitle, AnalysisRecord, AnalysisRepository, BatchSummary, Candidate, Comment,
    CommentType, GenerationBackend, Repair, Result, Validator,
};
use feedlens_inference::{extract_category, extract_semantic, RetryPolicy};

/// Turns stored comments into validated analysis records.
#[derive(Clone)]
pub struct CommentAnalyzer {
    backend: Arc<dyn GenerationBackend>,
    validator: Validator,
    policy: RetryPolicy,
}

impl CommentAnalyzer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            validator: Validator::default(),
            policy: RetryPolicy::default(),
        }
    }

    /// Read `SHORT_TITLE_MAX_WORDS` and `LLM_MAX_RETRIES`.
    pub fn from_env(backend: Arc<dyn GenerationBackend>) -> Self {
        let max_words = std::env::var("SHORT_TITLE_MAX_WORDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::SHORT_TITLE_MAX_WORDS);
        Self {
            backend,
            validator: Validator::new(max_words),
            policy: RetryPolicy::from_env(),
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Analyze one comment and validate the result.
    #[instrument(skip(self, comment), fields(subsystem = "jobs", component = "analysis", comment_id = comment.id))]
    pub async fn analyze(&self, comment: &Comment) -> Result<(AnalysisRecord, Vec<Repair>)> {
        let text = comment.text();
        let candidate = if word_count(&normalize_for_match(text)) < defaults::SHORT_COMMENT_MIN_WORDS {
            debug!("Short comment, using section-title rules");
            rule_based_candidate(comment)
        } else {
            self.model_candidate(comment).await?
        };

        self.validator.validate(candidate, text).into_result()
    }

    async fn model_candidate(&self, comment: &Comment) -> Result<Candidate> {
        let text = comment.text();
        let hint = AiTitle::from_section_title(comment.title.as_deref());
        let semantic = extract_semantic(self.backend.as_ref(), self.policy, text, hint.as_str()).await?;

        let comment_type = if is_forced_neutral(text) {
            debug!("Neutral phrase present, forcing type to other");
            CommentType::Other.as_str().to_string()
        } else {
            semantic.comment_type
        };

        let ai_title = AiTitle::from_label(&semantic.ai_title)
            .map(|t| t.as_str())
            .unwrap_or(semantic.ai_title.as_str());
        let category = extract_category(
            self.backend.as_ref(),
            self.policy,
            &semantic.normalized_title,
            &comment_type,
            ai_title,
        )
        .await?;

        Ok(Candidate {
            comment_id: comment.id,
            comment_type,
            category,
            ai_title: semantic.ai_title,
            short_title: semantic.short_title,
            normalized_title: semantic.normalized_title,
            keywords: semantic.keywords,
            evidence: semantic.evidence,
            severity: semantic.severity,
            priority: semantic.priority,
            model: self.backend.model_name().to_string(),
            title: comment.title.clone(),
            sentiment_result: comment.sentiment_result.clone(),
            created_at: comment.created_at,
        })
    }

    /// Analyze and store each comment in order. Per-comment errors are
    /// logged and counted; they never abort the batch.
    pub async fn run_batch(&self, comments: &[Comment], store: &dyn AnalysisRepository) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for comment in comments {
            if comment.text().trim().is_empty() {
                summary.skipped += 1;
                continue;
            }

            let outcome = match self.analyze(comment).await {
                Ok((record, repairs)) => store.upsert_analysis(&record).await.map(|_| repairs),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(repairs) => {
                    summary.processed += 1;
                    if !repairs.is_empty() {
                        summary.repaired += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        subsystem = "jobs",
                        component = "analysis",
                        comment_id = comment.id,
                        error = %e,
                        "Comment analysis failed"
                    );
                }
            }
        }

        info!(
            subsystem = "jobs",
            component = "analysis",
            processed = summary.processed,
            failed = summary.failed,
            skipped = summary.skipped,
            repaired = summary.repaired,
            "Analysis batch finished"
        );
        summary
    }
}

fn rule_based_candidate(comment: &Comment) -> Candidate {
    let text = comment.text();
    let title = comment.title.clone().unwrap_or_default();
    let comment_type = if is_forced_neutral(text) {
        CommentType::Other
    } else {
        CommentType::from_sentiment(comment.sentiment_result.as_deref())
    };

    Candidate {
        comment_id: comment.id,
        comment_type: comment_type.as_str().to_string(),
        category: "other".to_string(),
        ai_title: AiTitle::from_section_title(comment.title.as_deref())
            .as_str()
            .to_string(),
        normalized_title: normalize_for_match(&title),
        short_title: title,
        keywords: vec![defaults::KEYWORD_SENTINEL.to_string()],
        evidence: text.to_string(),
        severity: None,
        priority: None,
        model: defaults::RULE_BASED_MODEL.to_string(),
        title: comment.title.clone(),
        sentiment_result: comment.sentiment_result.clone(),
        created_at: comment.created_at,
    }
}
