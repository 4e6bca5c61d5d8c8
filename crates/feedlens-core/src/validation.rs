//! Validation and repair of extracted analysis records.
//!
//! Invalid fields are repaired in place rather than rejected. The one hard
//! constraint is the short-title length: a record whose short title is too
//! long is returned as [`Validation::Fatal`] and must not be stored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::defaults;
use crate::models::AnalysisRecord;
use crate::script::contains_latin;
use crate::taxonomy::{AiTitle, Category, CommentType, Level};
use crate::text::{normalize_for_match, take_chars, word_count};
use crate::Error;

/// Unvalidated record assembled from model output (or rules).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub comment_id: i64,
    pub comment_type: String,
    pub category: String,
    pub ai_title: String,
    pub short_title: String,
    pub normalized_title: String,
    pub keywords: Vec<String>,
    pub evidence: String,
    pub severity: Option<String>,
    pub priority: Option<String>,
    pub model: String,
    pub title: Option<String>,
    pub sentiment_result: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One corrective substitution applied to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repair {
    pub field: &'static str,
    pub before: String,
    pub after: String,
}

/// Hard constraint violation that aborts a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub field: &'static str,
    pub reason: String,
}

impl From<SchemaViolation> for Error {
    fn from(v: SchemaViolation) -> Self {
        Error::SchemaViolation {
            field: v.field.to_string(),
            reason: v.reason,
        }
    }
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Clean(AnalysisRecord),
    Repaired {
        record: AnalysisRecord,
        repairs: Vec<Repair>,
    },
    Fatal(SchemaViolation),
}

impl Validation {
    /// The record with its repairs, or the violation as an error.
    pub fn into_result(self) -> crate::Result<(AnalysisRecord, Vec<Repair>)> {
        match self {
            Validation::Clean(record) => Ok((record, Vec::new())),
            Validation::Repaired { record, repairs } => Ok((record, repairs)),
            Validation::Fatal(violation) => Err(violation.into()),
        }
    }
}

/// Field validator with configurable limits.
#[derive(Debug, Clone)]
pub struct Validator {
    short_title_max_words: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(defaults::SHORT_TITLE_MAX_WORDS)
    }
}

impl Validator {
    pub fn new(short_title_max_words: usize) -> Self {
        Self {
            short_title_max_words,
        }
    }

    pub fn short_title_max_words(&self) -> usize {
        self.short_title_max_words
    }

    /// Validate `candidate` against the raw comment text it was extracted from.
    pub fn validate(&self, candidate: Candidate, source_text: &str) -> Validation {
        let words = word_count(&candidate.short_title);
        if words > self.short_title_max_words {
            return Validation::Fatal(SchemaViolation {
                field: "short_title",
                reason: format!(
                    "{} words exceeds limit of {}",
                    words, self.short_title_max_words
                ),
            });
        }

        let mut repairs = Vec::new();

        let comment_type = CommentType::from_label(&candidate.comment_type).unwrap_or_else(|| {
            repairs.push(repair("type", &candidate.comment_type, CommentType::Other.as_str()));
            CommentType::Other
        });

        let category = Category::from_label(&candidate.category).unwrap_or_else(|| {
            repairs.push(repair("category", &candidate.category, Category::Other.as_str()));
            Category::Other
        });

        let ai_title = AiTitle::from_label(&candidate.ai_title).unwrap_or_else(|| {
            repairs.push(repair("ai_title", &candidate.ai_title, AiTitle::Other.as_str()));
            AiTitle::Other
        });

        let evidence = self.check_evidence(&candidate.evidence, source_text, &mut repairs);
        let keywords = self.check_keywords(&candidate.keywords, &mut repairs);

        let severity = check_level(
            "severity",
            candidate.severity.as_deref(),
            comment_type == CommentType::Issue,
            &mut repairs,
        );
        let priority = check_level(
            "priority",
            candidate.priority.as_deref(),
            comment_type == CommentType::Suggestion,
            &mut repairs,
        );

        for r in &repairs {
            warn!(
                subsystem = "core",
                component = "validation",
                comment_id = candidate.comment_id,
                field = r.field,
                before = %r.before,
                after = %r.after,
                "Repaired invalid field"
            );
        }

        let record = AnalysisRecord {
            comment_id: candidate.comment_id,
            comment_type,
            category,
            ai_title,
            short_title: candidate.short_title,
            normalized_title: candidate.normalized_title,
            keywords,
            evidence,
            severity,
            priority,
            model: candidate.model,
            title: candidate.title,
            sentiment_result: candidate.sentiment_result,
            created_at: candidate.created_at,
            processed_at: Utc::now(),
        };

        if repairs.is_empty() {
            Validation::Clean(record)
        } else {
            Validation::Repaired { record, repairs }
        }
    }

    fn check_evidence(&self, evidence: &str, source_text: &str, repairs: &mut Vec<Repair>) -> String {
        let normalized = normalize_for_match(evidence);
        if !normalized.is_empty() && normalize_for_match(source_text).contains(&normalized) {
            return evidence.to_string();
        }
        let fallback = take_chars(source_text, defaults::EVIDENCE_FALLBACK_CHARS);
        repairs.push(repair("evidence", evidence, &fallback));
        fallback
    }

    fn check_keywords(&self, keywords: &[String], repairs: &mut Vec<Repair>) -> Vec<String> {
        let mut kept: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty() && !contains_latin(k))
            .map(str::to_string)
            .collect();
        kept.truncate(defaults::MAX_KEYWORDS);
        if kept.is_empty() {
            kept.push(defaults::KEYWORD_SENTINEL.to_string());
        }
        if kept.as_slice() != keywords {
            repairs.push(repair(
                "keywords",
                &format!("{keywords:?}"),
                &format!("{kept:?}"),
            ));
        }
        kept
    }
}

/// Severity/priority: only meaningful for one type, otherwise null.
fn check_level(
    field: &'static str,
    raw: Option<&str>,
    applies: bool,
    repairs: &mut Vec<Repair>,
) -> Option<Level> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty() && *r != "null")?;
    match Level::from_label(raw) {
        Some(level) if applies => Some(level),
        _ => {
            repairs.push(repair(field, raw, "null"));
            None
        }
    }
}

fn repair(field: &'static str, before: &str, after: &str) -> Repair {
    Repair {
        field,
        before: before.to_string(),
        after: after.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "بعد از آپدیت انتقال وجه انجام نمیشه و خطای سرور میده";

    fn candidate() -> Candidate {
        Candidate {
            comment_id: 1,
            comment_type: "issue".into(),
            category: "transfer".into(),
            ai_title: "transfer".into(),
            short_title: "خطای انتقال وجه".into(),
            normalized_title: "خطای انتقال وجه بعد از آپدیت".into(),
            keywords: vec!["انتقال وجه".into(), "خطای سرور".into()],
            evidence: "انتقال وجه انجام نمیشه".into(),
            severity: Some("high".into()),
            priority: None,
            model: "phi4_semantic".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_record() {
        match Validator::default().validate(candidate(), SOURCE) {
            Validation::Clean(record) => {
                assert_eq!(record.comment_type, CommentType::Issue);
                assert_eq!(record.category, Category::Transfer);
                assert_eq!(record.severity, Some(Level::High));
                assert_eq!(record.keywords.len(), 2);
            }
            other => panic!("expected clean, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_enums_repaired_to_other() {
        let mut c = candidate();
        c.comment_type = "rant".into();
        c.category = "billing-issue".into();
        c.ai_title = "mortgage".into();
        let (record, repairs) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.comment_type, CommentType::Other);
        assert_eq!(record.category, Category::Other);
        assert_eq!(record.ai_title, AiTitle::Other);
        let fields: Vec<_> = repairs.iter().map(|r| r.field).collect();
        assert!(fields.contains(&"type"));
        assert!(fields.contains(&"category"));
        assert!(fields.contains(&"ai_title"));
    }

    #[test]
    fn test_category_synonym_is_not_a_repair() {
        let mut c = candidate();
        c.category = "authentication".into();
        let (record, repairs) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.category, Category::Auth);
        assert!(repairs.iter().all(|r| r.field != "category"));
    }

    #[test]
    fn test_evidence_matches_after_normalization() {
        let mut c = candidate();
        c.evidence = "  انتقال   وجه\nانجام نمیشه ".into();
        let (record, repairs) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert!(repairs.is_empty());
        assert!(normalize_for_match(SOURCE).contains(&normalize_for_match(&record.evidence)));
    }

    #[test]
    fn test_evidence_fallback_is_first_300_chars() {
        let source: String = "الف ".repeat(200);
        let mut c = candidate();
        c.evidence = "این جمله در متن نیست".into();
        let (record, repairs) = Validator::default().validate(c, &source).into_result().unwrap();
        assert_eq!(record.evidence.chars().count(), 300);
        assert_eq!(record.evidence, take_chars(&source, 300));
        assert!(repairs.iter().any(|r| r.field == "evidence"));
    }

    #[test]
    fn test_empty_evidence_uses_fallback() {
        let mut c = candidate();
        c.evidence = String::new();
        let (record, _) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.evidence, SOURCE);
    }

    #[test]
    fn test_latin_keywords_dropped_and_truncated() {
        let mut c = candidate();
        c.keywords = vec![
            "login".into(),
            "یک".into(),
            "دو".into(),
            "سه".into(),
            "app خراب".into(),
            "چهار".into(),
            "پنج".into(),
            "شش".into(),
            "هفت".into(),
        ];
        let (record, repairs) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.keywords, vec!["یک", "دو", "سه", "چهار", "پنج", "شش"]);
        assert!(record.keywords.iter().all(|k| !contains_latin(k)));
        assert!(repairs.iter().any(|r| r.field == "keywords"));
    }

    #[test]
    fn test_all_latin_keywords_become_sentinel() {
        let mut c = candidate();
        c.keywords = vec!["transfer".into(), "error".into()];
        let (record, _) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.keywords, vec![defaults::KEYWORD_SENTINEL.to_string()]);
    }

    #[test]
    fn test_empty_keywords_become_sentinel() {
        let mut c = candidate();
        c.keywords = Vec::new();
        let (record, _) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.keywords.len(), 1);
    }

    #[test]
    fn test_severity_nulled_for_non_issue() {
        let mut c = candidate();
        c.comment_type = "praise".into();
        c.priority = Some("low".into());
        let (record, repairs) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.severity, None);
        assert_eq!(record.priority, None);
        assert_eq!(repairs.iter().filter(|r| r.after == "null").count(), 2);
    }

    #[test]
    fn test_invalid_severity_nulled() {
        let mut c = candidate();
        c.severity = Some("catastrophic".into());
        let (record, _) = Validator::default().validate(c, SOURCE).into_result().unwrap();
        assert_eq!(record.severity, None);
    }

    #[test]
    fn test_long_short_title_is_fatal() {
        let mut c = candidate();
        c.short_title = vec!["کلمه"; 21].join(" ");
        match Validator::default().validate(c, SOURCE) {
            Validation::Fatal(v) => assert_eq!(v.field, "short_title"),
            other => panic!("expected fatal, got {other:?}"),
        }
    }

    #[test]
    fn test_short_title_at_limit_passes() {
        let mut c = candidate();
        c.short_title = vec!["کلمه"; 5].join(" ");
        let validator = Validator::new(5);
        assert!(validator.validate(c, SOURCE).into_result().is_ok());
    }

    #[test]
    fn test_fatal_into_error() {
        let mut c = candidate();
        c.short_title = vec!["کلمه"; 3].join(" ");
        let err = Validator::new(2).validate(c, SOURCE).into_result().unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { .. }));
    }
}
