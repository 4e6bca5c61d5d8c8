//! Closed vocabularies for analysis records, plus their synonym tables.
//!
//! Model output is free text; each enum's `from_label` maps a raw label
//! (after lowercasing and a synonym remap) onto the allowed set, returning
//! `None` when the label is unknown so validation can repair it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::normalize_for_match;

/// Lowercase, trim, and turn underscores into spaces.
fn clean_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// COMMENT TYPE
// =============================================================================

/// What the user is doing in a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentType {
    Issue,
    Suggestion,
    Question,
    Praise,
    /// Negative opinion without a concrete defect. Only assigned by rules.
    Criticism,
    Other,
}

impl CommentType {
    pub const ALL: [CommentType; 6] = [
        CommentType::Issue,
        CommentType::Suggestion,
        CommentType::Question,
        CommentType::Praise,
        CommentType::Criticism,
        CommentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentType::Issue => "issue",
            CommentType::Suggestion => "suggestion",
            CommentType::Question => "question",
            CommentType::Praise => "praise",
            CommentType::Criticism => "criticism",
            CommentType::Other => "other",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let label = clean_label(raw);
        let label = match label.as_str() {
            "bug" | "problem" | "error" => "issue",
            "feature request" | "request" => "suggestion",
            "complaint" => "criticism",
            other => other,
        };
        Self::ALL.iter().copied().find(|t| t.as_str() == label)
    }

    /// Rule-based type for short comments, derived from sentiment.
    pub fn from_sentiment(sentiment: Option<&str>) -> Self {
        match sentiment.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("positive") | Some("very positive") => CommentType::Praise,
            Some("negative") | Some("very negative") => CommentType::Criticism,
            _ => CommentType::Other,
        }
    }
}

impl fmt::Display for CommentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CATEGORY
// =============================================================================

/// Technical area a comment is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Transfer,
    Auth,
    Card,
    Bill,
    Loan,
    Login,
    Ui,
    Performance,
    Ai,
    Support,
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Transfer,
        Category::Auth,
        Category::Card,
        Category::Bill,
        Category::Loan,
        Category::Login,
        Category::Ui,
        Category::Performance,
        Category::Ai,
        Category::Support,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transfer => "transfer",
            Category::Auth => "auth",
            Category::Card => "card",
            Category::Bill => "bill",
            Category::Loan => "loan",
            Category::Login => "login",
            Category::Ui => "ui",
            Category::Performance => "performance",
            Category::Ai => "ai",
            Category::Support => "support",
            Category::Other => "other",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let label = clean_label(raw);
        let label = match label.as_str() {
            "authentication" | "authorization" | "otp" => "auth",
            "sign in" | "signin" | "log in" => "login",
            "money transfer" | "transfers" => "transfer",
            "cards" => "card",
            "bills" | "bill payment" => "bill",
            "loans" => "loan",
            "user interface" | "ux" | "design" => "ui",
            "speed" => "performance",
            "ai assistant" | "assistant" => "ai",
            "customer support" => "support",
            other => other,
        };
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// AI TITLE
// =============================================================================

/// Coarse app-feature label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiTitle {
    #[serde(rename = "loan")]
    Loan,
    #[serde(rename = "transfer")]
    Transfer,
    #[serde(rename = "card")]
    Card,
    #[serde(rename = "bill")]
    Bill,
    #[serde(rename = "top-up")]
    TopUp,
    #[serde(rename = "ai")]
    Ai,
    #[serde(rename = "account")]
    Account,
    #[serde(rename = "profile")]
    Profile,
    #[serde(rename = "internet package")]
    InternetPackage,
    #[serde(rename = "in general")]
    InGeneral,
    #[serde(rename = "other")]
    Other,
}

impl AiTitle {
    pub const ALL: [AiTitle; 11] = [
        AiTitle::Loan,
        AiTitle::Transfer,
        AiTitle::Card,
        AiTitle::Bill,
        AiTitle::TopUp,
        AiTitle::Ai,
        AiTitle::Account,
        AiTitle::Profile,
        AiTitle::InternetPackage,
        AiTitle::InGeneral,
        AiTitle::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiTitle::Loan => "loan",
            AiTitle::Transfer => "transfer",
            AiTitle::Card => "card",
            AiTitle::Bill => "bill",
            AiTitle::TopUp => "top-up",
            AiTitle::Ai => "ai",
            AiTitle::Account => "account",
            AiTitle::Profile => "profile",
            AiTitle::InternetPackage => "internet package",
            AiTitle::InGeneral => "in general",
            AiTitle::Other => "other",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let label = clean_label(raw);
        let label = match label.as_str() {
            "ai assistant" | "assistant" => "ai",
            "topup" | "top up" | "charge" => "top-up",
            "internet" | "internet packages" => "internet package",
            "general" => "in general",
            "accounts" => "account",
            "loans" => "loan",
            "cards" => "card",
            "bills" => "bill",
            other => other,
        };
        Self::ALL.iter().copied().find(|t| t.as_str() == label)
    }

    /// Contextual hint from the source-section title.
    ///
    /// Walks [`TITLE_HINTS`] in order; the first keyword contained in the
    /// normalized title wins.
    pub fn from_section_title(title: Option<&str>) -> Self {
        let Some(title) = title.filter(|t| !t.trim().is_empty()) else {
            return AiTitle::Other;
        };
        let normalized = normalize_for_match(title);
        TITLE_HINTS
            .iter()
            .find(|(keyword, _)| normalized.contains(&normalize_for_match(keyword)))
            .map(|(_, label)| *label)
            .unwrap_or(AiTitle::Other)
    }
}

impl fmt::Display for AiTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered section-title keyword → label map.
pub const TITLE_HINTS: &[(&str, AiTitle)] = &[
    ("دریافت تسهیلات", AiTitle::Loan),
    ("انتقال وجه", AiTitle::Transfer),
    ("کارت‌ها", AiTitle::Card),
    ("پرداخت قبض", AiTitle::Bill),
    ("خرید شارژ", AiTitle::TopUp),
    ("دستیار هوشمند", AiTitle::Ai),
    ("مدیریت حساب‌ها", AiTitle::Account),
    ("سایر", AiTitle::Other),
    ("پروفایل", AiTitle::Profile),
    ("خرید اینترنت", AiTitle::InternetPackage),
    ("کلیت اپلیکیشن", AiTitle::InGeneral),
];

// =============================================================================
// SEVERITY / PRIORITY
// =============================================================================

/// Severity of an issue or priority of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::High => "high",
            Level::Medium => "medium",
            Level::Low => "low",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match clean_label(raw).as_str() {
            "high" => Some(Level::High),
            "medium" => Some(Level::Medium),
            "low" => Some(Level::Low),
            _ => None,
        }
    }
}

// =============================================================================
// NEUTRAL PHRASES
// =============================================================================

/// Phrases that mark a comment as neutral regardless of model output.
pub const NEUTRAL_PHRASES: &[&str] = &[
    "بد نیست",
    "بد‌نیست",
    "بد نبود",
    "بدک نیست",
    "بدی نیست",
    "نظری ندارم",
    "نظر خاصی ندارم",
    "ندارم",
    "نه خوب نه بعد",
    "معمولی",
];

/// True if the raw text contains any neutral phrase.
pub fn is_forced_neutral(text: &str) -> bool {
    NEUTRAL_PHRASES.iter().any(|phrase| text.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_synonyms() {
        assert_eq!(Category::from_label("authentication"), Some(Category::Auth));
        assert_eq!(Category::from_label(" Auth "), Some(Category::Auth));
        assert_eq!(Category::from_label("AI assistant"), Some(Category::Ai));
        assert_eq!(Category::from_label("billing-issue"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_ai_title_labels() {
        assert_eq!(AiTitle::from_label("ai assistant"), Some(AiTitle::Ai));
        assert_eq!(AiTitle::from_label("top-up"), Some(AiTitle::TopUp));
        assert_eq!(
            AiTitle::from_label("Internet_Package"),
            Some(AiTitle::InternetPackage)
        );
        assert_eq!(AiTitle::from_label("mortgage"), None);
    }

    #[test]
    fn test_ai_title_serde_names() {
        for title in AiTitle::ALL {
            let json = serde_json::to_value(title).unwrap();
            assert_eq!(json, serde_json::json!(title.as_str()));
        }
    }

    #[test]
    fn test_section_title_first_match_wins() {
        assert_eq!(
            AiTitle::from_section_title(Some("انتقال وجه و پرداخت قبض")),
            AiTitle::Transfer
        );
        assert_eq!(
            AiTitle::from_section_title(Some("پرداخت قبض و انتقال وجه")),
            AiTitle::Transfer
        );
        assert_eq!(
            AiTitle::from_section_title(Some("خرید اینترنت")),
            AiTitle::InternetPackage
        );
    }

    #[test]
    fn test_section_title_half_space_variants() {
        assert_eq!(
            AiTitle::from_section_title(Some("کارت ها")),
            AiTitle::Card
        );
        assert_eq!(
            AiTitle::from_section_title(Some("کارت\u{200C}ها")),
            AiTitle::Card
        );
    }

    #[test]
    fn test_section_title_no_match() {
        assert_eq!(AiTitle::from_section_title(Some("چیز دیگر")), AiTitle::Other);
        assert_eq!(AiTitle::from_section_title(None), AiTitle::Other);
        assert_eq!(AiTitle::from_section_title(Some("  ")), AiTitle::Other);
    }

    #[test]
    fn test_type_from_sentiment() {
        assert_eq!(
            CommentType::from_sentiment(Some("Very Positive")),
            CommentType::Praise
        );
        assert_eq!(
            CommentType::from_sentiment(Some("negative")),
            CommentType::Criticism
        );
        assert_eq!(
            CommentType::from_sentiment(Some("neutral")),
            CommentType::Other
        );
        assert_eq!(CommentType::from_sentiment(None), CommentType::Other);
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(CommentType::from_label("Issue"), Some(CommentType::Issue));
        assert_eq!(CommentType::from_label("bug"), Some(CommentType::Issue));
        assert_eq!(CommentType::from_label("rant"), None);
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(Level::from_label("HIGH"), Some(Level::High));
        assert_eq!(Level::from_label("urgent"), None);
    }

    #[test]
    fn test_forced_neutral() {
        assert!(is_forced_neutral("برنامه بد نیست"));
        assert!(is_forced_neutral("معمولی بود"));
        assert!(!is_forced_neutral("عالی بود"));
    }
}
