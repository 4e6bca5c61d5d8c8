//! Invariants every validated analysis record must satisfy, exercised over a
//! spread of messy model outputs.
//!
//! - enumerated fields always land in their allowed sets
//! - evidence is a normalized substring of the source or the 300-char fallback
//! - keywords count is in [1, 6] and no keyword contains Latin script

use feedlens_core::script::contains_latin;
use feedlens_core::text::{normalize_for_match, take_chars};
use feedlens_core::{AiTitle, Candidate, Category, CommentType, Validation, Validator};

const SOURCE: &str = "سلام. بعد از بروزرسانی، رمز پویا برای انتقال وجه ارسال نمیشه و برنامه هنگ میکنه.";

fn messy_candidates() -> Vec<Candidate> {
    let labels = ["issue", "Bug", "", "billing-issue", "authentication", "AI assistant", "??"];
    let keyword_sets: Vec<Vec<String>> = vec![
        vec![],
        vec!["OTP".into()],
        vec!["رمز پویا".into(), "otp code".into()],
        (0..10).map(|i| format!("کلیدواژه{i}")).collect(),
        vec!["   ".into(), "انتقال".into()],
    ];
    let evidences = [
        "رمز پویا برای انتقال وجه ارسال نمیشه",
        "رمز   پویا\nبرای انتقال",
        "",
        "the app crashes",
        "جمله ساختگی",
    ];

    let mut out = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        for (j, keywords) in keyword_sets.iter().enumerate() {
            out.push(Candidate {
                comment_id: (i * 10 + j) as i64,
                comment_type: label.to_string(),
                category: label.to_string(),
                ai_title: label.to_string(),
                short_title: "مشکل رمز پویا".into(),
                normalized_title: "عدم ارسال رمز پویا".into(),
                keywords: keywords.clone(),
                evidence: evidences[(i + j) % evidences.len()].to_string(),
                severity: Some(label.to_string()),
                priority: Some("medium".into()),
                model: "phi4_semantic".into(),
                ..Default::default()
            });
        }
    }
    out
}

#[test]
fn test_validated_records_satisfy_invariants() {
    let validator = Validator::default();
    let normalized_source = normalize_for_match(SOURCE);

    for candidate in messy_candidates() {
        let outcome = validator.validate(candidate, SOURCE);
        let record = match outcome {
            Validation::Clean(r) | Validation::Repaired { record: r, .. } => r,
            Validation::Fatal(v) => panic!("unexpected fatal outcome: {v:?}"),
        };

        assert!(CommentType::ALL.contains(&record.comment_type));
        assert!(Category::ALL.contains(&record.category));
        assert!(AiTitle::ALL.contains(&record.ai_title));

        let evidence_ok = normalized_source.contains(&normalize_for_match(&record.evidence))
            && !record.evidence.trim().is_empty();
        assert!(evidence_ok || record.evidence == take_chars(SOURCE, 300));

        assert!((1..=6).contains(&record.keywords.len()));
        assert!(record.keywords.iter().all(|k| !contains_latin(k)));

        if record.comment_type != CommentType::Issue {
            assert!(record.severity.is_none());
        }
        if record.comment_type != CommentType::Suggestion {
            assert!(record.priority.is_none());
        }
    }
}

#[test]
fn test_category_remap_examples() {
    let validator = Validator::default();
    let mut candidate = messy_candidates().remove(0);

    candidate.category = "authentication".into();
    let (record, _) = validator
        .validate(candidate.clone(), SOURCE)
        .into_result()
        .unwrap();
    assert_eq!(record.category, Category::Auth);

    candidate.category = "billing-issue".into();
    let (record, repairs) = validator.validate(candidate, SOURCE).into_result().unwrap();
    assert_eq!(record.category, Category::Other);
    assert!(repairs
        .iter()
        .any(|r| r.field == "category" && r.before == "billing-issue" && r.after == "other"));
}
