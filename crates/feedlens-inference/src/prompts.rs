//! Prompt templates.
//!
//! Every template asks for a single JSON object; field names match the
//! structs in [`crate::extraction`] and [`crate::sentiment`].

/// System prompt shared by the extraction stages.
pub const EXTRACTION_SYSTEM: &str = "You analyze Persian user comments about a banking mobile app. \
Reply with exactly one JSON object and nothing else. No markdown, no explanation.";

/// Stage 1: semantic fields from the comment text.
pub fn semantic_prompt(comment_text: &str, ai_title_hint: &str) -> String {
    format!(
        r#"Analyze ONE Persian user comment and return ONE JSON object.

Rules:
- Use ONLY the comment text.
- evidence MUST be an exact quote copied from the comment.
- short_title: at most 10 words.
- short_title, normalized_title, evidence and keywords MUST be Persian. Never use English letters.
- keywords: 1 to 6 short Persian phrases.
- If type != issue then severity = null.
- If type != suggestion then priority = null.
- The app section the comment was left under suggests ai_title "{ai_title_hint}". Use it unless the text clearly talks about another feature.

Allowed values:
type: issue | suggestion | question | praise | other
ai_title: loan | transfer | card | bill | top-up | ai | account | profile | internet package | in general | other
severity / priority: high | medium | low | null

JSON format:
{{
  "type": "",
  "ai_title": "",
  "short_title": "",
  "normalized_title": "",
  "keywords": [],
  "evidence": "",
  "severity": null,
  "priority": null
}}

Comment:
{comment}
"#,
        ai_title_hint = ai_title_hint,
        comment = comment_text.trim(),
    )
}

/// Stage 2: technical category from the stage 1 summary fields.
pub fn category_prompt(normalized_title: &str, comment_type: &str, ai_title: &str) -> String {
    format!(
        r#"Pick the technical category of a banking app comment.

normalized_title: {normalized_title}
type: {comment_type}
ai_title: {ai_title}

Allowed values:
category: transfer | auth | card | bill | loan | login | ui | performance | ai | support | other

JSON format:
{{"category": ""}}
"#
    )
}

/// Summarize one chunk of normalized titles.
pub fn summarize_prompt(
    title: &str,
    comment_type: &str,
    category: &str,
    sentiment: &str,
    normalized_titles: &[String],
) -> String {
    let items = normalized_titles
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"You are an expert in retail banking. Summarize the following short user comments.
All comments share title "{title}", type "{comment_type}", category "{category}" and sentiment "{sentiment}".

Rules:
- The summary MUST be Persian.
- Cover every recurring point; merge duplicates.
- Do not invent a title.

JSON format:
{{"summarized_comment": ""}}

Comments:
{items}
"#
    )
}

/// Merge partial summaries of one combination into a final summary.
pub fn merge_prompt(
    title: &str,
    comment_type: &str,
    category: &str,
    sentiment: &str,
    partials: &[String],
) -> String {
    let items = partials
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Merge these partial Persian summaries into one Persian summary without losing any point.
Title "{title}", type "{comment_type}", category "{category}", sentiment "{sentiment}".

JSON format:
{{"summarized_comment": ""}}

Partial summaries:
{items}
"#
    )
}

/// Sentiment label for one comment.
pub fn sentiment_prompt(comment_text: &str) -> String {
    format!(
        r#"Classify the sentiment of this Persian banking app comment.

Allowed values:
sentiment: very negative | negative | neutral | mixed | positive | very positive | no sentiment expressed

JSON format:
{{"sentiment": ""}}

Comment:
{comment}
"#,
        comment = comment_text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_prompt_embeds_comment_and_hint() {
        let p = semantic_prompt("  انتقال وجه خطا میده  ", "transfer");
        assert!(p.contains("Comment:\nانتقال وجه خطا میده\n"));
        assert!(p.contains("suggests ai_title \"transfer\""));
        assert!(p.contains("\"keywords\": []"));
    }

    #[test]
    fn test_category_prompt_lists_taxonomy() {
        let p = category_prompt("خطای ورود", "issue", "account");
        assert!(p.contains("normalized_title: خطای ورود"));
        assert!(p.contains("auth | card"));
        assert!(p.contains("{\"category\": \"\"}"));
    }

    #[test]
    fn test_summarize_prompt_lists_titles() {
        let p = summarize_prompt(
            "انتقال وجه",
            "issue",
            "transfer",
            "negative",
            &["الف".to_string(), "ب".to_string()],
        );
        assert!(p.contains("- الف\n- ب"));
    }

    #[test]
    fn test_merge_prompt_numbers_partials() {
        let p = merge_prompt("t", "issue", "bill", "neutral", &["x".into(), "y".into()]);
        assert!(p.contains("1. x\n2. y"));
    }
}
