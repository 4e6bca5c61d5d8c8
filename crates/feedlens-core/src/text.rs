//! Text normalization and identifier hashing.
//!
//! Matching (duplicate detection, evidence checks, title lookup) always runs
//! on the output of [`normalize_for_match`], never on raw text.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Zero-width non-joiner (Persian half-space).
const ZWNJ: char = '\u{200C}';
/// Arabic tatweel (kashida).
const TATWEEL: char = '\u{0640}';

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Normalize Persian text for comparison.
///
/// Unifies Arabic and Persian letter variants, turns half-spaces into
/// spaces, strips diacritics and tatweel, and collapses whitespace.
pub fn normalize_for_match(text: &str) -> String {
    let mapped: String = text
        .chars()
        .filter_map(|c| match c {
            'ي' | 'ى' => Some('ی'),
            'ك' => Some('ک'),
            'ة' => Some('ه'),
            ZWNJ | '\u{200D}' | '\u{00A0}' => Some(' '),
            TATWEEL => None,
            '\u{064B}'..='\u{065F}' | '\u{0670}' => None,
            '\r' | '\n' | '\t' => Some(' '),
            other => Some(other),
        })
        .collect();
    collapse_whitespace(&mapped)
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First `n` characters of `text` (character-, not byte-based).
pub fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Hash a user identifier for storage.
///
/// The identifier is trimmed and left-padded with `0` to ten characters
/// before hashing, so numeric ids with and without leading zeros collide.
pub fn hash_identifier(raw: &str) -> String {
    let padded = format!("{:0>10}", raw.trim());
    hex::encode(Sha256::digest(padded.as_bytes()))
}
