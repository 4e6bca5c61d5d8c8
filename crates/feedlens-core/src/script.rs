//! Unicode script checks used by keyword validation and n-gram tokenization.

use unicode_script::{Script, UnicodeScript};

/// True if any character of `text` is in the Latin script.
pub fn contains_latin(text: &str) -> bool {
    text.chars().any(|c| c.script() == Script::Latin)
}

/// True if `word` is non-empty and every alphabetic character is Arabic
/// script (Persian is written in it). Digits and punctuation disqualify.
pub fn is_arabic_word(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.script() == Script::Arabic && c.is_alphabetic())
}
