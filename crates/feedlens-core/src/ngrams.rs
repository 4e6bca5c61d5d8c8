//! TF-IDF weighted bigram/trigram extraction over Persian comments.
//!
//! Weights follow the usual smoothed formulation: raw term counts per
//! document, `idf = ln((1 + n) / (1 + df)) + 1`, each document vector
//! L2-normalized, and the final score of an n-gram is the sum of its
//! weights across documents.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::defaults;
use crate::models::NgramScore;
use crate::script::is_arabic_word;
use crate::text::normalize_for_match;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "و", "در", "به", "از", "که", "این", "آن", "با", "را", "برای", "تا", "هم", "یا",
        "اما", "ولی", "اگر", "چون", "نیز", "بر", "پس", "می", "نمی", "ها", "های", "هایی",
        "است", "هست", "بود", "شد", "شده", "شود", "کرد", "کنم", "کنید", "کند", "من", "ما",
        "شما", "او", "آنها", "ایشان", "خود", "یک", "هر", "همه", "چه", "چی", "دیگه", "دیگر",
        "رو", "هیچ", "باید", "خیلی", "فقط", "الان", "ی",
    ]
    .into_iter()
    .collect()
});

/// Split a comment into Persian word tokens, dropping stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_for_match(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| is_arabic_word(t) && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Configurable TF-IDF n-gram extractor.
#[derive(Debug, Clone)]
pub struct NgramExtractor {
    pub min_n: usize,
    pub max_n: usize,
    pub min_df: usize,
    pub max_df: f64,
    pub top_k: usize,
}

impl Default for NgramExtractor {
    fn default() -> Self {
        Self {
            min_n: 2,
            max_n: 3,
            min_df: defaults::NGRAM_MIN_DF,
            max_df: defaults::NGRAM_MAX_DF,
            top_k: defaults::NGRAM_TOP_K,
        }
    }
}

impl NgramExtractor {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_df(mut self, min_df: usize) -> Self {
        self.min_df = min_df;
        self
    }

    pub fn with_max_df(mut self, max_df: f64) -> Self {
        self.max_df = max_df;
        self
    }

    fn ngrams(&self, tokens: &[String]) -> HashMap<String, f64> {
        let mut counts = HashMap::new();
        for n in self.min_n..=self.max_n {
            for window in tokens.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0.0) += 1.0;
            }
        }
        counts
    }

    /// Top n-grams over `documents`, highest score first.
    pub fn extract<S: AsRef<str>>(&self, documents: &[S]) -> Vec<NgramScore> {
        let per_doc: Vec<HashMap<String, f64>> = documents
            .iter()
            .map(|d| self.ngrams(&tokenize(d.as_ref())))
            .collect();
        let n_docs = per_doc.len();
        if n_docs == 0 {
            return Vec::new();
        }

        let mut df: HashMap<&str, usize> = HashMap::new();
        for counts in &per_doc {
            for gram in counts.keys() {
                *df.entry(gram.as_str()).or_insert(0) += 1;
            }
        }

        let max_df_count = self.max_df * n_docs as f64;
        let idf: HashMap<&str, f64> = df
            .into_iter()
            .filter(|(_, d)| *d >= self.min_df && (*d as f64) <= max_df_count)
            .map(|(g, d)| (g, ((1.0 + n_docs as f64) / (1.0 + d as f64)).ln() + 1.0))
            .collect();

        let mut totals: HashMap<&str, f64> = HashMap::new();
        for counts in &per_doc {
            let weights: Vec<(&str, f64)> = counts
                .iter()
                .filter_map(|(g, tf)| idf.get(g.as_str()).map(|w| (g.as_str(), tf * w)))
                .collect();
            let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm == 0.0 {
                continue;
            }
            for (gram, w) in weights {
                *totals.entry(gram).or_insert(0.0) += w / norm;
            }
        }

        let mut scored: Vec<NgramScore> = totals
            .into_iter()
            .map(|(gram, score)| NgramScore {
                n: gram.split(' ').count(),
                ngram: gram.to_string(),
                score: (score * 10_000.0).round() / 10_000.0,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.ngram.cmp(&b.ngram))
        });
        scored.truncate(self.top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keeps_persian_words_only() {
        let tokens = tokenize("برنامه app خیلی کنده است!! 123 ورود");
        assert_eq!(tokens, vec!["برنامه", "کنده", "ورود"]);
    }

    #[test]
    fn test_tokenize_splits_half_space_suffix() {
        let tokens = tokenize("کارت\u{200C}ها مسدود");
        assert_eq!(tokens, vec!["کارت", "مسدود"]);
    }

    #[test]
    fn test_extract_ranks_frequent_bigram() {
        let docs = vec![
            "انتقال وجه انجام نمیشه",
            "انتقال وجه خطا میده",
            "انتقال وجه کند شده",
            "ورود به برنامه مشکل دارد",
            "رمز پویا نمیاد",
            "رمز پویا دیر میاد",
        ];
        let top = NgramExtractor::default().with_min_df(2).extract(&docs);
        assert!(!top.is_empty());
        assert_eq!(top[0].ngram, "انتقال وجه");
        assert_eq!(top[0].n, 2);
        assert!(top.iter().any(|s| s.ngram == "رمز پویا"));
    }

    #[test]
    fn test_min_df_prunes_rare_ngrams() {
        let docs = vec!["انتقال وجه خراب", "کارت بانکی مسدود"];
        assert!(NgramExtractor::default().extract(&docs).is_empty());
    }

    #[test]
    fn test_max_df_prunes_ubiquitous_ngrams() {
        let docs = vec!["رمز پویا", "رمز پویا", "رمز پویا"];
        let top = NgramExtractor::default().with_min_df(1).extract(&docs);
        assert!(top.is_empty());
    }

    #[test]
    fn test_top_k_truncates() {
        let docs = vec!["الف ب ج د ه و ز"; 2];
        let top = NgramExtractor::default()
            .with_min_df(1)
            .with_max_df(1.0)
            .with_top_k(3)
            .extract(&docs);
        assert_eq!(top.len(), 3);
    }

    #[test]
    fn test_empty_corpus() {
        let docs: Vec<String> = Vec::new();
        assert!(NgramExtractor::default().extract(&docs).is_empty());
    }
}
