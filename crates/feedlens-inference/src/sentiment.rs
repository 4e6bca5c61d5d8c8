//! LLM-backed sentiment classification.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use feedlens_core::{GenerationBackend, Result, SentimentClassifier, SentimentLabel};

use crate::prompts;
use crate::retry::{generate_non_empty, RetryPolicy};
use crate::structured::{extract_json_object, lenient_string};

const SENTIMENT_SYSTEM: &str =
    "You label the sentiment of banking app reviews. Reply with one JSON object only.";

/// Classifier that asks a generation backend for a label.
pub struct LlmSentimentClassifier {
    backend: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
}

impl LlmSentimentClassifier {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl SentimentClassifier for LlmSentimentClassifier {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "sentiment", model = %self.backend.model_name(), text_len = text.len()))]
    async fn classify(&self, text: &str) -> Result<SentimentLabel> {
        if text.trim().is_empty() {
            return Ok(SentimentLabel::NoComments);
        }

        let prompt = prompts::sentiment_prompt(text);
        let raw = generate_non_empty(self.backend.as_ref(), SENTIMENT_SYSTEM, &prompt, self.policy)
            .await?;

        // Some models answer with the bare label instead of an object.
        let label = match extract_json_object(&raw) {
            Ok(map) => lenient_string(map.get("sentiment")).unwrap_or_default(),
            Err(_) => raw.clone(),
        };
        let parsed = SentimentLabel::parse_lenient(&label).unwrap_or(SentimentLabel::NoSentiment);
        debug!(raw_label = %label, label = %parsed, "Sentiment classified");
        Ok(parsed)
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
