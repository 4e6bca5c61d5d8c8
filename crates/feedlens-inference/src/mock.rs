//! Scripted generation backend for deterministic tests.
//!
//! Replies are resolved in order: queued script entries first, then the
//! first route whose needle appears in the prompt, then the default reply.
//!
//! ```rust,ignore
//! use feedlens_inference::mock::{MockGenerationBackend, MockReply};
//!
//! let backend = MockGenerationBackend::new()
//!     .with_route("category", r#"{"category": "auth"}"#)
//!     .with_script(vec![MockReply::text(""), MockReply::text("{}")]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use feedlens_core::{Error, GenerationBackend, Result};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Text(String),
    Fail(String),
}

impl MockReply {
    pub fn text(s: impl Into<String>) -> Self {
        MockReply::Text(s.into())
    }

    pub fn fail(s: impl Into<String>) -> Self {
        MockReply::Fail(s.into())
    }
}

#[derive(Debug, Clone)]
struct MockConfig {
    model_name: String,
    default_reply: MockReply,
    routes: Vec<(String, MockReply)>,
    latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model_name: "mock-llm".to_string(),
            default_reply: MockReply::text("{}"),
            routes: Vec::new(),
            latency_ms: 0,
        }
    }
}

/// A recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
}

/// Mock generation backend for testing.
#[derive(Clone, Default)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model_name = name.into();
        self
    }

    /// Reply used when no script entry or route applies.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_reply = MockReply::text(response);
        self
    }

    /// Reply with `response` whenever the prompt contains `needle`.
    pub fn with_route(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .routes
            .push((needle.into(), MockReply::text(response)));
        self
    }

    /// Fail whenever the prompt contains `needle`.
    pub fn with_failing_route(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .routes
            .push((needle.into(), MockReply::fail(message)));
        self
    }

    /// Queue replies consumed one per call before routes apply.
    pub fn with_script(self, replies: Vec<MockReply>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(replies);
        self
    }

    /// Simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Calls whose prompt contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.prompt.contains(needle))
            .count()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        if let Some(reply) = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return reply;
        }
        self.config
            .routes
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.config.default_reply.clone())
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
            });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
        let reply = self.next_reply(prompt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(message) => Err(Error::Inference(message)),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
