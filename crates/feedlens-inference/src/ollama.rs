//! Ollama inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use feedlens_core::{defaults, Error, GenerationBackend, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = defaults::GEN_TIMEOUT_SECS;

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    gen_model: String,
    temperature: f32,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            defaults::GEN_TEMPERATURE,
            GEN_TIMEOUT_SECS,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(
        base_url: String,
        gen_model: String,
        temperature: f32,
        gen_timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "ollama",
            "Initializing Ollama backend: url={}, gen={}, temperature={}",
            base_url,
            gen_model,
            temperature
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gen_model,
            temperature,
            gen_timeout_secs,
        })
    }

    /// Create from environment variables.
    ///
    /// - `OLLAMA_BASE`: endpoint (default `http://127.0.0.1:11434`)
    /// - `OLLAMA_GEN_MODEL`: generation model (default `phi4:latest`)
    /// - `OLLAMA_TEMPERATURE`: sampling temperature (default 0)
    /// - `FEEDLENS_GEN_TIMEOUT_SECS`: request timeout (default 120)
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let gen_model =
            std::env::var("OLLAMA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let temperature = std::env::var("OLLAMA_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(defaults::GEN_TEMPERATURE);
        let gen_timeout = std::env::var("FEEDLENS_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GEN_TIMEOUT_SECS);

        Self::with_config(base_url, gen_model, temperature, gen_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the Ollama server is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("Ollama health check passed");
                Ok(true)
            }
            Ok(resp) => {
                warn!("Ollama health check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Shared generation path over the `/api/chat` endpoint.
    async fn generate_internal(
        &self,
        system: &str,
        prompt: &str,
        format: Option<serde_json::Value>,
    ) -> Result<String> {
        let start = Instant::now();

        debug!(
            json_format = format.is_some(),
            "Starting generation via chat API"
        );

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let think = if format.is_some() { Some(false) } else { None };
        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            format,
            think,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis();
        debug!(
            response_len = content.len(),
            duration_ms = elapsed as u64,
            "Generation complete"
        );
        if elapsed > defaults::SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed as u64,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Ollama format enforcement. `"json"` constrains output to valid JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
    options: ChatOptions,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_internal(system, prompt, None).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate_json", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_json_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_internal(system, prompt, Some(serde_json::json!("json")))
            .await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}
