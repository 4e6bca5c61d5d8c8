//! HTTP comment source for crawl jobs.
//!
//! Fetches `GET {base}/apps/{app_id}/comments`, which must return a JSON
//! array of raw comments.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};

use feedlens_core::{defaults, CommentSource, Error, RawComment, Result};

pub struct HttpCommentSource {
    client: Client,
    base_url: String,
}

impl HttpCommentSource {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!(
            subsystem = "api",
            component = "comment_source",
            "Comment source configured: url={}",
            base_url
        );
        Ok(Self { client, base_url })
    }

    /// Build from `COMMENT_SOURCE_URL` and `COMMENT_SOURCE_TIMEOUT_SECS`.
    /// Returns `None` when no source URL is configured.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(base_url) = std::env::var("COMMENT_SOURCE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };
        let timeout = std::env::var("COMMENT_SOURCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::SOURCE_TIMEOUT_SECS);
        Self::new(base_url, timeout).map(Some)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CommentSource for HttpCommentSource {
    #[instrument(skip(self), fields(subsystem = "api", component = "comment_source", op = "fetch"))]
    async fn fetch_comments(&self, app_id: i64) -> Result<Vec<RawComment>> {
        let url = format!("{}/apps/{}/comments", self.base_url, app_id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "Comment source returned {} for app {}",
                response.status(),
                app_id
            )));
        }

        let comments: Vec<RawComment> = response.json().await?;
        debug!(count = comments.len(), "Fetched comments");
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_comments_parses_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/7/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"user_id": "alice", "title": "انتقال وجه", "description": "کار نمی کند", "grade": 1},
                {"user_id": "bob", "description": "عالی", "created_at": "2025-03-01T10:00:00Z"}
            ])))
            .mount(&server)
            .await;

        let source = HttpCommentSource::new(format!("{}/", server.uri()), 5).unwrap();
        let comments = source.fetch_comments(7).await.unwrap();

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].user_id, "alice");
        assert_eq!(comments[0].grade, Some(1));
        assert!(comments[0].created_at.is_none());
        assert!(comments[1].created_at.is_some());
    }

    #[tokio::test]
    async fn test_error_status_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apps/3/comments"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpCommentSource::new(server.uri(), 5).unwrap();
        let err = source.fetch_comments(3).await.unwrap_err();
        assert!(matches!(err, Error::Request(msg) if msg.contains("503")));
    }
}
