//! HTTP embedding client.
//!
//! Speaks both the Ollama shape (`{"model", "prompt"}` answered with
//! `{"embedding": [...]}`) and the OpenAI shape (`{"model", "input"}`
//! answered with `{"data": [{"embedding": [...]}]}`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingError, EmbeddingService};
use crate::config::EmbeddingConfig;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP embedding client
pub struct HttpEmbeddingClient {
    endpoint: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// Request body; carries the text under both common field names
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Single { embedding: Vec<f32> },
    Batch { data: Vec<EmbeddingDatum> },
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    /// Create a new client
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig, timeout: Duration) -> Self {
        Self::new(config.endpoint.clone(), config.model.clone()).with_timeout(timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
                input: text,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(EmbeddingError::Protocol(format!(
                "embedding service returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        parse_embedding_response(&body)
    }
}

/// Extract the vector from either supported response shape
pub fn parse_embedding_response(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::Protocol(format!("unexpected response: {}", e)))?;

    let vector = match parsed {
        EmbeddingResponse::Single { embedding } => embedding,
        EmbeddingResponse::Batch { data } => data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Protocol("empty data array".to_string()))?,
    };

    if vector.is_empty() {
        return Err(EmbeddingError::Protocol("empty embedding".to_string()));
    }
    Ok(vector)
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!(endpoint = %self.endpoint, chars = text.len(), "Requesting embedding");
        tokio::time::timeout(self.timeout, self.request(text))
            .await
            .map_err(|_| EmbeddingError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_shape() {
        let vector = parse_embedding_response(r#"{"embedding":[0.5,-1.0,2.0]}"#).unwrap();
        assert_eq!(vector, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_batch_shape() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[1.0,0.0]}],"model":"m"}"#;
        assert_eq!(parse_embedding_response(body).unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            parse_embedding_response(r#"{"data":[]}"#),
            Err(EmbeddingError::Protocol(_))
        ));
        assert!(matches!(
            parse_embedding_response(r#"{"error":"model not found"}"#),
            Err(EmbeddingError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = HttpEmbeddingClient::new("http://127.0.0.1:9/embed", "test")
            .with_timeout(Duration::from_secs(2));
        let result = client.embed("hello").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::Transport(_)) | Err(EmbeddingError::Timeout(_))
        ));
    }
}
