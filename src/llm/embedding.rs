//! Embedding client.
//!
//! One remote call per text. The upstream answers in more than one shape
//! depending on the backend build; every accepted shape is normalized to a
//! single vector and anything else is rejected as malformed rather than
//! guessed at.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::EmbeddingError;

/// The seam between the retrieval core and the embedding backend. Tests
/// install deterministic implementations; production uses [`HttpEmbedder`].
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Accepted response encodings for `POST /embed`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbedResponseBody {
    Single { embedding: Vec<f32> },
    Batch { embeddings: Vec<Vec<f32>> },
    Flat { embeddings: Vec<f32> },
}

impl EmbedResponseBody {
    fn into_vector(self) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            EmbedResponseBody::Single { embedding } => Ok(embedding),
            EmbedResponseBody::Batch { embeddings } => {
                embeddings.into_iter().next().ok_or_else(|| {
                    EmbeddingError::MalformedResponse("empty embeddings batch".to_string())
                })
            }
            EmbedResponseBody::Flat { embeddings } => Ok(embeddings),
        }
    }
}

pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl HttpEmbedder {
    pub fn new(client: Client, base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    /// `POST {base_url}/embed {model, input}`. No retries; the caller owns
    /// retry policy.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embed", self.base_url);
        let body = json!({ "model": self.model, "input": text });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| EmbeddingError::Unreachable(err.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            tracing::warn!(%status, %url, "embedding endpoint returned an error");
            return Err(EmbeddingError::UpstreamStatus(status.as_u16()));
        }

        let text_body = res
            .text()
            .await
            .map_err(|err| EmbeddingError::Unreachable(err.to_string()))?;
        let payload: EmbedResponseBody = serde_json::from_str(&text_body).map_err(|err| {
            EmbeddingError::MalformedResponse(format!("unrecognized embedding response: {}", err))
        })?;
        payload.into_vector()
    }
}
