//! # HTTP Embedding Client
//!
//! Client for an embedding service exposing `POST {base_url}/embed`
//! with body `{"input": "<text>"}` and response
//! `{"embedding": [f32; 384]}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{EmbedError, EmbeddingProvider, EMBEDDING_DIM};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Reqwest-backed embedding client.
#[derive(Debug)]
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpEmbeddingClient {
    /// Build a client with the given base URL and timeout (seconds).
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EmbedError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/embed", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&EmbedRequest { input: text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbedError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    EmbedError::Unavailable(format!("{url}: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(EmbedError::Unavailable(format!("{url}: HTTP {status}")));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::BadResponse(e.to_string()))?;

        if body.embedding.len() != EMBEDDING_DIM {
            return Err(EmbedError::WrongDimension {
                got: body.embedding.len(),
                expected: EMBEDDING_DIM,
            });
        }

        let mut embedding = body.embedding;
        crate::vector::l2_normalize(&mut embedding);
        Ok(embedding)
    }
}
