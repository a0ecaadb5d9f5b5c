//! OpenAI-compatible HTTP embedding provider.
//!
//! Talks to any service exposing `POST {base_url}/embeddings` with the OpenAI
//! request/response format. Pooling happens server-side; `normalize` is
//! applied locally so the output contract matches the local provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{l2_normalize, EmbedOptions, EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    /// Only models with adjustable output length accept this field.
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f64>,
}

pub struct RemoteEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dim: usize,
    send_dimensions: bool,
}

impl RemoteEmbeddingProvider {
    pub fn new(api_key: &str, base_url: &str, model: &str, dim: usize) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dim,
            send_dimensions: false,
        }
    }

    /// Ask the server for `dim`-length output via the request's `dimensions`
    /// field.
    pub fn with_send_dimensions(mut self, send: bool) -> Self {
        self.send_dimensions = send;
        self
    }

    fn request_body<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.model,
            input: [text],
            dimensions: self.send_dimensions.then_some(self.dim),
            encoding_format: "float",
        }
    }

    /// Build from config. The API key is read from the environment variable
    /// named by `api_key_env`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EmbeddingError::Unavailable(format!(
                "remote embedding provider needs an API key in ${}",
                config.api_key_env
            ))
        })?;
        tracing::info!(
            base_url = %config.base_url,
            model = %config.model,
            "remote embedding provider configured"
        );
        Ok(Self::new(&api_key, &config.base_url, &config.model, config.dimensions)
            .with_send_dimensions(config.send_dimensions))
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(
        &self,
        text: &str,
        options: &EmbedOptions,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let url = format!("{}/embeddings", self.base_url);
        let body = self.request_body(text);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::CallFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::CallFailed(format!("HTTP {status}: {body}")));
        }

        let data: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::CallFailed(e.to_string()))?;

        let embedding = data
            .data
            .into_iter()
            .find(|item| item.index == 0)
            .ok_or_else(|| {
                EmbeddingError::UnexpectedShape("response has no embedding at index 0".into())
            })?
            .embedding;

        let vector: Vec<f32> = embedding.into_iter().map(|v| v as f32).collect();
        Ok(if options.normalize {
            l2_normalize(&vector)
        } else {
            vector
        })
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}
