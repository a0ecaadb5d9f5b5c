//! The long-lived enrichment service.
//!
//! [`EnrichmentService`] owns the embedding backend. The backend is loaded on
//! first use through a [`tokio::sync::OnceCell`], so concurrent cold callers
//! share a single in-flight load. Backend failures and timeouts degrade to a
//! zero-vector placeholder; only a vector of the wrong length is an error.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use super::request::{canonical_text, EnrichmentRequest};
use super::result::{EnrichmentResult, FallbackReason};
use crate::config::EmbeddingConfig;
use crate::embedding::{
    BackendLoader, ConfiguredLoader, EmbedOptions, EmbeddingError, EmbeddingProvider,
};

#[derive(Error, Debug)]
pub enum EnrichError {
    /// The backend returned a vector whose length differs from the
    /// configured one. Storing it would corrupt similarity comparisons.
    #[error("embedding length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub dimensions: usize,
    pub timeout: Duration,
    pub options: EmbedOptions,
}

impl From<&EmbeddingConfig> for EnrichConfig {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            dimensions: config.dimensions,
            timeout: config.timeout(),
            options: EmbedOptions {
                pooling: config.pooling,
                normalize: config.normalize,
            },
        }
    }
}

pub struct EnrichmentService {
    loader: Arc<dyn BackendLoader>,
    backend: OnceCell<Arc<dyn EmbeddingProvider>>,
    config: EnrichConfig,
}

impl EnrichmentService {
    pub fn new(loader: Arc<dyn BackendLoader>, config: EnrichConfig) -> Self {
        Self {
            loader,
            backend: OnceCell::new(),
            config,
        }
    }

    /// Service backed by the provider named in configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            Arc::new(ConfiguredLoader::new(config.clone())),
            EnrichConfig::from(config),
        )
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Zero vector of the configured length.
    pub fn fallback(&self) -> Vec<f32> {
        vec![0.0; self.config.dimensions]
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }

    /// Load the backend now instead of on the first request.
    pub async fn warm_up(&self) -> Result<(), EmbeddingError> {
        self.backend().await.map(|_| ())
    }

    async fn backend(&self) -> Result<&Arc<dyn EmbeddingProvider>, EmbeddingError> {
        self.backend
            .get_or_try_init(|| async {
                info!("initializing embedding backend");
                let backend = self.loader.load().await?;
                // Not fatal here: every call then fails with DimensionMismatch.
                if backend.dimensions() != self.config.dimensions {
                    error!(
                        backend = backend.dimensions(),
                        configured = self.config.dimensions,
                        "embedding backend produces a different length than configured"
                    );
                }
                info!(dimensions = backend.dimensions(), "embedding backend ready");
                Ok::<_, EmbeddingError>(backend)
            })
            .await
    }

    /// Turn product text into a vector.
    ///
    /// Never fails because of the backend: unavailability, call errors, and
    /// timeouts all produce [`EnrichmentResult::Placeholder`]. Returns
    /// [`EnrichError::DimensionMismatch`] when the backend answers with a
    /// vector of the wrong length.
    pub async fn enrich(
        &self,
        request: &EnrichmentRequest,
    ) -> Result<EnrichmentResult, EnrichError> {
        let text = canonical_text(request);
        if text.is_empty() {
            debug!("canonical text is empty, skipping backend");
            return Ok(self.placeholder(FallbackReason::EmptyInput));
        }

        let backend = match self.backend().await {
            Ok(backend) => backend,
            Err(e) => {
                warn!(
                    error = %e,
                    product = %request.name,
                    "embedding backend unavailable, storing placeholder"
                );
                return Ok(self.placeholder(FallbackReason::BackendUnavailable));
            }
        };

        let call = backend.embed(&text, &self.config.options);
        let vector = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                warn!(
                    error = %e,
                    product = %request.name,
                    "embedding call failed, storing placeholder"
                );
                return Ok(self.placeholder(FallbackReason::BackendCallFailed));
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    product = %request.name,
                    "embedding call timed out, storing placeholder"
                );
                return Ok(self.placeholder(FallbackReason::Timeout));
            }
        };

        if vector.len() != self.config.dimensions {
            error!(
                expected = self.config.dimensions,
                actual = vector.len(),
                "embedding backend returned a vector of the wrong length"
            );
            return Err(EnrichError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: vector.len(),
            });
        }

        Ok(EnrichmentResult::Embedded(vector))
    }

    /// Enrich several requests in order. Stops at the first length mismatch.
    pub async fn enrich_batch(
        &self,
        requests: &[EnrichmentRequest],
    ) -> Result<Vec<EnrichmentResult>, EnrichError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.enrich(request).await?);
        }
        Ok(results)
    }

    fn placeholder(&self, reason: FallbackReason) -> EnrichmentResult {
        EnrichmentResult::placeholder(self.config.dimensions, reason)
    }
}
