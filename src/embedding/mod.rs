//! Embedding backends.
//!
//! Provides the [`EmbeddingProvider`] trait, the [`BackendLoader`] factory
//! used by the enrichment service to initialize a backend lazily, and two
//! implementations: a local ONNX Runtime model ([`local`]) and an
//! OpenAI-compatible HTTP API ([`remote`]). [`ConfiguredLoader`] picks one
//! from configuration.

pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmbeddingConfig;

/// How per-token representations are combined into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Attention-masked average over all tokens.
    #[default]
    Mean,
    /// Representation of the first (`[CLS]`) token.
    Cls,
}

/// Post-processing requested from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedOptions {
    pub pooling: Pooling,
    pub normalize: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            pooling: Pooling::Mean,
            normalize: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The backend could not be constructed (missing model files, bad config).
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    /// The backend was reachable but the call failed.
    #[error("embedding call failed: {0}")]
    CallFailed(String),

    /// The backend produced output that does not look like an embedding.
    #[error("unexpected backend output: {0}")]
    UnexpectedShape(String),

    #[error("embedding input is empty")]
    EmptyInput,
}

/// A text-to-vector backend.
///
/// Implementations return one vector per call, pooled and (when requested)
/// L2-normalized. They must be safe to share across tasks.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, options: &EmbedOptions) -> Result<Vec<f32>, EmbeddingError>;

    /// Number of dimensions this backend produces.
    fn dimensions(&self) -> usize;
}

/// Builds an [`EmbeddingProvider`]. Loading is assumed to be expensive, so
/// callers run it at most once per process and keep the result.
#[async_trait]
pub trait BackendLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError>;
}

/// Loader that selects a backend from [`EmbeddingConfig::provider`].
pub struct ConfiguredLoader {
    config: EmbeddingConfig,
}

impl ConfiguredLoader {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BackendLoader for ConfiguredLoader {
    async fn load(&self) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        match self.config.provider.as_str() {
            "local" => {
                let config = self.config.clone();
                let provider = tokio::task::spawn_blocking(move || {
                    local::LocalEmbeddingProvider::new(&config)
                })
                .await
                .map_err(|e| EmbeddingError::Unavailable(format!("model load task failed: {e}")))?
                .map_err(|e| EmbeddingError::Unavailable(format!("{e:#}")))?;
                Ok(Arc::new(provider))
            }
            "remote" => {
                let provider = remote::RemoteEmbeddingProvider::from_config(&self.config)?;
                Ok(Arc::new(provider))
            }
            "disabled" => Err(EmbeddingError::Unavailable(
                "embedding provider is disabled in configuration".into(),
            )),
            other => Err(EmbeddingError::Unavailable(format!(
                "unknown embedding provider: {other}. Supported: local, remote, disabled"
            ))),
        }
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = vec![3.0, 4.0];
        let normalized = l2_normalize(&v);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = vec![0.0, 0.0, 0.0];
        assert_eq!(l2_normalize(&v), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn default_options_are_mean_normalized() {
        let options = EmbedOptions::default();
        assert_eq!(options.pooling, Pooling::Mean);
        assert!(options.normalize);
    }

    #[tokio::test]
    async fn disabled_provider_is_unavailable() {
        let config = EmbeddingConfig {
            provider: "disabled".into(),
            ..Default::default()
        };
        let err = ConfiguredLoader::new(config).load().await.err().unwrap();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unknown_provider_is_unavailable() {
        let config = EmbeddingConfig {
            provider: "quantum".into(),
            ..Default::default()
        };
        let err = ConfiguredLoader::new(config).load().await.err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider: quantum"));
    }

    #[tokio::test]
    async fn local_provider_without_model_files_is_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            provider: "local".into(),
            cache_dir: tmp.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let err = ConfiguredLoader::new(config).load().await.err().unwrap();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
        assert!(err.to_string().contains("model download"));
    }
}
