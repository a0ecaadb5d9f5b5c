//! Typed enrichment outcomes.
//!
//! [`EnrichmentResult`] separates real embeddings from zero-vector
//! placeholders so placeholders can be found and re-enriched later.

use serde::{Deserialize, Serialize};

/// Why a placeholder was stored instead of a real embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Canonical text was empty; the backend was never called.
    EmptyInput,
    /// The backend could not be initialized.
    BackendUnavailable,
    /// The backend call returned an error.
    BackendCallFailed,
    /// The backend call did not finish within the configured timeout.
    Timeout,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::BackendUnavailable => "backend_unavailable",
            Self::BackendCallFailed => "backend_call_failed",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted marker for whether a stored vector is real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Embedded,
    Placeholder,
}

impl EmbeddingStatus {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Placeholder => "placeholder",
        }
    }
}

impl std::fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "embedded" => Ok(Self::Embedded),
            "placeholder" => Ok(Self::Placeholder),
            _ => Err(format!("unknown embedding status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentResult {
    /// Vector produced by the backend, unchanged.
    Embedded(Vec<f32>),
    /// All-zero vector of the configured length.
    Placeholder {
        vector: Vec<f32>,
        reason: FallbackReason,
    },
}

impl EnrichmentResult {
    pub fn placeholder(dimensions: usize, reason: FallbackReason) -> Self {
        Self::Placeholder {
            vector: vec![0.0; dimensions],
            reason,
        }
    }

    pub fn vector(&self) -> &[f32] {
        match self {
            Self::Embedded(vector) => vector,
            Self::Placeholder { vector, .. } => vector,
        }
    }

    pub fn into_vector(self) -> Vec<f32> {
        match self {
            Self::Embedded(vector) => vector,
            Self::Placeholder { vector, .. } => vector,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Self::Embedded(_) => None,
            Self::Placeholder { reason, .. } => Some(*reason),
        }
    }

    pub fn status(&self) -> EmbeddingStatus {
        match self {
            Self::Embedded(_) => EmbeddingStatus::Embedded,
            Self::Placeholder { .. } => EmbeddingStatus::Placeholder,
        }
    }
}
