//! Product enrichment pipeline: canonical text → backend → typed result.

pub mod request;
pub mod result;
pub mod service;

pub use request::{canonical_text, EnrichmentRequest};
pub use result::{EmbeddingStatus, EnrichmentResult, FallbackReason};
pub use service::{EnrichConfig, EnrichError, EnrichmentService};
