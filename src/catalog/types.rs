//! Product records as written to and read from the catalog.

use serde::{Deserialize, Serialize};

use crate::enrich::{EmbeddingStatus, EnrichmentRequest};

/// A product as submitted by a vendor, before enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Price in minor currency units.
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub vendor_id: Option<String>,
}

impl NewProduct {
    pub fn to_enrichment_request(&self) -> EnrichmentRequest {
        EnrichmentRequest {
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// A stored product. The embedding itself lives in `products_vec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    /// UUID v7 primary key.
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub price_cents: Option<i64>,
    pub vendor_id: Option<String>,
    pub embedding_status: EmbeddingStatus,
    /// RFC 3339 timestamps.
    pub created_at: String,
    pub updated_at: String,
}

impl ProductRecord {
    pub fn to_enrichment_request(&self) -> EnrichmentRequest {
        EnrichmentRequest {
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Counts of stored products by embedding status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub products: u64,
    pub embedded: u64,
    pub placeholder: u64,
}
