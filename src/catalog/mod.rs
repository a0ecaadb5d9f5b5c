//! SQLite product catalog with a fixed-length vector column.
//!
//! Plays the persistence side of enrichment: products are written together
//! with their embedding, and every write checks the vector length against
//! the length the catalog was created with.

pub mod meta;
pub mod schema;
pub mod store;
pub mod types;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use thiserror::Error;

static SQLITE_VEC_INIT: Once = Once::new();

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("embedding length mismatch: catalog stores {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("product not found: {0}")]
    NotFound(String),

    #[error("catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("catalog serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the catalog at `path` with vectors of `dimensions` length
/// produced by `model`.
///
/// Fails if an existing catalog was created with a different length. A new
/// catalog records `model`; an existing one keeps the model it has.
pub fn open_catalog(
    path: impl AsRef<Path>,
    dimensions: usize,
    model: &str,
) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open catalog at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    prepare(&conn, dimensions, model)?;

    tracing::info!(path = %path.display(), dimensions, "catalog initialized");
    Ok(conn)
}

/// Open a fresh in-memory catalog.
pub fn open_memory_catalog(dimensions: usize, model: &str) -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory catalog")?;
    prepare(&conn, dimensions, model)?;
    Ok(conn)
}

fn prepare(conn: &Connection, dimensions: usize, model: &str) -> Result<()> {
    schema::init_schema(conn, dimensions, model).context("failed to initialize schema")?;
    verify_dimensions(conn, dimensions)?;
    Ok(())
}

/// Check that the catalog's recorded vector length equals `dimensions`.
pub fn verify_dimensions(conn: &Connection, dimensions: usize) -> Result<(), CatalogError> {
    match meta::get_embedding_dimensions(conn)? {
        Some(stored) if stored != dimensions => {
            tracing::error!(
                stored,
                configured = dimensions,
                "catalog embedding length differs from configuration"
            );
            Err(CatalogError::DimensionMismatch {
                expected: stored,
                actual: dimensions,
            })
        }
        _ => Ok(()),
    }
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

/// Inverse of [`embedding_to_bytes`].
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub product_count: u64,
    pub placeholder_count: u64,
    pub vector_count: u64,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Collect schema, extension, count, and integrity information.
pub fn check_catalog_health(conn: &Connection) -> Result<HealthReport> {
    let schema_version = meta::get_schema_version(conn)?;
    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    let embedding_model = meta::get_embedding_model(conn)?;
    let embedding_dimensions = meta::get_embedding_dimensions(conn)?;

    let stats = store::catalog_stats(conn)?;
    let vector_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM products_vec", [], |r| r.get(0))?;

    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |r| r.get(0))?;

    Ok(HealthReport {
        schema_version,
        sqlite_vec_version,
        embedding_model,
        embedding_dimensions,
        product_count: stats.products,
        placeholder_count: stats.placeholder,
        vector_count: vector_count as u64,
        integrity_ok: integrity_details == "ok",
        integrity_details,
    })
}
