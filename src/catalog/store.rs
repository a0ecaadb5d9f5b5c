//! Write and read paths for products and their embeddings.
//!
//! [`insert_product`] and [`update_embedding`] are the only writers of
//! `products_vec`. Both reject vectors whose length differs from the
//! catalog's before opening a transaction.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::types::{CatalogStats, NewProduct, ProductRecord};
use super::{bytes_to_embedding, embedding_to_bytes, CatalogError};
use crate::enrich::{EmbeddingStatus, EnrichmentResult};

fn check_length(embedding: &[f32], dimensions: usize) -> Result<(), CatalogError> {
    if embedding.len() != dimensions {
        return Err(CatalogError::DimensionMismatch {
            expected: dimensions,
            actual: embedding.len(),
        });
    }
    Ok(())
}

/// Insert a product with its enrichment result. Returns the stored record.
pub fn insert_product(
    conn: &mut Connection,
    product: &NewProduct,
    enrichment: &EnrichmentResult,
    dimensions: usize,
) -> Result<ProductRecord, CatalogError> {
    check_length(enrichment.vector(), dimensions)?;

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let tags_json = serde_json::to_string(&product.tags)?;
    let status = enrichment.status();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO products (id, name, category, description, tags, price_cents, vendor_id, \
         embedding_status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            id,
            product.name,
            product.category,
            product.description,
            tags_json,
            product.price_cents,
            product.vendor_id,
            status.as_str(),
            now,
        ],
    )?;
    insert_vec(&tx, &id, enrichment.vector())?;
    tx.commit()?;

    tracing::debug!(id = %id, status = %status, "product stored");

    Ok(ProductRecord {
        id,
        name: product.name.clone(),
        category: product.category.clone(),
        description: product.description.clone(),
        tags: product.tags.clone(),
        price_cents: product.price_cents,
        vendor_id: product.vendor_id.clone(),
        embedding_status: status,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Replace a product's embedding (explicit re-enrichment).
pub fn update_embedding(
    conn: &mut Connection,
    id: &str,
    enrichment: &EnrichmentResult,
    dimensions: usize,
) -> Result<(), CatalogError> {
    check_length(enrichment.vector(), dimensions)?;

    let now = chrono::Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    let rows = tx.execute(
        "UPDATE products SET embedding_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![enrichment.status().as_str(), now, id],
    )?;
    if rows == 0 {
        return Err(CatalogError::NotFound(id.to_string()));
    }

    // vec0 rows are replaced rather than updated in place
    tx.execute("DELETE FROM products_vec WHERE id = ?1", [id])?;
    insert_vec(&tx, id, enrichment.vector())?;
    tx.commit()?;
    Ok(())
}

fn insert_vec(tx: &Transaction, id: &str, embedding: &[f32]) -> Result<(), CatalogError> {
    tx.execute(
        "INSERT INTO products_vec (id, embedding) VALUES (?1, ?2)",
        params![id, embedding_to_bytes(embedding)],
    )?;
    Ok(())
}

const PRODUCT_COLUMNS: &str = "id, name, category, description, tags, price_cents, vendor_id, \
     embedding_status, created_at, updated_at";

fn row_to_product(row: &Row) -> rusqlite::Result<ProductRecord> {
    let tags_json: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let embedding_status = status_str.parse::<EmbeddingStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into())
    })?;
    let tags = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ProductRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        tags,
        price_cents: row.get(5)?,
        vendor_id: row.get(6)?,
        embedding_status,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn get_product(conn: &Connection, id: &str) -> Result<Option<ProductRecord>, CatalogError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_product).optional()?)
}

pub fn get_embedding(conn: &Connection, id: &str) -> Result<Option<Vec<f32>>, CatalogError> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT embedding FROM products_vec WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(bytes.map(|b| bytes_to_embedding(&b)))
}

/// Products due for re-enrichment, oldest first. With `only_placeholders`
/// set, products that already have a real embedding are skipped.
pub fn list_for_reenrich(
    conn: &Connection,
    only_placeholders: bool,
) -> Result<Vec<ProductRecord>, CatalogError> {
    let filter = if only_placeholders {
        "WHERE embedding_status = 'placeholder'"
    } else {
        ""
    };
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products {filter} ORDER BY created_at, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_product)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Store a re-enrichment result for `product`. A placeholder never replaces
/// a real embedding; returns `false` when the write was skipped for that
/// reason.
pub fn apply_reenrichment(
    conn: &mut Connection,
    product: &ProductRecord,
    enrichment: &EnrichmentResult,
    dimensions: usize,
) -> Result<bool, CatalogError> {
    if enrichment.is_placeholder() && product.embedding_status == EmbeddingStatus::Embedded {
        tracing::debug!(
            id = %product.id,
            reason = ?enrichment.fallback_reason(),
            "keeping existing embedding"
        );
        return Ok(false);
    }
    update_embedding(conn, &product.id, enrichment, dimensions)?;
    Ok(true)
}

pub fn catalog_stats(conn: &Connection) -> Result<CatalogStats, CatalogError> {
    let (products, embedded): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(embedding_status = 'embedded'), 0) FROM products",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(CatalogStats {
        products: products as u64,
        embedded: embedded as u64,
        placeholder: (products - embedded) as u64,
    })
}
