//! SQL DDL for the product catalog.
//!
//! Defines `products`, `products_vec` (vec0) and `catalog_meta`. The vec0
//! column is declared `FLOAT[N]` with the configured embedding length, so
//! sqlite-vec itself refuses vectors of any other length.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    description TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    price_cents INTEGER CHECK(price_cents IS NULL OR price_cents >= 0),
    vendor_id TEXT,
    embedding_status TEXT NOT NULL CHECK(embedding_status IN ('embedded','placeholder')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);
CREATE INDEX IF NOT EXISTS idx_products_vendor ON products(vendor_id);
CREATE INDEX IF NOT EXISTS idx_products_embedding_status ON products(embedding_status);

CREATE TABLE IF NOT EXISTS catalog_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

fn vec_table_sql(dimensions: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS products_vec USING vec0(\n    \
         id TEXT PRIMARY KEY,\n    \
         embedding FLOAT[{dimensions}]\n);"
    )
}

/// Initialize all tables. Idempotent (uses IF NOT EXISTS).
///
/// `dimensions` and `model` are only recorded on first creation; an existing
/// catalog keeps the length and model it was created with (see
/// [`super::verify_dimensions`]).
pub fn init_schema(conn: &Connection, dimensions: usize, model: &str) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&vec_table_sql(dimensions))?;

    conn.execute(
        "INSERT OR IGNORE INTO catalog_meta (key, value) VALUES ('schema_version', ?1)",
        [super::meta::SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO catalog_meta (key, value) VALUES ('embedding_dimensions', ?1)",
        [dimensions.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO catalog_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;

    Ok(())
}
