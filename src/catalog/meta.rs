//! Catalog metadata in `catalog_meta`: schema version and the embedding
//! model and length the stored vectors were produced with.

use rusqlite::{Connection, OptionalExtension};

pub const SCHEMA_VERSION: u32 = 1;

fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM catalog_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO catalog_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(get_meta(conn, "schema_version")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Identifier of the model that produced the stored vectors, if recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    set_meta(conn, "embedding_model", model)
}

/// Vector length the catalog was created with.
pub fn get_embedding_dimensions(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, "embedding_dimensions")?.and_then(|v| v.parse().ok()))
}
