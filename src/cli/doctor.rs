//! CLI `doctor` command: catalog diagnostics and embedding configuration check.

use anyhow::{Context, Result};

use shelfvec::catalog;
use shelfvec::config::ShelfvecConfig;

pub fn doctor(config: &ShelfvecConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Catalog: not found at {}", db_path.display());
        println!("Run `shelfvec serve` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    // Opened without the length check so a mismatch can be reported.
    catalog::load_sqlite_vec();
    let conn = rusqlite::Connection::open(&db_path)
        .context("failed to open catalog (may be corrupt)")?;

    let report = catalog::check_catalog_health(&conn)
        .context("failed to run health check")?;

    println!("Shelfvec Health Report");
    println!("======================");
    println!();
    println!("Catalog:           {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Provider:        {}", config.embedding.provider);
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    if let Some(ref stored) = report.embedding_model {
        if stored != &config.embedding.model {
            println!("  WARNING: model mismatch!");
            println!("  Run `shelfvec re-enrich --all` to update vectors.");
        }
    }
    println!("Embedding length:");
    match report.embedding_dimensions {
        Some(stored) if stored != config.embedding.dimensions => {
            println!("  Stored:          {stored}");
            println!("  Configured:      {}", config.embedding.dimensions);
            println!("  ERROR: length mismatch!");
            println!("  The catalog refuses writes until the configured length matches.");
        }
        Some(stored) => println!("  Stored:          {stored} (match)"),
        None => println!("  Stored:          (not set)"),
    }
    println!();
    println!("Row counts:");
    println!("  Products:        {}", report.product_count);
    println!("  Placeholders:    {}", report.placeholder_count);
    println!("  Vectors:         {}", report.vector_count);
    if report.placeholder_count > 0 {
        println!("  Run `shelfvec re-enrich` to replace placeholder embeddings.");
    }
    if report.vector_count != report.product_count {
        println!("  WARNING: vector count differs from product count.");
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
