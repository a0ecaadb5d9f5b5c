//! CLI `re-enrich` command: regenerate stored embeddings.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use shelfvec::catalog::{self, meta, store};
use shelfvec::config::ShelfvecConfig;
use shelfvec::enrich::{EnrichmentRequest, EnrichmentService};

const BATCH_SIZE: usize = 32;

/// Re-enrich placeholder products (or every product with `all`) using the
/// configured backend.
///
/// The configured model is recorded as the catalog's model only after an
/// `all` pass in which every product received a real embedding.
pub async fn re_enrich(config: &ShelfvecConfig, all: bool) -> Result<()> {
    let embedding = &config.embedding;
    let dimensions = embedding.dimensions;
    let mut conn = catalog::open_catalog(config.resolved_db_path(), dimensions, &embedding.model)
        .context("failed to open catalog")?;

    let pending = store::list_for_reenrich(&conn, !all)?;
    let total = pending.len();
    if total == 0 {
        if all {
            meta::set_embedding_model(&conn, &embedding.model)?;
        }
        println!("No products need re-enrichment.");
        return Ok(());
    }

    let service = EnrichmentService::from_config(embedding);
    if let Err(e) = service.warm_up().await {
        anyhow::bail!("embedding backend unavailable, nothing re-enriched: {e}");
    }

    println!("Re-enriching {total} products with model '{}'...", embedding.model);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let mut still_placeholder = 0usize;
    let mut kept = 0usize;
    for chunk in pending.chunks(BATCH_SIZE) {
        let requests: Vec<EnrichmentRequest> =
            chunk.iter().map(|p| p.to_enrichment_request()).collect();
        let results = service
            .enrich_batch(&requests)
            .await
            .context("re-enrichment stopped: backend output does not match catalog length")?;

        for (product, result) in chunk.iter().zip(&results) {
            if !store::apply_reenrichment(&mut conn, product, result, dimensions)? {
                kept += 1;
            } else if result.is_placeholder() {
                still_placeholder += 1;
            }
        }

        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();

    let failed = kept + still_placeholder;
    tracing::info!(total, kept, still_placeholder, "re-enrichment finished");
    println!(
        "Re-enriched {} of {total} products with model '{}'.",
        total - failed,
        embedding.model
    );
    if kept > 0 {
        println!("{kept} products kept their previous embedding after a failed call.");
    }
    if still_placeholder > 0 {
        println!("{still_placeholder} products still have placeholder embeddings.");
    }

    if all && failed == 0 {
        meta::set_embedding_model(&conn, &embedding.model)?;
    } else if let Some(stored) = meta::get_embedding_model(&conn)? {
        if stored != embedding.model {
            println!(
                "Catalog model stays '{stored}' until `shelfvec re-enrich --all` completes \
                 without failures."
            );
        }
    }
    Ok(())
}
