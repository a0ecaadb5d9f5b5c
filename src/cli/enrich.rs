//! CLI `enrich` command: preview enrichment for one product.

use anyhow::Result;
use clap::Args;

use shelfvec::config::ShelfvecConfig;
use shelfvec::enrich::{canonical_text, EnrichmentRequest, EnrichmentService};

#[derive(Debug, Args)]
pub struct EnrichArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub category: String,
    #[arg(long)]
    pub description: Option<String>,
    /// May be repeated
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

impl From<EnrichArgs> for EnrichmentRequest {
    fn from(args: EnrichArgs) -> Self {
        EnrichmentRequest {
            name: args.name,
            category: args.category,
            description: args.description,
            tags: args.tags,
        }
    }
}

pub async fn enrich(config: &ShelfvecConfig, args: EnrichArgs) -> Result<()> {
    let request = EnrichmentRequest::from(args);
    let service = EnrichmentService::from_config(&config.embedding);

    println!("Canonical text: {:?}", canonical_text(&request));

    let result = service.enrich(&request).await?;
    let vector = result.vector();
    let preview: Vec<String> = vector.iter().take(8).map(|x| format!("{x:.4}")).collect();

    println!("Status:         {}", result.status());
    if let Some(reason) = result.fallback_reason() {
        println!("Fallback:       {reason}");
    }
    println!("Dimensions:     {}", vector.len());
    println!("First values:   [{}, ...]", preview.join(", "));
    Ok(())
}
