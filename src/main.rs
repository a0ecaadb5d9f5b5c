mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shelfvec::{config, server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "shelfvec",
    version,
    about = "Product embedding enrichment for marketplace catalogs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP product API
    Serve,
    /// Manage the local embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Regenerate embeddings for stored products
    ReEnrich {
        /// Re-enrich every product, not only placeholders
        #[arg(long)]
        all: bool,
    },
    /// Check catalog health and embedding configuration
    Doctor,
    /// Show the canonical text and embedding for a product without storing it
    Enrich(cli::enrich::EnrichArgs),
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.shelfvec/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::ShelfvecConfig::load()?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::ReEnrich { all } => cli::re_enrich::re_enrich(&config, all).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Enrich(args) => cli::enrich::enrich(&config, args).await?,
    }

    Ok(())
}
