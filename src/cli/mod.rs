pub mod doctor;
pub mod enrich;
pub mod re_enrich;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use shelfvec::config::EmbeddingConfig;
use shelfvec::embedding::local::{model_paths, MODEL_FILE, TOKENIZER_FILE};

const HF_BASE: &str = "https://huggingface.co/sentence-transformers";

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let (model_path, tokenizer_path) = model_paths(config);
    if let Some(dir) = model_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;
    }

    let repo = format!("{HF_BASE}/{}/resolve/main", config.model);
    let assets = [
        (MODEL_FILE, format!("{repo}/onnx/model.onnx"), model_path),
        (TOKENIZER_FILE, format!("{repo}/tokenizer.json"), tokenizer_path),
    ];

    for (name, url, dest) in &assets {
        if dest.exists() {
            println!("{name} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {name} for {}...", config.model);
        download_file(url, dest).await?;
        println!("{name} saved to {}", dest.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Stream a file to disk with a progress bar. Writes to `<dest>.tmp` first
/// and renames on completion.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}
