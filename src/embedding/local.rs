//! Local ONNX Runtime embedding provider.
//!
//! Implements [`EmbeddingProvider`] for sentence-transformer models exported
//! to ONNX (all-MiniLM-L6-v2 by default) via `ort`. Handles tokenization,
//! inference, pooling, and L2 normalization. Inference is CPU-bound and runs
//! on the blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{l2_normalize, EmbedOptions, EmbeddingError, EmbeddingProvider, Pooling};
use crate::config::EmbeddingConfig;

/// Maximum sequence length for all-MiniLM-L6-v2 (trained at 256).
const MAX_SEQ_LEN: usize = 256;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Paths of the model and tokenizer inside the configured cache directory.
pub fn model_paths(config: &EmbeddingConfig) -> (PathBuf, PathBuf) {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    (cache_dir.join(MODEL_FILE), cache_dir.join(TOKENIZER_FILE))
}

/// Text used once at load time to read the model's output width.
const WIDTH_CHECK_TEXT: &str = "Product: width check";

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

/// Local ONNX-based embedding provider.
#[derive(Clone)]
pub struct LocalEmbeddingProvider {
    model: Arc<OnnxModel>,
    /// Output width of the loaded model, read from its token embeddings.
    hidden_dim: usize,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for OnnxModel {}
unsafe impl Sync for OnnxModel {}

impl LocalEmbeddingProvider {
    /// Load the model and tokenizer. Blocking; call from the blocking pool.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_path, tokenizer_path) = model_paths(config);

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `shelfvec model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `shelfvec model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        let model = OnnxModel {
            session: Mutex::new(session),
            tokenizer,
        };
        let hidden_dim = model
            .infer(WIDTH_CHECK_TEXT)?
            .first()
            .map(Vec::len)
            .context("model produced no token embeddings")?;
        if hidden_dim != config.dimensions {
            tracing::error!(
                model = hidden_dim,
                configured = config.dimensions,
                "ONNX model output width differs from embedding.dimensions"
            );
        }

        Ok(Self {
            model: Arc::new(model),
            hidden_dim,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(
        &self,
        text: &str,
        options: &EmbedOptions,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        let options = *options;

        tokio::task::spawn_blocking(move || model.run(&text, &options))
            .await
            .map_err(|e| EmbeddingError::CallFailed(format!("inference task failed: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.hidden_dim
    }
}

impl OnnxModel {
    fn run(&self, text: &str, options: &EmbedOptions) -> Result<Vec<f32>, EmbeddingError> {
        let token_embeddings = self
            .infer(text)
            .map_err(|e| EmbeddingError::CallFailed(format!("{e:#}")))?;
        let pooled = pool(&token_embeddings, options.pooling)?;
        Ok(if options.normalize {
            l2_normalize(&pooled)
        } else {
            pooled
        })
    }

    /// Tokenize and run the session. Returns the masked token rows, one
    /// vector per attended token, as wide as the model's hidden size.
    fn infer(&self, text: &str) -> Result<Vec<Vec<f32>>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let seq_len = ids.len();

        let shape = vec![1i64, seq_len as i64];
        let input_ids_tensor = Tensor::from_array((shape.clone(), ids.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), mask.clone().into_boxed_slice()))?;
        // token_type_ids: all zeros (single sentence, no segment B)
        let token_type_ids_tensor =
            Tensor::from_array((shape, vec![0i64; seq_len].into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // The output name varies by ONNX export. Try common names, fall back to index 0.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token_embeddings tensor")?;

        token_rows(&shape, data, &mask)
    }
}

/// Split a `[1, seq, hidden]` output into per-token rows, keeping only the
/// tokens whose attention mask is set. The row width is taken from the
/// output shape, never from configuration.
fn token_rows(dims: &[i64], data: &[f32], mask: &[i64]) -> Result<Vec<Vec<f32>>> {
    anyhow::ensure!(
        dims.len() == 3 && dims[0] == 1 && dims[2] > 0,
        "unexpected token_embeddings shape: {dims:?}, expected [1, seq, hidden]"
    );
    let seq_len = (dims[1] as usize).min(mask.len());
    let hidden = dims[2] as usize;
    anyhow::ensure!(
        data.len() >= seq_len * hidden,
        "token_embeddings holds {} values, shape {dims:?} needs {}",
        data.len(),
        seq_len * hidden
    );

    Ok((0..seq_len)
        .filter(|&s| mask[s] > 0)
        .map(|s| data[s * hidden..(s + 1) * hidden].to_vec())
        .collect())
}

/// Combine per-token rows into a single vector.
fn pool(rows: &[Vec<f32>], pooling: Pooling) -> Result<Vec<f32>, EmbeddingError> {
    let first = rows.first().ok_or_else(|| {
        EmbeddingError::UnexpectedShape("model returned no attended tokens".into())
    })?;

    match pooling {
        Pooling::Cls => Ok(first.clone()),
        Pooling::Mean => {
            let mut sum = vec![0.0f32; first.len()];
            for row in rows {
                for (acc, x) in sum.iter_mut().zip(row) {
                    *acc += x;
                }
            }
            let count = rows.len() as f32;
            Ok(sum.into_iter().map(|x| x / count).collect())
        }
    }
}
