//! Text embedding.
//!
//! [`Embedder`] is the seam the index is built against: a synchronous,
//! batched `texts -> vectors` function. [`FastEmbedder`] implements it with
//! fastembed, either through ONNX sentence-transformer models or through a
//! Qwen3 decoder embedder on the candle backend.

use candle_core::{DType, Device};
use fastembed::{EmbeddingModel, InitOptions, Qwen3TextEmbedding, TextEmbedding};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::EmbedError;

/// Maximum token length used when loading Qwen3 embedders.
const QWEN3_MAX_LENGTH: usize = 8192;

const QWEN3_REPO_PREFIX: &str = "Qwen/Qwen3-Embedding";

/// Maps a batch of texts to one vector per text, all of the same dimension.
///
/// Implementations must be deterministic for a fixed model. Calls may block
/// for a long time; async callers run them on the blocking pool.
pub trait Embedder: Send + Sync {
    /// Identifier reported by the health endpoint.
    fn model_id(&self) -> &str;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Check the batch contract: one vector per input and a single dimension
/// across the whole batch. Returns the dimension (0 for an empty batch).
pub fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<usize, EmbedError> {
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    let dimension = vectors.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(EmbedError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }
    Ok(dimension)
}

enum Backend {
    Onnx(TextEmbedding),
    Qwen3(Qwen3TextEmbedding),
}

/// Options for loading a [`FastEmbedder`].
#[derive(Debug, Clone)]
pub struct FastEmbedderOptions {
    pub model_name: String,
    pub cache_dir: PathBuf,
    pub batch_size: usize,
}

pub struct FastEmbedder {
    model_id: String,
    batch_size: usize,
    /// fastembed models need exclusive access while running inference.
    backend: Mutex<Backend>,
}

impl FastEmbedder {
    /// Load the configured model, downloading weights on first use.
    pub fn load(options: &FastEmbedderOptions) -> Result<Self, EmbedError> {
        let name = options.model_name.trim();
        info!(model = name, cache_dir = %options.cache_dir.display(), "Loading embedding model");

        let backend = if name.starts_with(QWEN3_REPO_PREFIX) {
            // `from_hf` has no cache-dir option; weights land in the HF hub cache.
            let device = Device::Cpu;
            let model = Qwen3TextEmbedding::from_hf(name, &device, DType::F32, QWEN3_MAX_LENGTH)
                .map_err(|e| EmbedError::ModelLoad(format!("{}: {}", name, e)))?;
            Backend::Qwen3(model)
        } else {
            let model = onnx_model(name)?;
            let init = InitOptions::new(model)
                .with_cache_dir(options.cache_dir.clone())
                .with_show_download_progress(false);
            let model = TextEmbedding::try_new(init)
                .map_err(|e| EmbedError::ModelLoad(format!("{}: {}", name, e)))?;
            Backend::Onnx(model)
        };

        info!(model = name, "Embedding model loaded");
        Ok(Self {
            model_id: name.to_string(),
            batch_size: options.batch_size,
            backend: Mutex::new(backend),
        })
    }
}

/// Resolve a sentence-transformers style name to a fastembed ONNX model.
/// Both the bare name and the `sentence-transformers/` or `BAAI/` prefixed
/// form are accepted.
fn onnx_model(name: &str) -> Result<EmbeddingModel, EmbedError> {
    let bare = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();
    let model = match bare.as_str() {
        "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
        "all-minilm-l12-v2" => EmbeddingModel::AllMiniLML12V2,
        "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "paraphrase-multilingual-minilm-l12-v2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
        "multilingual-e5-small" => EmbeddingModel::MultilingualE5Small,
        _ => return Err(EmbedError::UnsupportedModel(name.to_string())),
    };
    Ok(model)
}

impl Embedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = std::time::Instant::now();
        let docs: Vec<String> = texts.to_vec();

        let mut backend = self.backend.lock();
        let vectors = match &mut *backend {
            Backend::Onnx(model) => model
                .embed(docs, Some(self.batch_size))
                .map_err(|e| EmbedError::Inference(e.to_string()))?,
            Backend::Qwen3(model) => model
                .embed(&docs)
                .map_err(|e| EmbedError::Inference(e.to_string()))?,
        };
        drop(backend);

        let dimension = check_batch(texts.len(), &vectors)?;
        debug!(
            count = texts.len(),
            dimension,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Embedded batch"
        );
        Ok(vectors)
    }
}
