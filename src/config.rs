use serde::{Deserialize, Serialize};

/// Model used when `EMB_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Number of results returned when the caller gives no usable `k`.
pub const DEFAULT_TOP_K: usize = 5;

/// Separator placed between an example's message and its reply before embedding.
pub const TEXT_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub listen_addr: String,
    pub model_name: String,
    pub examples_path: String,
    /// Where ONNX model weights are downloaded (`EMB_CACHE_DIR`). Qwen3
    /// models are fetched through the Hugging Face hub and use its own cache
    /// (`HF_HOME`) instead.
    pub model_cache_dir: String,
    pub log_dir: String,
    pub default_top_k: usize,
    pub embed_batch_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("EMB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("EMB_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8700);

        let model_cache_dir = std::env::var("EMB_CACHE_DIR").unwrap_or_else(|_| {
            dirs::cache_dir()
                .map(|d| d.join("exemplar-index").join("models").to_string_lossy().to_string())
                .unwrap_or_else(|| ".exemplar-cache/models".to_string())
        });

        let log_dir = std::env::var("EMB_LOG_DIR").unwrap_or_else(|_| {
            dirs::data_local_dir()
                .map(|d| d.join("exemplar-index").join("logs").to_string_lossy().to_string())
                .unwrap_or_else(|| ".exemplar-data/logs".to_string())
        });

        Self {
            listen_addr: format!("{}:{}", host, port),
            model_name: std::env::var("EMB_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            examples_path: std::env::var("EMB_EXAMPLES_PATH")
                .unwrap_or_else(|_| "data/examples.json".to_string()),
            model_cache_dir,
            log_dir,
            default_top_k: std::env::var("EMB_DEFAULT_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|k: &usize| *k > 0)
                .unwrap_or(DEFAULT_TOP_K),
            embed_batch_size: std::env::var("EMB_EMBED_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|b: &usize| *b > 0)
                .unwrap_or(32),
        }
    }
}
