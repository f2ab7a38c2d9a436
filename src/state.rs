use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::JsonFileCatalog;
use crate::config::AppConfig;
use crate::embedder::{FastEmbedder, FastEmbedderOptions};
use crate::error::EmbedError;
use crate::service::QueryService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
}

impl AppState {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }

    /// Load the embedding model and build the first index. Blocking: run it
    /// off the async runtime. Only a model that cannot be loaded is an error;
    /// a failed first build leaves the service up with an empty index.
    pub fn from_config(config: &AppConfig) -> Result<Self, EmbedError> {
        let embedder = FastEmbedder::load(&FastEmbedderOptions {
            model_name: config.model_name.clone(),
            cache_dir: PathBuf::from(&config.model_cache_dir),
            batch_size: config.embed_batch_size,
        })?;
        let catalog = JsonFileCatalog::new(&config.examples_path);
        tracing::info!(path = %catalog.path().display(), "Using example catalog");

        let service = QueryService::start(Arc::new(embedder), Arc::new(catalog), config.default_top_k);
        Ok(Self::new(Arc::new(service)))
    }
}
