//! Query service: owns the active [`SimilarityIndex`] and the operations
//! callers run against it.
//!
//! The active index sits behind an `RwLock<Arc<_>>`. Readers clone the `Arc`
//! and drop the lock immediately; `rebuild` builds a complete new index
//! without holding the lock and then takes the write lock only to swap the
//! pointer. A search therefore always sees one whole generation.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::catalog::{self, CatalogSource};
use crate::embedder::Embedder;
use crate::error::{AppError, AppResult};
use crate::index::{Scored, SimilarityIndex};

#[derive(Debug, Clone, Serialize)]
pub struct RebuildOutcome {
    /// Size of the catalog behind the active index once the rebuild is done.
    pub count: usize,
    pub generation: u64,
    /// False when a newer rebuild finished first and this one was dropped.
    pub installed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub model: String,
    pub examples: usize,
    pub generation: u64,
    pub dimension: Option<usize>,
    pub indexed_at: Option<String>,
}

/// Turn a caller-supplied `k` into the number of results to return:
/// missing or non-positive values fall back to `default`.
pub fn coerce_top_k(k: Option<i64>, default: usize) -> usize {
    match k {
        Some(k) if k > 0 => usize::try_from(k).unwrap_or(usize::MAX),
        _ => default,
    }
}

pub struct QueryService {
    embedder: Arc<dyn Embedder>,
    source: Arc<dyn CatalogSource>,
    default_top_k: usize,
    current: RwLock<Arc<SimilarityIndex>>,
    last_generation: AtomicU64,
}

impl QueryService {
    /// A service with an empty index; nothing is loaded yet.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        source: Arc<dyn CatalogSource>,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedder,
            source,
            default_top_k: default_top_k.max(1),
            current: RwLock::new(Arc::new(SimilarityIndex::empty())),
            last_generation: AtomicU64::new(0),
        }
    }

    /// Create the service and run the initial build. A failed build is
    /// logged and the service starts with an empty index.
    pub fn start(
        embedder: Arc<dyn Embedder>,
        source: Arc<dyn CatalogSource>,
        default_top_k: usize,
    ) -> Self {
        let service = Self::new(embedder, source, default_top_k);
        if let Err(e) = service.rebuild() {
            warn!(error = %e, "Initial index build failed, serving an empty index");
        }
        service
    }

    /// Snapshot of the active index.
    pub fn current(&self) -> Arc<SimilarityIndex> {
        self.current.read().clone()
    }

    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    /// Top-k search against the active index. Blocks on the embedder.
    pub fn search(&self, query: Option<&str>, k: Option<i64>) -> AppResult<Vec<Scored>> {
        let query = query.unwrap_or_default();
        if query.is_empty() {
            return Err(AppError::BadRequest("missing query".to_string()));
        }
        let k = coerce_top_k(k, self.default_top_k);
        let index = self.current();
        index.query(query, k, self.embedder.as_ref())
    }

    /// Reload the catalog, embed it and install the result. On failure the
    /// active index is left untouched.
    pub fn rebuild(&self) -> AppResult<RebuildOutcome> {
        let generation = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let start = std::time::Instant::now();

        let items = catalog::load(self.source.as_ref());
        let index = SimilarityIndex::build(items, self.embedder.as_ref(), generation).map_err(|e| {
            error!(generation, error = %e, "Index rebuild failed, keeping previous index");
            AppError::from(e)
        })?;
        if index.is_empty() {
            warn!(generation, "Catalog is empty, searches will return no results");
        }

        let mut current = self.current.write();
        let installed = current.generation() < generation;
        let (count, replaced) = if installed {
            let count = index.len();
            (count, Some(std::mem::replace(&mut *current, Arc::new(index))))
        } else {
            // The newer index stays; report what is actually being served.
            (current.len(), None)
        };
        drop(current);
        drop(replaced);

        if installed {
            info!(
                generation,
                count,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Index rebuilt"
            );
        } else {
            warn!(generation, count, "Index rebuild superseded by a newer build, discarded");
        }

        Ok(RebuildOutcome {
            count,
            generation,
            installed,
        })
    }

    pub fn health(&self) -> HealthReport {
        let index = self.current();
        HealthReport {
            status: "ok",
            model: self.model_id().to_string(),
            examples: index.len(),
            generation: index.generation(),
            dimension: index.dimension(),
            indexed_at: index.built_at().map(|t| t.to_rfc3339()),
        }
    }
}
