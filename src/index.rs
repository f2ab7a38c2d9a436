//! Exact cosine-similarity index over the example catalog.
//!
//! A [`SimilarityIndex`] is one immutable generation: the catalog items and
//! their unit-normalized embeddings, position-aligned. It is never mutated
//! after [`SimilarityIndex::build`]; replacing it wholesale is the job of
//! [`crate::service::QueryService`].

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

use crate::catalog::CatalogItem;
use crate::embedder::{check_batch, Embedder};
use crate::error::{AppError, AppResult, EmbedError};

/// One search hit: the raw cosine score and the catalog item it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored {
    pub score: f32,
    pub item: CatalogItem,
}

/// Row-major matrix of unit vectors, one row per catalog item.
struct VectorSet {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorSet {
    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }

    fn rows(&self) -> usize {
        self.data.len() / self.dimension
    }
}

pub struct SimilarityIndex {
    items: Vec<CatalogItem>,
    /// `None` exactly when `items` is empty.
    vectors: Option<VectorSet>,
    generation: u64,
    built_at: Option<DateTime<Utc>>,
}

impl SimilarityIndex {
    /// The index a service starts with before (or instead of) a successful build.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            vectors: None,
            generation: 0,
            built_at: None,
        }
    }

    /// Embed every item in one batched call and normalize the results.
    pub fn build(
        items: Vec<CatalogItem>,
        embedder: &dyn Embedder,
        generation: u64,
    ) -> Result<Self, EmbedError> {
        let built_at = Some(Utc::now());
        if items.is_empty() {
            return Ok(Self {
                items,
                vectors: None,
                generation,
                built_at,
            });
        }

        let texts: Vec<String> = items.iter().map(CatalogItem::embedding_text).collect();
        let raw = embedder.embed(&texts)?;
        let dimension = check_batch(texts.len(), &raw)?;
        if dimension == 0 {
            return Err(EmbedError::ZeroDimension);
        }

        let mut data: Vec<f32> = raw.into_iter().flatten().collect();
        data.par_chunks_mut(dimension).for_each(normalize);

        Ok(Self {
            items,
            vectors: Some(VectorSet { dimension, data }),
            generation,
            built_at,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vectors.as_ref().map(|v| v.dimension)
    }

    /// Embed `query` once and return the `k` closest items.
    ///
    /// An empty query is an input error even when the index is empty; an
    /// empty index otherwise answers every query with no results and never
    /// calls the embedder.
    pub fn query(&self, query: &str, k: usize, embedder: &dyn Embedder) -> AppResult<Vec<Scored>> {
        if query.is_empty() {
            return Err(AppError::BadRequest("missing query".to_string()));
        }
        if self.vectors.is_none() || k == 0 {
            return Ok(Vec::new());
        }

        let mut embedded = embedder.embed(&[query.to_string()])?;
        check_batch(1, &embedded)?;
        let mut query_vector = embedded.swap_remove(0);
        normalize(&mut query_vector);

        Ok(self.rank(&query_vector, k)?)
    }

    /// Score every stored vector against an already-normalized query vector
    /// and keep the best `k`, ties going to the earlier catalog position.
    pub fn rank(&self, query_vector: &[f32], k: usize) -> Result<Vec<Scored>, EmbedError> {
        let Some(vectors) = &self.vectors else {
            return Ok(Vec::new());
        };
        if query_vector.len() != vectors.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: vectors.dimension,
                actual: query_vector.len(),
            });
        }

        let mut scores: Vec<(usize, f32)> = (0..vectors.rows())
            .map(|position| (position, dot(vectors.row(position), query_vector)))
            .collect();

        let k = k.min(scores.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < scores.len() {
            scores.select_nth_unstable_by(k - 1, by_rank);
            scores.truncate(k);
        }
        scores.sort_by(by_rank);

        Ok(scores
            .into_iter()
            .map(|(position, score)| Scored {
                score,
                item: self.items[position].clone(),
            })
            .collect())
    }
}

/// Descending score, then ascending position. NaN sorts last and the two
/// zeros compare equal, so the order is total and repeatable.
fn by_rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    rank_key(b.1)
        .total_cmp(&rank_key(a.1))
        .then_with(|| a.0.cmp(&b.0))
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score + 0.0
    }
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale to unit length in place. Zero vectors are left as they are.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
