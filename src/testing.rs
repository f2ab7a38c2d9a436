//! Deterministic in-process embedders and catalog sources for tests.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;

use crate::catalog::{CatalogItem, CatalogSource};
use crate::embedder::Embedder;
use crate::error::{CatalogError, EmbedError};

const VOCABULARY: &[&str] = &["hello", "hi", "there", "bye", "goodbye", "again", "thanks"];

pub fn examples(pairs: &[(&str, &str)]) -> Vec<CatalogItem> {
    pairs
        .iter()
        .map(|(message, reply)| match json!({"message": message, "reply": reply}) {
            Value::Object(fields) => CatalogItem::from(fields),
            _ => unreachable!(),
        })
        .collect()
}

/// One axis per vocabulary word, counting occurrences. Words outside the
/// vocabulary are ignored, so text made only of them embeds to zero.
#[derive(Default)]
pub struct KeywordEmbedder {
    batches: Mutex<Vec<usize>>,
}

impl KeywordEmbedder {
    /// Sizes of every batch embedded so far.
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; VOCABULARY.len()];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if let Some(axis) = VOCABULARY.iter().position(|w| *w == word) {
                v[axis] += 1.0;
            }
        }
        v
    }
}

impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.batches.lock().push(texts.len());
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Returns the same vectors for every call.
pub struct FixedEmbedder {
    vectors: Vec<Vec<f32>>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self {
            vectors,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for FixedEmbedder {
    fn model_id(&self) -> &str {
        "fixed-test"
    }

    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectors.clone())
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing-test"
    }

    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Inference("model unavailable".into()))
    }
}

/// Keyword embedder that can be told to fail, or to park the next call
/// until the test releases it.
pub struct ControlledEmbedder {
    inner: KeywordEmbedder,
    failing: AtomicBool,
    hold_next: AtomicBool,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl ControlledEmbedder {
    pub fn new() -> Self {
        Self {
            inner: KeywordEmbedder::default(),
            failing: AtomicBool::new(false),
            hold_next: AtomicBool::new(false),
            entered: Mutex::new(None),
            release: Mutex::new(None),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Park the next `embed` call. The first receiver fires once the call
    /// is parked; sending on the returned sender lets it continue.
    pub fn hold_next(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.entered.lock() = Some(entered_tx);
        *self.release.lock() = Some(release_rx);
        self.hold_next.store(true, Ordering::SeqCst);
        (entered_rx, release_tx)
    }
}

impl Embedder for ControlledEmbedder {
    fn model_id(&self) -> &str {
        "controlled-test"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.hold_next.swap(false, Ordering::SeqCst) {
            let entered = self.entered.lock().take();
            let release = self.release.lock().take();
            if let Some(entered) = entered {
                let _ = entered.send(());
            }
            if let Some(release) = release {
                let _ = release.recv();
            }
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbedError::Inference("model unavailable".into()));
        }
        self.inner.embed(texts)
    }
}

/// In-memory catalog whose contents (or failure) tests can change between rebuilds.
pub struct MemoryCatalog {
    items: Mutex<Result<Vec<CatalogItem>, String>>,
}

impl MemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items: Mutex::new(Ok(items)),
        }
    }

    pub fn set(&self, items: Vec<CatalogItem>) {
        *self.items.lock() = Ok(items);
    }

    pub fn set_broken(&self, reason: &str) {
        *self.items.lock() = Err(reason.to_string());
    }
}

impl CatalogSource for MemoryCatalog {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn read(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        self.items.lock().clone().map_err(CatalogError::Shape)
    }
}
