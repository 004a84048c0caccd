/// Opt-in cache of loaded pretrained models.
///
/// Embedders load their model on every call unless they are given a
/// [`ModelCache`]. Entries are keyed by method, model identifier, and requested
/// dimensionality. Models trained on the input corpus are never cached.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::keyed_vectors::KeyedVectors;
use super::transformer::TransformerModel;
use super::{EmbedderError, Method};

/// Identity of a cached model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub model: String,
    pub dimensions: usize,
}

impl CacheKey {
    #[must_use]
    pub fn new(method: Method, model: &str, dimensions: usize) -> Self {
        Self {
            method,
            model: model.to_string(),
            dimensions,
        }
    }
}

type Slots<T> = Mutex<HashMap<CacheKey, Arc<T>>>;

/// Shared store of loaded word vectors and transformer models.
#[derive(Default)]
pub struct ModelCache {
    word_vectors: Slots<KeyedVectors>,
    transformers: Slots<TransformerModel>,
}

impl ModelCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached word vectors for `key`, loading them with `load` on a miss.
    pub fn word_vectors<F>(&self, key: CacheKey, load: F) -> Result<Arc<KeyedVectors>, EmbedderError>
    where
        F: FnOnce() -> Result<KeyedVectors, EmbedderError>,
    {
        get_or_load(&self.word_vectors, key, load)
    }

    /// Cached transformer for `key`, loading it with `load` on a miss.
    pub fn transformer<F>(
        &self,
        key: CacheKey,
        load: F,
    ) -> Result<Arc<TransformerModel>, EmbedderError>
    where
        F: FnOnce() -> Result<TransformerModel, EmbedderError>,
    {
        get_or_load(&self.transformers, key, load)
    }

    /// Number of cached models of all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        slot_count(&self.word_vectors) + slot_count(&self.transformers)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached model.
    pub fn clear(&self) {
        if let Ok(mut m) = self.word_vectors.lock() {
            m.clear();
        }
        if let Ok(mut m) = self.transformers.lock() {
            m.clear();
        }
    }
}

fn slot_count<T>(slots: &Slots<T>) -> usize {
    slots.lock().map(|m| m.len()).unwrap_or(0)
}

fn get_or_load<T, F>(slots: &Slots<T>, key: CacheKey, load: F) -> Result<Arc<T>, EmbedderError>
where
    F: FnOnce() -> Result<T, EmbedderError>,
{
    // The lock is held while loading so concurrent misses load only once
    let mut slots = slots
        .lock()
        .map_err(|e| EmbedderError::ModelLoadFailed(format!("cache lock poisoned: {e}")))?;
    if let Some(model) = slots.get(&key) {
        debug!("Model cache hit: {} {}", key.method, key.model);
        return Ok(Arc::clone(model));
    }
    debug!("Model cache miss: {} {}", key.method, key.model);
    let model = Arc::new(load()?);
    slots.insert(key, Arc::clone(&model));
    Ok(model)
}
