/// Smooth inverse frequency (SIF) sentence embeddings.
///
/// Each sentence is the average of its word vectors weighted by
/// `a / (a + p(w))`, after which the dominant directions shared by all
/// sentence vectors are projected out ("A Simple but Tough-to-Beat Baseline
/// for Sentence Embeddings", Arora et al.).
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cache::{CacheKey, ModelCache};
use super::download::ensure_word_vectors;
use super::keyed_vectors::KeyedVectors;
use super::tokenize::{tokenize_corpus, tokenize_filtered};
use super::train::seeded_rng;
use super::word2vec::train_word2vec;
use super::{EmbedderError, Method, TextEmbedder};
use crate::config::{Config, EmptyDocumentPolicy, SifConfig};

/// Power iteration stops once successive estimates move less than this.
const POWER_TOLERANCE: f64 = 1e-10;
const POWER_MAX_ITERATIONS: usize = 500;

/// SIF embedder over pretrained or freshly trained word vectors.
pub struct SifEmbedder {
    config: SifConfig,
    models_dir: PathBuf,
    seed: Option<u64>,
    cache: Option<Arc<ModelCache>>,
}

impl SifEmbedder {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut sif = config.sif.clone();
        sif.model = sif.model.filter(|m| !m.is_empty());
        Self {
            config: sif,
            models_dir: config.models_path(),
            seed: config.seed,
            cache: None,
        }
    }

    /// Reuse pretrained word vectors through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn load_word_vectors(&self, model: &str) -> Result<Arc<KeyedVectors>, EmbedderError> {
        let load = || {
            let path = ensure_word_vectors(&self.models_dir, model)?;
            KeyedVectors::load(&path)
        };
        match &self.cache {
            Some(cache) => {
                let key = CacheKey::new(Method::Sif, model, self.config.dimensions);
                cache.word_vectors(key, load)
            }
            None => load().map(Arc::new),
        }
    }
}

impl TextEmbedder for SifEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            debug!("SIF: empty corpus, nothing to embed");
            return Ok(Vec::new());
        }
        if self.config.dimensions == 0 {
            return Err(EmbedderError::InvalidConfig(
                "dimensions must be positive".to_string(),
            ));
        }

        let (kv, docs) = match self.config.model.as_deref() {
            None => {
                info!(
                    "SIF: training word2vec on {} texts ({} dimensions)",
                    texts.len(),
                    self.config.dimensions
                );
                let corpus = tokenize_corpus(texts);
                let mut rng = seeded_rng(self.seed);
                let kv = train_word2vec(
                    &corpus,
                    self.config.dimensions,
                    &self.config.word2vec,
                    &mut rng,
                )?;
                // min_count may have dropped rare words
                let docs: Vec<Vec<String>> = corpus
                    .into_iter()
                    .map(|doc| doc.into_iter().filter(|w| kv.contains(w)).collect())
                    .collect();
                (Arc::new(kv), docs)
            }
            Some(model) => {
                let kv = self.load_word_vectors(model)?;
                if kv.dimensions() != self.config.dimensions {
                    debug!(
                        "SIF: {model} has {} dimensions, requested {} ignored",
                        kv.dimensions(),
                        self.config.dimensions
                    );
                }
                let docs = tokenize_filtered(texts, |w| kv.contains(w));
                (kv, docs)
            }
        };

        sif_embeddings(&docs, &kv, &self.config)
    }

    fn method(&self) -> Method {
        Method::Sif
    }
}

/// SIF-weighted averages of the word vectors of each document, with the
/// first `config.components` principal components removed.
///
/// Every token of `docs` must be present in `kv`.
pub fn sif_embeddings(
    docs: &[Vec<String>],
    kv: &KeyedVectors,
    config: &SifConfig,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    let dims = kv.dimensions();
    let total = kv.total_count().max(1) as f64;
    let alpha = f64::from(config.alpha);

    let mut vectors = Vec::with_capacity(docs.len());
    for (index, doc) in docs.iter().enumerate() {
        let mut acc = vec![0.0f64; dims];
        let mut n = 0usize;
        for word in doc {
            let (Some(vector), Some(count)) = (kv.get(word), kv.count(word)) else {
                continue;
            };
            let weight = alpha / (alpha + count as f64 / total);
            for (a, &v) in acc.iter_mut().zip(vector) {
                *a += weight * f64::from(v);
            }
            n += 1;
        }

        if n == 0 {
            match config.empty_document {
                EmptyDocumentPolicy::Zero => {
                    warn!("SIF: document {index} has no in-vocabulary tokens, using zero vector");
                }
                EmptyDocumentPolicy::Error => return Err(EmbedderError::EmptyDocument { index }),
            }
        } else {
            let inv = 1.0 / n as f64;
            acc.iter_mut().for_each(|a| *a *= inv);
        }
        vectors.push(acc);
    }

    if vectors.len() < 2 {
        debug!("SIF: fewer than two documents, skipping component removal");
    } else if config.components > 0 {
        let components = principal_components(&vectors, config.components);
        remove_components(&mut vectors, &components);
    }

    Ok(vectors
        .into_iter()
        .map(|v| v.into_iter().map(|x| x as f32).collect())
        .collect())
}

/// Leading right singular vectors of the (uncentered) row matrix.
///
/// Found one at a time by power iteration on `XᵀX`, deflating the rows after
/// each. Fewer than `k` are returned when the remaining rows are all zero.
pub fn principal_components(rows: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let mut residual = rows.to_vec();
    let mut components = Vec::with_capacity(k);
    for _ in 0..k {
        let Some(pc) = top_singular_vector(&residual) else {
            break;
        };
        for r in &mut residual {
            let p = dot(r, &pc);
            r.iter_mut().zip(&pc).for_each(|(x, c)| *x -= p * c);
        }
        components.push(pc);
    }
    components
}

/// Subtract each row's projection onto each (unit, orthogonal) component.
pub fn remove_components(rows: &mut [Vec<f64>], components: &[Vec<f64>]) {
    for r in rows.iter_mut() {
        for pc in components {
            let p = dot(r, pc);
            r.iter_mut().zip(pc).for_each(|(x, c)| *x -= p * c);
        }
    }
}

fn top_singular_vector(rows: &[Vec<f64>]) -> Option<Vec<f64>> {
    // Start from the longest row so XᵀX·v cannot vanish
    let start = rows.iter().max_by(|a, b| norm(a).total_cmp(&norm(b)))?;
    let mut v = normalized(start)?;

    for _ in 0..POWER_MAX_ITERATIONS {
        let mut w = vec![0.0f64; v.len()];
        for r in rows {
            let p = dot(r, &v);
            w.iter_mut().zip(r).for_each(|(x, y)| *x += p * y);
        }
        let w = normalized(&w)?;
        let delta: f64 = w.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = w;
        if delta < POWER_TOLERANCE {
            break;
        }
    }
    Some(v)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn normalized(a: &[f64]) -> Option<Vec<f64>> {
    let n = norm(a);
    (n > 0.0).then(|| a.iter().map(|x| x / n).collect())
}
