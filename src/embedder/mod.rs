/// Embedder trait and shared types for text embedding.
///
/// Three methods are available behind [`TextEmbedder`]: SIF-weighted word
/// vectors, paragraph vectors, and pretrained transformer encoders.
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;

pub mod cache;
pub mod doc2vec;
pub mod download;
pub mod keyed_vectors;
pub mod sif;
pub mod tokenize;
pub mod tokenizer;
pub mod train;
pub mod transformer;
pub mod vocab;
pub mod word2vec;

pub use cache::ModelCache;
pub use doc2vec::Doc2VecEmbedder;
pub use sif::SifEmbedder;
pub use transformer::TransformerEmbedder;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("corpus contains no tokens to train on")]
    EmptyCorpus,

    #[error("document {index} has no in-vocabulary tokens")]
    EmptyDocument { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The embedding strategy behind a [`TextEmbedder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Sif,
    Doc2Vec,
    Transformer,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sif => "sif",
            Self::Doc2Vec => "doc2vec",
            Self::Transformer => "transformer",
        };
        f.write_str(name)
    }
}

/// Trait for text embedding implementations.
///
/// `embed` returns exactly one vector per input text, in input order.
/// All implementations must be `Send + Sync` to allow use behind `Arc`.
pub trait TextEmbedder: Send + Sync {
    /// Embed a corpus of texts into vectors.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Which strategy this embedder implements.
    fn method(&self) -> Method;
}

/// Build the embedder for `method` from configuration.
///
/// When `config.cache_models` is set, pretrained models are shared through a
/// fresh [`ModelCache`] owned by the returned embedder.
pub fn build_embedder(method: Method, config: &Config) -> Box<dyn TextEmbedder> {
    let cache = config.cache_models.then(|| Arc::new(ModelCache::new()));
    match method {
        Method::Sif => {
            let embedder = SifEmbedder::from_config(config);
            Box::new(match cache {
                Some(cache) => embedder.with_cache(cache),
                None => embedder,
            })
        }
        Method::Doc2Vec => Box::new(Doc2VecEmbedder::from_config(config)),
        Method::Transformer => {
            let embedder = TransformerEmbedder::from_config(config);
            Box::new(match cache {
                Some(cache) => embedder.with_cache(cache),
                None => embedder,
            })
        }
    }
}

/// SIF sentence embeddings from word vectors.
///
/// With `model` set to `None` (or `""`), word2vec is trained on `texts` with
/// `dimensions`-sized vectors. Otherwise the named pretrained word vectors are
/// loaded and tokens outside their vocabulary are dropped.
pub fn word2vec_sif_embeddings(
    texts: &[&str],
    dimensions: usize,
    model: Option<&str>,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    let mut config = Config::default();
    config.sif.dimensions = dimensions;
    config.sif.model = model.filter(|m| !m.is_empty()).map(str::to_string);
    SifEmbedder::from_config(&config).embed(texts)
}

/// Paragraph-vector (PV-DM) embeddings trained on `texts`.
///
/// Training starts from random vectors, so repeated calls may return
/// different embeddings.
pub fn doc2vec_embeddings(
    texts: &[&str],
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    let mut config = Config::default();
    config.doc2vec.dimensions = dimensions;
    Doc2VecEmbedder::from_config(&config).embed(texts)
}

/// Sentence embeddings from a pretrained transformer encoder.
pub fn pretrained_transformer_embeddings(
    texts: &[&str],
    model: &str,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    let mut config = Config::default();
    config.transformer.model = model.to_string();
    TransformerEmbedder::from_config(&config).embed(texts)
}
