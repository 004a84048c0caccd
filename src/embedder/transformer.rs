/// Pretrained transformer sentence encoder on ONNX Runtime.
///
/// Loads an ONNX export of a sentence-transformers model, runs inference
/// per text, and pools the last hidden state into one sentence vector.
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tracing::{debug, info};

use super::cache::{CacheKey, ModelCache};
use super::download::ensure_transformer_files;
use super::tokenizer::SentenceTokenizer;
use super::{EmbedderError, Method, TextEmbedder};
use crate::config::{Config, Pooling, TransformerConfig};

/// Model types whose ONNX graphs take no `token_type_ids` input.
const NO_TOKEN_TYPE_MODELS: &[&str] = &["distilbert"];

/// The parts of a HuggingFace `config.json` the encoder needs.
#[derive(Debug, Deserialize, Default)]
struct ModelMeta {
    #[serde(default)]
    model_type: String,
}

/// A loaded ONNX session with its tokenizer.
pub struct TransformerModel {
    session: Mutex<Session>,
    tokenizer: SentenceTokenizer,
    token_type_ids: bool,
}

impl TransformerModel {
    /// Load a model from a directory holding `model.onnx`, `tokenizer.json`,
    /// and optionally `config.json`.
    pub fn load(model_dir: &Path, config: &TransformerConfig) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        let meta = read_meta(model_dir)?;

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(config.threads)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        info!("ONNX model loaded successfully");

        let tokenizer = SentenceTokenizer::from_model_dir(model_dir, config.max_length)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("tokenizer error: {e}")))?;

        info!("Tokenizer loaded (vocab size: {})", tokenizer.vocab_size());

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            token_type_ids: !NO_TOKEN_TYPE_MODELS.contains(&meta.model_type.as_str()),
        })
    }

    /// Encode one text into a pooled sentence vector.
    pub fn encode(
        &self,
        text: &str,
        pooling: Pooling,
        normalize: bool,
    ) -> Result<Vec<f32>, EmbedderError> {
        let tokens = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| EmbedderError::TokenizerError(e.to_string()))?;

        let seq_len = tokens.input_ids.len();
        if seq_len == 0 {
            return Err(EmbedderError::TokenizerError(
                "text produced no tokens".to_string(),
            ));
        }

        // (shape, data) tuple form avoids coupling to an ndarray version
        let input_ids = Tensor::from_array(([1usize, seq_len], tokens.input_ids.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask =
            Tensor::from_array(([1usize, seq_len], tokens.attention_mask.clone())).map_err(
                |e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")),
            )?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;

        let outputs = if self.token_type_ids {
            let token_type_ids = Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))
                .map_err(|e| {
                    EmbedderError::InferenceFailed(format!("token_type_ids error: {e}"))
                })?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
        }
        .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // Output 0 is the last hidden state: [1, seq_len, hidden_size]
        let (_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        if hidden_data.is_empty() || hidden_data.len() % seq_len != 0 {
            return Err(EmbedderError::InferenceFailed(format!(
                "unexpected output of {} values for {seq_len} tokens",
                hidden_data.len()
            )));
        }
        let hidden_size = hidden_data.len() / seq_len;

        let embedding = match pooling {
            Pooling::Mean => {
                mean_pooling(hidden_data, &tokens.attention_mask, seq_len, hidden_size)
            }
            Pooling::Cls => hidden_data[..hidden_size].to_vec(),
        };

        Ok(if normalize {
            l2_normalize(&embedding)
        } else {
            embedding
        })
    }
}

fn read_meta(model_dir: &Path) -> Result<ModelMeta, EmbedderError> {
    let path = model_dir.join("config.json");
    if !path.exists() {
        return Ok(ModelMeta::default());
    }
    let data = std::fs::read_to_string(&path)?;
    serde_json::from_str(&data).map_err(|e| {
        EmbedderError::ModelLoadFailed(format!("invalid {}: {e}", path.display()))
    })
}

/// Embedder returning the sentence encoding of a pretrained transformer.
pub struct TransformerEmbedder {
    config: TransformerConfig,
    models_dir: PathBuf,
    cache: Option<Arc<ModelCache>>,
}

impl TransformerEmbedder {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.transformer.clone(),
            models_dir: config.models_path(),
            cache: None,
        }
    }

    /// Reuse the loaded model through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn load_model(&self) -> Result<Arc<TransformerModel>, EmbedderError> {
        let model = self.config.model.as_str();
        let load = || {
            let dir = ensure_transformer_files(&self.models_dir, model)?;
            TransformerModel::load(&dir, &self.config)
        };
        match &self.cache {
            // Output size is fixed by the model, so it does not vary the key
            Some(cache) => cache.transformer(CacheKey::new(Method::Transformer, model, 0), load),
            None => load().map(Arc::new),
        }
    }
}

impl TextEmbedder for TransformerEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            debug!("Transformer: empty corpus, nothing to embed");
            return Ok(Vec::new());
        }

        let model = self.load_model()?;
        debug!("Transformer: encoding {} texts with {}", texts.len(), self.config.model);
        texts
            .iter()
            .map(|t| model.encode(t, self.config.pooling, self.config.normalize))
            .collect()
    }

    fn method(&self) -> Method {
        Method::Transformer
    }
}

/// Mean pooling over hidden states weighted by attention mask.
///
/// `hidden_data` is a flat array with shape `[1, seq_len, hidden_size]`.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum: f32 = 0.0;

    for t in 0..seq_len {
        let mask = attention_mask[t] as f32;
        mask_sum += mask;

        for h in 0..hidden_size {
            result[h] += hidden_data[t * hidden_size + h] * mask;
        }
    }

    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }

    result
}

/// L2-normalize a vector, returning the normalized copy.
fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return vec.to_vec();
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|v| v * inv_norm).collect()
}
