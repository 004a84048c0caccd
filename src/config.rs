/// Configuration module for textvec.
///
/// Handles loading, validating, and providing default configuration values
/// for the three embedding methods.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_models_dir() -> String {
    dirs::cache_dir()
        .map(|d| d.join("textvec").join("models"))
        .unwrap_or_else(|| PathBuf::from("models"))
        .to_string_lossy()
        .into_owned()
}

fn default_dimensions() -> usize {
    300
}

fn default_sif_model() -> Option<String> {
    Some("glove-wiki-gigaword-300".to_string())
}

fn default_sif_alpha() -> f32 {
    1e-3
}

fn default_components() -> usize {
    1
}

fn default_word2vec_window() -> usize {
    5
}

fn default_doc2vec_window() -> usize {
    2
}

fn default_negative() -> usize {
    5
}

fn default_epochs() -> usize {
    5
}

fn default_min_count() -> u64 {
    1
}

fn default_learning_rate() -> f32 {
    0.025
}

fn default_min_learning_rate() -> f32 {
    0.0001
}

fn default_sample() -> f64 {
    1e-3
}

fn default_transformer_model() -> String {
    "distilbert-base-nli-stsb-mean-tokens".to_string()
}

fn default_max_length() -> usize {
    128
}

fn default_threads() -> usize {
    4
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Where downloaded word vectors and transformer models are stored.
    #[serde(default = "default_models_dir")]
    pub models_dir: String,

    /// Seed for word2vec / paragraph-vector training. `None` draws a fresh
    /// seed on every call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Reuse loaded pretrained models across calls of embedders built by
    /// [`crate::embedder::build_embedder`].
    #[serde(default)]
    pub cache_models: bool,

    #[serde(default)]
    pub sif: SifConfig,

    #[serde(default)]
    pub doc2vec: Doc2VecConfig,

    #[serde(default)]
    pub transformer: TransformerConfig,
}

/// What to return for a document with no in-vocabulary tokens.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDocumentPolicy {
    #[default]
    Zero,
    Error,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SifConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Pretrained word-vector identifier. `None` or `""` trains word2vec on
    /// the input corpus.
    #[serde(default = "default_sif_model")]
    pub model: Option<String>,

    /// Smoothing term `a` in `a / (a + p(w))`.
    #[serde(default = "default_sif_alpha")]
    pub alpha: f32,

    /// Number of principal components removed from the document vectors.
    #[serde(default = "default_components")]
    pub components: usize,

    #[serde(default)]
    pub empty_document: EmptyDocumentPolicy,

    #[serde(default)]
    pub word2vec: Word2VecConfig,
}

/// Parameters shared by word2vec and paragraph-vector training.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrainingConfig {
    #[serde(default = "default_negative")]
    pub negative: usize,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_min_count")]
    pub min_count: u64,

    #[serde(default = "default_learning_rate")]
    pub alpha: f32,

    #[serde(default = "default_min_learning_rate")]
    pub min_alpha: f32,

    /// Frequent-word downsampling threshold; `0` disables downsampling.
    #[serde(default = "default_sample")]
    pub sample: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Word2VecConfig {
    #[serde(default = "default_word2vec_window")]
    pub window: usize,

    #[serde(flatten)]
    pub training: TrainingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Doc2VecConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_doc2vec_window")]
    pub window: usize,

    /// Average the context inputs instead of summing them.
    #[serde(default)]
    pub dm_mean: bool,

    #[serde(flatten)]
    pub training: TrainingConfig,
}

/// How token states are reduced to one sentence vector.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    #[default]
    Mean,
    Cls,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransformerConfig {
    #[serde(default = "default_transformer_model")]
    pub model: String,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default)]
    pub pooling: Pooling,

    #[serde(default)]
    pub normalize: bool,

    #[serde(default = "default_threads")]
    pub threads: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            seed: None,
            cache_models: false,
            sif: SifConfig::default(),
            doc2vec: Doc2VecConfig::default(),
            transformer: TransformerConfig::default(),
        }
    }
}

impl Default for SifConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            model: default_sif_model(),
            alpha: default_sif_alpha(),
            components: default_components(),
            empty_document: EmptyDocumentPolicy::default(),
            word2vec: Word2VecConfig::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            negative: default_negative(),
            epochs: default_epochs(),
            min_count: default_min_count(),
            alpha: default_learning_rate(),
            min_alpha: default_min_learning_rate(),
            sample: default_sample(),
        }
    }
}

impl Default for Word2VecConfig {
    fn default() -> Self {
        Self {
            window: default_word2vec_window(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for Doc2VecConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            window: default_doc2vec_window(),
            dm_mean: false,
            training: TrainingConfig::default(),
        }
    }
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            model: default_transformer_model(),
            max_length: default_max_length(),
            pooling: Pooling::default(),
            normalize: false,
            threads: default_threads(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"textvec.json"`.
    /// A missing file yields the default configuration; so does a file that
    /// is not valid JSON, with a warning.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "textvec.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let mut cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");

        // An empty model string means "train on the corpus"
        if cfg.sif.model.as_deref().is_some_and(str::is_empty) {
            cfg.sif.model = None;
        }

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.sif.dimensions > 0, "sif.dimensions must be positive");
        anyhow::ensure!(self.sif.alpha > 0.0, "sif.alpha must be positive");
        anyhow::ensure!(
            self.sif.word2vec.window > 0,
            "sif.word2vec.window must be positive"
        );
        self.sif
            .word2vec
            .training
            .validate()
            .context("invalid sif.word2vec settings")?;
        anyhow::ensure!(
            self.doc2vec.dimensions > 0,
            "doc2vec.dimensions must be positive"
        );
        anyhow::ensure!(self.doc2vec.window > 0, "doc2vec.window must be positive");
        self.doc2vec
            .training
            .validate()
            .context("invalid doc2vec settings")?;
        anyhow::ensure!(
            !self.transformer.model.is_empty(),
            "transformer.model must not be empty"
        );
        anyhow::ensure!(
            self.transformer.max_length > 0,
            "transformer.max_length must be positive"
        );
        anyhow::ensure!(
            self.transformer.threads > 0,
            "transformer.threads must be positive"
        );
        Ok(())
    }

    /// Model directory as a path.
    #[must_use]
    pub fn models_path(&self) -> PathBuf {
        PathBuf::from(&self.models_dir)
    }
}

impl TrainingConfig {
    /// Validate training hyperparameters.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.epochs > 0, "epochs must be positive");
        anyhow::ensure!(self.min_count > 0, "min_count must be positive");
        anyhow::ensure!(self.alpha > 0.0, "alpha must be positive");
        anyhow::ensure!(
            self.min_alpha >= 0.0 && self.min_alpha <= self.alpha,
            "min_alpha must be between 0 and alpha"
        );
        anyhow::ensure!(self.sample >= 0.0, "sample must not be negative");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sif.dimensions, 300);
        assert_eq!(config.sif.model.as_deref(), Some("glove-wiki-gigaword-300"));
        assert_eq!(config.sif.components, 1);
        assert_eq!(config.sif.empty_document, EmptyDocumentPolicy::Zero);
        assert_eq!(config.sif.word2vec.window, 5);
        assert_eq!(config.doc2vec.window, 2);
        assert_eq!(config.doc2vec.training.min_count, 1);
        assert_eq!(
            config.transformer.model,
            "distilbert-base-nli-stsb-mean-tokens"
        );
        assert_eq!(config.transformer.pooling, Pooling::Mean);
        assert!(!config.transformer.normalize);
        assert!(!config.cache_models);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"seed": 7, "doc2vec": {"dimensions": 64, "epochs": 40}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.doc2vec.dimensions, 64);
        assert_eq!(config.doc2vec.training.epochs, 40);
        // Other fields should have defaults
        assert_eq!(config.doc2vec.window, 2);
        assert_eq!(config.doc2vec.training.negative, 5);
        assert_eq!(config.sif.dimensions, 300);
    }

    #[test]
    fn test_policy_and_pooling_names() {
        let json = r#"{"sif": {"empty_document": "error"}, "transformer": {"pooling": "cls"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.sif.empty_document, EmptyDocumentPolicy::Error);
        assert_eq!(config.transformer.pooling, Pooling::Cls);
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_dimensions() {
        let mut config = Config::default();
        config.doc2vec.dimensions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_learning_rate() {
        let mut config = Config::default();
        config.sif.word2vec.training.min_alpha = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.sif.dimensions, 300);
    }

    #[test]
    fn test_load_empty_model_means_training() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"sif": {"model": ""}}"#).unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert!(config.sif.model.is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut config = Config::default();
        config.seed = Some(42);
        config.sif.model = None;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        config.save(path.to_str().unwrap()).unwrap();
        let parsed = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(parsed.seed, Some(42));
        assert!(parsed.sif.model.is_none());
        assert_eq!(parsed.doc2vec.window, config.doc2vec.window);
        assert_eq!(parsed.transformer.model, config.transformer.model);
    }
}
