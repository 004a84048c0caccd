//! # textvec — Sentence and document embeddings
//!
//! Turns a corpus of texts into one fixed-length vector per text, using one of
//! three methods behind a common [`embedder::TextEmbedder`] trait.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, and defaults
//! - **[`embedder`]** — SIF word-vector averaging, PV-DM paragraph vectors, and
//!   pretrained transformer encoders (ONNX Runtime)
//! - **[`similarity`]** — Cosine similarity between embeddings

pub mod config;
pub mod embedder;
pub mod similarity;
