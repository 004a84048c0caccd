/// End-to-end tests for the three embedding methods.
///
/// Pretrained vectors come from a small word-vector file written to a temp
/// directory; tests that need downloads are ignored by default.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;
use textvec::config::{Config, EmptyDocumentPolicy};
use textvec::embedder::{
    EmbedderError, Method, ModelCache, SifEmbedder, TextEmbedder, build_embedder,
    doc2vec_embeddings, pretrained_transformer_embeddings, word2vec_sif_embeddings,
};
use textvec::similarity::cosine_similarity;

const FIXTURE: [&str; 3] = [
    "Hi, this phrase is similar to the second phrase.",
    "Hi, that phrase is like this phrase.",
    "I have nothing to do with the others.",
];

/// Frequent function words first, so they get the smallest SIF weights.
const VECTORS: &str = "\
14 4
the 1 0.1 0.1 0.1
to 1 0 0.1 0
is 1 0 0 0.2
this 1 0.3 0 0.1
that 1 0.3 0.1 0
with 0.9 0 0.3 0.1
i 0.3 0 1 0
have 0.2 0 0.9 0.1
do 0.2 0.1 0.8 0
phrase 0.2 1 0 0.1
like 0.1 0.8 0 0.2
similar 0.1 0.9 0.1 0
second 0.2 0.7 0.1 0
nothing 0.1 0 1 0.2
";

fn write_vectors(dir: &Path) -> String {
    let path = dir.join("tiny-vectors.txt");
    fs::write(&path, VECTORS).unwrap();
    path.to_string_lossy().into_owned()
}

fn pretrained_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.models_dir = dir.to_string_lossy().into_owned();
    config.sif.model = Some(write_vectors(dir));
    config
}

// ── SIF with pretrained vectors ─────────────────────────────────────

#[test]
fn test_sif_pretrained_similarity() {
    let dir = tempdir().unwrap();
    let embedder = SifEmbedder::from_config(&pretrained_config(dir.path()));
    let vecs = embedder.embed(&FIXTURE).unwrap();

    assert_eq!(vecs.len(), 3);
    assert!(vecs.iter().all(|v| v.len() == 4));
    assert!(cosine_similarity(&vecs[0], &vecs[1]) > cosine_similarity(&vecs[0], &vecs[2]));
}

#[test]
fn test_sif_pretrained_order_preserved() {
    let dir = tempdir().unwrap();
    let embedder = SifEmbedder::from_config(&pretrained_config(dir.path()));
    let forward = embedder.embed(&FIXTURE).unwrap();
    let permuted = embedder.embed(&[FIXTURE[2], FIXTURE[0], FIXTURE[1]]).unwrap();

    for (a, b) in [(0, 1), (1, 2), (2, 0)] {
        for (x, y) in forward[a].iter().zip(&permuted[b]) {
            assert!((x - y).abs() < 1e-5, "text {a} changed when reordered");
        }
    }
}

#[test]
fn test_sif_single_text_skips_removal() {
    let dir = tempdir().unwrap();
    let embedder = SifEmbedder::from_config(&pretrained_config(dir.path()));
    let vecs = embedder.embed(&["the phrase"]).unwrap();
    assert_eq!(vecs.len(), 1);
    assert!(vecs[0].iter().any(|&x| x != 0.0));
}

#[test]
fn test_sif_filtered_document_policy() {
    let dir = tempdir().unwrap();
    let mut config = pretrained_config(dir.path());
    let texts = ["this phrase", "zzz qqq", "i have nothing"];

    let vecs = SifEmbedder::from_config(&config).embed(&texts).unwrap();
    assert!(vecs[1].iter().all(|&x| x == 0.0));

    config.sif.empty_document = EmptyDocumentPolicy::Error;
    let err = SifEmbedder::from_config(&config).embed(&texts).unwrap_err();
    assert!(matches!(err, EmbedderError::EmptyDocument { index: 1 }));
}

#[test]
fn test_sif_cache_reuses_vectors() {
    let dir = tempdir().unwrap();
    let config = pretrained_config(dir.path());
    let cache = Arc::new(ModelCache::new());
    let embedder = SifEmbedder::from_config(&config).with_cache(Arc::clone(&cache));

    let first = embedder.embed(&FIXTURE).unwrap();
    assert_eq!(cache.len(), 1);
    let second = embedder.embed(&FIXTURE).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(first, second);

    let uncached = SifEmbedder::from_config(&config).embed(&FIXTURE).unwrap();
    assert_eq!(first, uncached);
}

#[test]
fn test_build_embedder_with_cache() {
    let dir = tempdir().unwrap();
    let mut config = pretrained_config(dir.path());
    config.cache_models = true;
    let embedder = build_embedder(Method::Sif, &config);
    assert_eq!(embedder.embed(&FIXTURE).unwrap().len(), 3);
}

#[test]
fn test_unknown_model_identifier() {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.models_dir = dir.path().to_string_lossy().into_owned();
    config.sif.model = Some("definitely-not-a-model".to_string());
    let err = SifEmbedder::from_config(&config).embed(&FIXTURE).unwrap_err();
    assert!(matches!(err, EmbedderError::UnknownModel(_)));
}

// ── SIF with freshly trained word2vec ───────────────────────────────

#[test]
fn test_sif_fresh_training_similarity() {
    let texts = [
        FIXTURE[0],
        FIXTURE[1],
        FIXTURE[2],
        "The weather forecast predicts heavy rain tomorrow.",
        "Stock markets closed higher after a volatile session.",
        "My cat sleeps on the warm windowsill all afternoon.",
    ];
    let mut config = Config::default();
    config.sif.model = None;
    config.seed = Some(2024);
    let vecs = SifEmbedder::from_config(&config).embed(&texts).unwrap();

    assert_eq!(vecs.len(), texts.len());
    assert!(vecs.iter().all(|v| v.len() == 300));
    assert!(cosine_similarity(&vecs[0], &vecs[1]) > cosine_similarity(&vecs[0], &vecs[2]));
}

#[test]
fn test_sif_fresh_training_reproducible() {
    let mut config = Config::default();
    config.sif.model = None;
    config.sif.dimensions = 20;
    config.seed = Some(5);
    let a = SifEmbedder::from_config(&config).embed(&FIXTURE).unwrap();
    let b = SifEmbedder::from_config(&config).embed(&FIXTURE).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_sif_blank_corpus() {
    let err = word2vec_sif_embeddings(&["", "  "], 10, None).unwrap_err();
    assert!(matches!(err, EmbedderError::EmptyCorpus));
}

// ── Paragraph vectors ───────────────────────────────────────────────

#[test]
fn test_doc2vec_output_shape() {
    let vecs = doc2vec_embeddings(&FIXTURE, 24).unwrap();
    assert_eq!(vecs.len(), 3);
    assert!(vecs.iter().all(|v| v.len() == 24));
}

#[test]
fn test_doc2vec_single_text() {
    let vecs = doc2vec_embeddings(&["only one text here"], 8).unwrap();
    assert_eq!(vecs.len(), 1);
    assert_eq!(vecs[0].len(), 8);
}

// ── Empty input ─────────────────────────────────────────────────────

#[test]
fn test_empty_corpus_all_methods() {
    assert!(word2vec_sif_embeddings(&[], 300, None).unwrap().is_empty());
    assert!(doc2vec_embeddings(&[], 300).unwrap().is_empty());
    assert!(
        pretrained_transformer_embeddings(&[], "no-such-encoder")
            .unwrap()
            .is_empty()
    );
}

// ── Network-dependent ───────────────────────────────────────────────

/// Downloads the GloVe archive (~820MB) on first run.
#[test]
#[ignore]
fn test_sif_glove_similarity() {
    let vecs = word2vec_sif_embeddings(&FIXTURE, 300, Some("glove-wiki-gigaword-300")).unwrap();
    assert_eq!(vecs[0].len(), 300);
    assert!(cosine_similarity(&vecs[0], &vecs[1]) > cosine_similarity(&vecs[0], &vecs[2]));
}

/// Downloads the default sentence-transformers model on first run.
#[test]
#[ignore]
fn test_transformer_similarity() {
    let vecs =
        pretrained_transformer_embeddings(&FIXTURE, "distilbert-base-nli-stsb-mean-tokens")
            .unwrap();
    assert_eq!(vecs.len(), 3);
    assert!(cosine_similarity(&vecs[0], &vecs[1]) > cosine_similarity(&vecs[0], &vecs[2]));
}
