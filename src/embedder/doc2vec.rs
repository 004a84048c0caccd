/// Paragraph vectors (PV-DM) trained on the input corpus.
///
/// Every document gets its own vector, trained jointly with the word vectors
/// to predict each word from its context. The learned document vectors are
/// the embeddings. Training is stochastic: results differ between runs unless
/// a seed is configured.
use rand::Rng;
use tracing::{debug, warn};

use super::tokenize::tokenize_corpus;
use super::train::{
    LearningRate, OutputLayer, axpy, context_bounds, init_vectors, row, row_mut, seeded_rng,
    subsample,
};
use super::vocab::{NegativeSampler, Vocab};
use super::{EmbedderError, Method, TextEmbedder};
use crate::config::{Config, Doc2VecConfig};

/// Train PV-DM on a tokenized corpus, returning one vector per document.
///
/// A document left without known words keeps its random initial vector.
/// Fails with [`EmbedderError::EmptyCorpus`] when no word reaches
/// `min_count`.
pub fn train_doc2vec<R: Rng>(
    corpus: &[Vec<String>],
    config: &Doc2VecConfig,
    rng: &mut R,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    let dims = config.dimensions;
    if dims == 0 || config.window == 0 {
        return Err(EmbedderError::InvalidConfig(
            "dimensions and window must be positive".to_string(),
        ));
    }
    let params = &config.training;

    let vocab = Vocab::build(corpus, params.min_count);
    if vocab.is_empty() {
        return Err(EmbedderError::EmptyCorpus);
    }
    debug!(
        "Training PV-DM: {} documents, {} words, {} dimensions, {} epochs",
        corpus.len(),
        vocab.len(),
        dims,
        params.epochs
    );

    let docs: Vec<Vec<usize>> = corpus.iter().map(|d| vocab.encode(d)).collect();
    for (index, doc) in docs.iter().enumerate() {
        if doc.is_empty() {
            warn!("Document {index} has no trainable words, its vector stays random");
        }
    }
    let keep = vocab.keep_probabilities(params.sample);

    let mut words = init_vectors(vocab.len(), dims, rng);
    let mut doc_vectors = init_vectors(docs.len(), dims, rng);
    let sampler = NegativeSampler::new(&vocab)?;
    let mut output = OutputLayer::new(vocab.len(), dims, sampler, params.negative);
    let mut lr = LearningRate::new(params.alpha, params.min_alpha, vocab.total(), params.epochs);

    let mut hidden = vec![0.0f32; dims];
    let mut grad = vec![0.0f32; dims];

    for _ in 0..params.epochs {
        for (d, doc) in docs.iter().enumerate() {
            let alpha = lr.current();
            let kept = subsample(doc, &keep, rng);

            for (pos, &target) in kept.iter().enumerate() {
                let (start, end) = context_bounds(pos, kept.len(), config.window, rng);
                let context: Vec<usize> = (start..end)
                    .filter(|&j| j != pos)
                    .map(|j| kept[j])
                    .collect();
                // The document vector is always one of the inputs
                let inputs = (context.len() + 1) as f32;

                hidden.copy_from_slice(row(&doc_vectors, d, dims));
                for &c in &context {
                    axpy(&mut hidden, 1.0, row(&words, c, dims));
                }
                if config.dm_mean {
                    hidden.iter_mut().for_each(|h| *h /= inputs);
                }

                grad.fill(0.0);
                output.train(&hidden, target, alpha, &mut grad, rng);
                if !config.dm_mean {
                    grad.iter_mut().for_each(|g| *g /= inputs);
                }

                for &c in &context {
                    axpy(row_mut(&mut words, c, dims), 1.0, &grad);
                }
                axpy(row_mut(&mut doc_vectors, d, dims), 1.0, &grad);
            }

            lr.advance(doc.len());
        }
    }

    Ok(doc_vectors.chunks(dims).map(<[f32]>::to_vec).collect())
}

/// Embedder returning PV-DM document vectors trained on the input texts.
pub struct Doc2VecEmbedder {
    config: Doc2VecConfig,
    seed: Option<u64>,
}

impl Doc2VecEmbedder {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.doc2vec.clone(),
            seed: config.seed,
        }
    }
}

impl TextEmbedder for Doc2VecEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            debug!("Doc2vec: empty corpus, nothing to embed");
            return Ok(Vec::new());
        }

        let corpus = tokenize_corpus(texts);
        let mut rng = seeded_rng(self.seed);
        train_doc2vec(&corpus, &self.config, &mut rng)
    }

    fn method(&self) -> Method {
        Method::Doc2Vec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    fn embedder(dimensions: usize, epochs: usize, seed: u64) -> Doc2VecEmbedder {
        let mut config = Config::default();
        config.seed = Some(seed);
        config.doc2vec.dimensions = dimensions;
        config.doc2vec.training.epochs = epochs;
        config.doc2vec.training.sample = 0.0;
        Doc2VecEmbedder::from_config(&config)
    }

    #[test]
    fn test_one_vector_per_text() {
        let vecs = embedder(16, 5, 1)
            .embed(&["a short text", "another one", "x"])
            .unwrap();
        assert_eq!(vecs.len(), 3);
        assert!(vecs.iter().all(|v| v.len() == 16));
    }

    #[test]
    fn test_seed_reproducible() {
        let texts = ["the quick brown fox", "jumps over the lazy dog"];
        let a = embedder(8, 5, 42).embed(&texts).unwrap();
        let b = embedder(8, 5, 42).embed(&texts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_blank_corpus() {
        let err = embedder(8, 5, 1).embed(&["", "   "]).unwrap_err();
        assert!(matches!(err, EmbedderError::EmptyCorpus));
    }

    #[test]
    fn test_empty_text_keeps_vector() {
        let vecs = embedder(8, 5, 1).embed(&["some words here", ""]).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[1].len(), 8);
        assert!(vecs[1].iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_zero_dimensions() {
        let err = embedder(0, 5, 1).embed(&["text"]).unwrap_err();
        assert!(matches!(err, EmbedderError::InvalidConfig(_)));
    }

    #[test]
    fn test_identical_closer_than_unrelated() {
        let texts = [
            "the cat chased the mouse across the kitchen floor",
            "the cat chased the mouse across the kitchen floor",
            "a hungry cat hunts a small mouse in the kitchen",
            "stock prices fell sharply as investors sold bonds",
            "investors bought bonds while stock prices rose",
            "central banks raised interest rates again this quarter",
        ];
        let vecs = embedder(50, 200, 7).embed(&texts).unwrap();
        let same = cosine_similarity(&vecs[0], &vecs[1]);
        for other in &vecs[3..] {
            assert!(same > cosine_similarity(&vecs[0], other));
        }
    }

    #[test]
    fn test_paraphrase_closer_than_unrelated() {
        let texts = [
            "hi, this is a test phrase.",
            "hello, this is a test sentence.",
            "stock markets fell sharply today.",
            "the weather is sunny and warm.",
            "my cat sleeps all afternoon.",
        ];
        let vecs = embedder(50, 200, 3).embed(&texts).unwrap();
        let paraphrase = cosine_similarity(&vecs[0], &vecs[1]);
        for other in &vecs[2..] {
            assert!(paraphrase > cosine_similarity(&vecs[0], other));
        }
    }

    const DUPLICATE_FIXTURE: [&str; 5] = [
        "Hi, this phrase is similar to the second phrase.",
        "Hi, this phrase is like to the second phrase.",
        "I have nothing to do with the others.",
        "I have nothing to do with the others.",
        "Do I need more data in here to get better embeddings?",
    ];

    #[test]
    fn test_identical_closer_than_paraphrase() {
        let vecs = embedder(50, 500, 11).embed(&DUPLICATE_FIXTURE).unwrap();
        let identical = cosine_similarity(&vecs[2], &vecs[3]);
        let paraphrase = cosine_similarity(&vecs[0], &vecs[1]);
        assert!(identical > paraphrase, "{identical} <= {paraphrase}");
    }

    /// With default settings this small corpus gives noisy paragraph vectors
    /// and the ordering holds for about half of all seeds.
    #[test]
    #[ignore]
    fn test_identical_closer_than_paraphrase_default_config() {
        let vecs = Doc2VecEmbedder::from_config(&Config::default())
            .embed(&DUPLICATE_FIXTURE)
            .unwrap();
        assert!(
            cosine_similarity(&vecs[2], &vecs[3]) > cosine_similarity(&vecs[0], &vecs[1])
        );
    }
}
