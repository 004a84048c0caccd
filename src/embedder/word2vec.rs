/// CBOW word2vec trained on the input corpus.
///
/// Used by the SIF embedder when no pretrained word vectors are requested.
/// Context vectors are averaged into the hidden layer and the centre word is
/// predicted with negative sampling.
use rand::Rng;
use tracing::debug;

use super::EmbedderError;
use super::keyed_vectors::KeyedVectors;
use super::train::{
    LearningRate, OutputLayer, axpy, context_bounds, init_vectors, row, row_mut, subsample,
};
use super::vocab::{NegativeSampler, Vocab};
use crate::config::Word2VecConfig;

/// Train word vectors of `dims` values on a tokenized corpus.
///
/// Fails with [`EmbedderError::EmptyCorpus`] when no word reaches
/// `min_count`.
pub fn train_word2vec<R: Rng>(
    corpus: &[Vec<String>],
    dims: usize,
    config: &Word2VecConfig,
    rng: &mut R,
) -> Result<KeyedVectors, EmbedderError> {
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
        "Training word2vec: {} words, {} tokens, {} dimensions, {} epochs",
        vocab.len(),
        vocab.total(),
        dims,
        params.epochs
    );

    let docs: Vec<Vec<usize>> = corpus.iter().map(|d| vocab.encode(d)).collect();
    let keep = vocab.keep_probabilities(params.sample);

    let mut input = init_vectors(vocab.len(), dims, rng);
    let sampler = NegativeSampler::new(&vocab)?;
    let mut output = OutputLayer::new(vocab.len(), dims, sampler, params.negative);
    let mut lr = LearningRate::new(params.alpha, params.min_alpha, vocab.total(), params.epochs);

    let mut hidden = vec![0.0f32; dims];
    let mut grad = vec![0.0f32; dims];

    for _ in 0..params.epochs {
        for doc in &docs {
            let alpha = lr.current();
            let words = subsample(doc, &keep, rng);

            for (pos, &target) in words.iter().enumerate() {
                let (start, end) = context_bounds(pos, words.len(), config.window, rng);
                let context: Vec<usize> = (start..end)
                    .filter(|&j| j != pos)
                    .map(|j| words[j])
                    .collect();
                if context.is_empty() {
                    continue;
                }

                hidden.fill(0.0);
                for &c in &context {
                    axpy(&mut hidden, 1.0, row(&input, c, dims));
                }
                let inv = 1.0 / context.len() as f32;
                hidden.iter_mut().for_each(|h| *h *= inv);

                grad.fill(0.0);
                output.train(&hidden, target, alpha, &mut grad, rng);
                for &c in &context {
                    axpy(row_mut(&mut input, c, dims), 1.0, &grad);
                }
            }

            lr.advance(doc.len());
        }
    }

    let mut kv = KeyedVectors::new(dims);
    for (i, (word, &count)) in vocab.words().iter().zip(vocab.counts()).enumerate() {
        kv.push(word, count, row(&input, i, dims))?;
    }
    Ok(kv)
}
