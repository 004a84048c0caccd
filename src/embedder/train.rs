/// Shared machinery for the shallow networks behind word2vec and PV-DM.
///
/// Both models predict a word from a hidden vector built out of context
/// inputs, trained with negative sampling and a linearly decaying learning
/// rate. Training is single-threaded; a fixed seed makes it reproducible.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::vocab::NegativeSampler;

/// Dot products beyond this magnitude saturate the sigmoid.
const MAX_EXP: f32 = 6.0;

/// Create the training RNG, drawing a fresh seed when none is configured.
#[must_use]
pub fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    let seed = seed.unwrap_or_else(rand::random);
    debug!("Training seed: {seed}");
    ChaCha8Rng::seed_from_u64(seed)
}

/// `rows` vectors of `dims` values uniform in `[-0.5, 0.5) / dims`, flattened.
pub fn init_vectors<R: Rng>(rows: usize, dims: usize, rng: &mut R) -> Vec<f32> {
    let scale = 1.0 / dims as f32;
    (0..rows * dims)
        .map(|_| rng.gen_range(-0.5f32..0.5) * scale)
        .collect()
}

/// Row `i` of a flattened matrix.
#[must_use]
pub fn row(matrix: &[f32], i: usize, dims: usize) -> &[f32] {
    &matrix[i * dims..(i + 1) * dims]
}

/// Mutable row `i` of a flattened matrix.
pub fn row_mut(matrix: &mut [f32], i: usize, dims: usize) -> &mut [f32] {
    &mut matrix[i * dims..(i + 1) * dims]
}

/// `dst += scale * src`
pub fn axpy(dst: &mut [f32], scale: f32, src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += scale * s;
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Linear decay from `start` to `end` over all words of all epochs.
#[derive(Debug, Clone)]
pub struct LearningRate {
    start: f32,
    end: f32,
    total_words: u64,
    processed: u64,
}

impl LearningRate {
    #[must_use]
    pub fn new(start: f32, end: f32, words_per_epoch: u64, epochs: usize) -> Self {
        Self {
            start,
            end,
            total_words: (words_per_epoch * epochs as u64).max(1),
            processed: 0,
        }
    }

    /// Rate for the next document.
    #[must_use]
    pub fn current(&self) -> f32 {
        let progress = self.processed as f32 / self.total_words as f32;
        (self.start - (self.start - self.end) * progress).max(self.end)
    }

    /// Record that a document of `words` tokens has been processed.
    pub fn advance(&mut self, words: usize) {
        self.processed += words as u64;
    }
}

/// Drop frequent words at random according to `keep` probabilities.
pub fn subsample<R: Rng>(doc: &[usize], keep: &[f64], rng: &mut R) -> Vec<usize> {
    doc.iter()
        .copied()
        .filter(|&w| keep[w] >= 1.0 || rng.gen_range(0.0..1.0) < keep[w])
        .collect()
}

/// Context bounds `[start, end)` around `pos` with a randomly shrunk window.
pub fn context_bounds<R: Rng>(pos: usize, len: usize, window: usize, rng: &mut R) -> (usize, usize) {
    let reduced = window - rng.gen_range(0..window);
    let start = pos.saturating_sub(reduced);
    let end = (pos + reduced + 1).min(len);
    (start, end)
}

/// Output-layer weights and the noise distribution for negative sampling.
pub struct OutputLayer {
    dims: usize,
    weights: Vec<f32>,
    sampler: NegativeSampler,
    negative: usize,
}

impl OutputLayer {
    /// Zero-initialised output weights for `vocab_len` words.
    #[must_use]
    pub fn new(vocab_len: usize, dims: usize, sampler: NegativeSampler, negative: usize) -> Self {
        Self {
            dims,
            weights: vec![0.0; vocab_len * dims],
            sampler,
            negative,
        }
    }

    /// One negative-sampling update predicting `target` from `hidden`.
    ///
    /// Output weights are updated in place; the error to propagate back to
    /// the inputs is accumulated into `grad`.
    pub fn train<R: Rng>(
        &mut self,
        hidden: &[f32],
        target: usize,
        lr: f32,
        grad: &mut [f32],
        rng: &mut R,
    ) {
        self.update(hidden, target, 1.0, lr, grad);
        for _ in 0..self.negative {
            let noise = self.sampler.sample(rng);
            if noise != target {
                self.update(hidden, noise, 0.0, lr, grad);
            }
        }
    }

    fn update(&mut self, hidden: &[f32], word: usize, label: f32, lr: f32, grad: &mut [f32]) {
        let out = row_mut(&mut self.weights, word, self.dims);
        let f = dot(hidden, out);
        let prediction = if f >= MAX_EXP {
            1.0
        } else if f <= -MAX_EXP {
            0.0
        } else {
            1.0 / (1.0 + (-f).exp())
        };
        let g = (label - prediction) * lr;
        axpy(grad, g, out);
        axpy(out, g, hidden);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::vocab::Vocab;

    #[test]
    fn test_seeded_rng_reproducible() {
        let mut a = seeded_rng(Some(11));
        let mut b = seeded_rng(Some(11));
        assert_eq!(init_vectors(2, 4, &mut a), init_vectors(2, 4, &mut b));
    }

    #[test]
    fn test_init_vectors_range() {
        let mut rng = seeded_rng(Some(1));
        let v = init_vectors(10, 20, &mut rng);
        assert_eq!(v.len(), 200);
        assert!(v.iter().all(|x| x.abs() <= 0.5 / 20.0));
        assert!(v.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_learning_rate_decay() {
        let mut lr = LearningRate::new(0.025, 0.0001, 10, 2);
        assert!((lr.current() - 0.025).abs() < 1e-7);
        lr.advance(10);
        let mid = lr.current();
        assert!(mid < 0.025 && mid > 0.0001);
        lr.advance(100);
        assert!((lr.current() - 0.0001).abs() < 1e-7);
    }

    #[test]
    fn test_context_bounds_within_window() {
        let mut rng = seeded_rng(Some(5));
        for _ in 0..100 {
            let (start, end) = context_bounds(3, 6, 2, &mut rng);
            assert!(start >= 1 && start <= 2);
            assert!(end >= 5 && end <= 6);
        }
        let (start, end) = context_bounds(0, 1, 3, &mut rng);
        assert_eq!((start, end), (0, 1));
    }

    #[test]
    fn test_subsample_keep_all() {
        let mut rng = seeded_rng(Some(2));
        let doc = vec![0, 1, 0, 2];
        assert_eq!(subsample(&doc, &[1.0, 1.0, 1.0], &mut rng), doc);
    }

    #[test]
    fn test_output_layer_learns_target() {
        let corpus = vec![vec!["a".to_string(), "b".to_string()]];
        let vocab = Vocab::build(&corpus, 1);
        let sampler = NegativeSampler::new(&vocab).unwrap();
        let mut layer = OutputLayer::new(vocab.len(), 3, sampler, 0);
        let hidden = [0.5, -0.5, 1.0];
        let mut rng = seeded_rng(Some(9));

        let mut grad = [0.0; 3];
        layer.train(&hidden, 0, 0.5, &mut grad, &mut rng);
        // Output weights start at zero, so the first step yields no input error
        assert_eq!(grad, [0.0; 3]);

        let before = dot(&hidden, row(&layer.weights, 0, 3));
        for _ in 0..10 {
            let mut grad = [0.0; 3];
            layer.train(&hidden, 0, 0.5, &mut grad, &mut rng);
        }
        let after = dot(&hidden, row(&layer.weights, 0, 3));
        assert!(after > before, "target score should increase");
    }
}
