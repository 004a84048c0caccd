/// Corpus vocabulary for word2vec and paragraph-vector training.
///
/// Holds word counts, the frequent-word downsampling probabilities, and the
/// unigram^0.75 noise distribution used for negative sampling.
use std::collections::HashMap;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use super::EmbedderError;

/// Exponent applied to word counts in the noise distribution.
const NOISE_EXPONENT: f64 = 0.75;

/// Words retained from a tokenized corpus, most frequent first.
#[derive(Debug, Clone)]
pub struct Vocab {
    words: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, usize>,
    total: u64,
}

impl Vocab {
    /// Count the words of `corpus`, dropping those seen fewer than
    /// `min_count` times.
    ///
    /// Ties in frequency keep first-occurrence order.
    #[must_use]
    pub fn build(corpus: &[Vec<String>], min_count: u64) -> Self {
        let mut seen: Vec<(String, u64)> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        for word in corpus.iter().flatten() {
            match position.get(word.as_str()) {
                Some(&i) => seen[i].1 += 1,
                None => {
                    position.insert(word.as_str(), seen.len());
                    seen.push((word.clone(), 1));
                }
            }
        }

        seen.retain(|(_, count)| *count >= min_count);
        seen.sort_by(|a, b| b.1.cmp(&a.1));

        let index = seen
            .iter()
            .enumerate()
            .map(|(i, (word, _))| (word.clone(), i))
            .collect();
        let total = seen.iter().map(|(_, c)| c).sum();
        let (words, counts) = seen.into_iter().unzip();

        Self {
            words,
            counts,
            index,
            total,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Index of `word`, if it survived `min_count`.
    #[must_use]
    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of retained token occurrences in the corpus.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Map a tokenized document to vocabulary indices, skipping unknown words.
    #[must_use]
    pub fn encode(&self, doc: &[String]) -> Vec<usize> {
        doc.iter().filter_map(|w| self.index_of(w)).collect()
    }

    /// Probability of keeping each word during training.
    ///
    /// Words more frequent than `sample` of the corpus are randomly skipped;
    /// a `sample` of zero keeps everything.
    #[must_use]
    pub fn keep_probabilities(&self, sample: f64) -> Vec<f64> {
        if sample <= 0.0 {
            return vec![1.0; self.len()];
        }
        let threshold = sample * self.total as f64;
        self.counts
            .iter()
            .map(|&count| {
                let count = count as f64;
                (((count / threshold).sqrt() + 1.0) * threshold / count).min(1.0)
            })
            .collect()
    }
}

/// Draws noise words proportionally to `count^0.75`.
#[derive(Debug, Clone)]
pub struct NegativeSampler {
    table: WeightedIndex<f64>,
}

impl NegativeSampler {
    pub fn new(vocab: &Vocab) -> Result<Self, EmbedderError> {
        let weights = vocab
            .counts()
            .iter()
            .map(|&c| (c as f64).powf(NOISE_EXPONENT));
        let table = WeightedIndex::new(weights).map_err(|_| EmbedderError::EmptyCorpus)?;
        Ok(Self { table })
    }

    /// Draw one word index.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        self.table.sample(rng)
    }
}
