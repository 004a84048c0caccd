/// Word → vector lookup table with per-word counts.
///
/// Counts drive the SIF word probabilities. Trained models carry real corpus
/// counts; text-format files carry none, so file order is taken as frequency
/// order and the word at rank `r` of `n` gets count `n - r`.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::info;

use super::EmbedderError;

/// Word vectors of a fixed dimensionality.
#[derive(Debug, Clone)]
pub struct KeyedVectors {
    dims: usize,
    words: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, usize>,
    vectors: Vec<f32>,
}

impl KeyedVectors {
    /// Create an empty table for `dims`-sized vectors.
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            words: Vec::new(),
            counts: Vec::new(),
            index: HashMap::new(),
            vectors: Vec::new(),
        }
    }

    /// Add a word. A repeated word keeps its first vector.
    pub fn push(&mut self, word: &str, count: u64, vector: &[f32]) -> Result<(), EmbedderError> {
        if vector.len() != self.dims {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "vector for {word:?} has {} values, expected {}",
                vector.len(),
                self.dims
            )));
        }
        if self.index.contains_key(word) {
            return Ok(());
        }
        self.index.insert(word.to_string(), self.words.len());
        self.words.push(word.to_string());
        self.counts.push(count);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dims
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    /// Vector for `word`, if present.
    #[must_use]
    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.index
            .get(word)
            .map(|&i| &self.vectors[i * self.dims..(i + 1) * self.dims])
    }

    #[must_use]
    pub fn count(&self, word: &str) -> Option<u64> {
        self.index.get(word).map(|&i| self.counts[i])
    }

    /// Sum of all word counts.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Load vectors from a file, choosing the format by extension.
    ///
    /// `.bin` files are read as word2vec binary, everything else as text.
    pub fn load(path: &Path) -> Result<Self, EmbedderError> {
        info!("Loading word vectors from {}", path.display());
        let file = File::open(path).map_err(|e| {
            EmbedderError::ModelLoadFailed(format!("cannot open {}: {e}", path.display()))
        })?;
        let reader = BufReader::new(file);
        let kv = if path.extension().is_some_and(|ext| ext == "bin") {
            Self::read_binary(reader)?
        } else {
            Self::read_text(reader)?
        };
        info!(
            "Loaded {} word vectors ({} dimensions)",
            kv.len(),
            kv.dimensions()
        );
        Ok(kv)
    }

    /// Parse word vectors in word2vec or GloVe text format.
    ///
    /// A first line of exactly two integers is read as the word2vec
    /// `<words> <dims>` header; otherwise the dimensionality is taken from the
    /// first line. Each line holds a word followed by its values.
    pub fn read_text<R: BufRead>(reader: R) -> Result<Self, EmbedderError> {
        let mut kv: Option<Self> = None;
        let mut vector: Vec<f32> = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(' ').filter(|f| !f.is_empty()).collect();

            if line_no == 0 {
                if let Some((_, dims)) = parse_header(&fields) {
                    kv = Some(Self::new(dims));
                    continue;
                }
            }

            let table = kv.get_or_insert_with(|| Self::new(fields.len().saturating_sub(1)));
            let expected = table.dims;
            if expected == 0 || fields.len() <= expected {
                return Err(EmbedderError::ModelLoadFailed(format!(
                    "line {}: expected a word and {expected} values",
                    line_no + 1
                )));
            }

            // Words containing spaces leave extra leading fields
            let split = fields.len() - expected;
            vector.clear();
            for value in &fields[split..] {
                vector.push(value.parse::<f32>().map_err(|e| {
                    EmbedderError::ModelLoadFailed(format!("line {}: {e}", line_no + 1))
                })?);
            }
            table.push(&fields[..split].join(" "), 0, &vector)?;
        }

        let mut kv = kv
            .filter(|kv| !kv.is_empty())
            .ok_or_else(|| EmbedderError::ModelLoadFailed("no word vectors found".to_string()))?;
        kv.assign_rank_counts();
        Ok(kv)
    }

    /// Parse word vectors in word2vec binary format.
    ///
    /// A text `<words> <dims>` header is followed, per word, by the word, a
    /// space, and `dims` little-endian `f32` values.
    pub fn read_binary<R: BufRead>(mut reader: R) -> Result<Self, EmbedderError> {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        let (words, dims) = parse_header(&fields)
            .filter(|&(words, dims)| words > 0 && dims > 0)
            .ok_or_else(|| {
                EmbedderError::ModelLoadFailed("missing word2vec binary header".to_string())
            })?;

        let mut kv = Self::new(dims);
        let mut word = Vec::new();
        let mut bytes = vec![0u8; dims * 4];
        let mut vector = vec![0.0f32; dims];
        for i in 0..words {
            word.clear();
            reader.read_until(b' ', &mut word)?;
            if word.pop() != Some(b' ') {
                return Err(EmbedderError::ModelLoadFailed(format!(
                    "truncated file at word {i} of {words}"
                )));
            }
            reader.read_exact(&mut bytes)?;
            for (v, chunk) in vector.iter_mut().zip(bytes.chunks_exact(4)) {
                *v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            // Records may be separated by a newline
            let text = String::from_utf8_lossy(&word);
            kv.push(text.trim_start_matches('\n'), 0, &vector)?;
        }

        kv.assign_rank_counts();
        Ok(kv)
    }

    /// File order is frequency order: rank `r` of `n` gets count `n - r`.
    fn assign_rank_counts(&mut self) {
        let n = self.counts.len() as u64;
        for (rank, count) in self.counts.iter_mut().enumerate() {
            *count = n - rank as u64;
        }
    }
}

/// `Some((words, dims))` if the fields form a word2vec `<words> <dims>` header.
fn parse_header(fields: &[&str]) -> Option<(usize, usize)> {
    match fields {
        [words, dims] => Some((words.parse().ok()?, dims.parse().ok()?)),
        _ => None,
    }
}
