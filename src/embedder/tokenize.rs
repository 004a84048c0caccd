/// Tokenize a single text into lowercase words.
///
/// Splits on whitespace; punctuation stays attached to its word.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Tokenize every text of a corpus, preserving order.
#[must_use]
pub fn tokenize_corpus(texts: &[&str]) -> Vec<Vec<String>> {
    texts.iter().map(|t| tokenize(t)).collect()
}

/// Tokenize every text and keep only tokens accepted by `in_vocab`.
pub fn tokenize_filtered<F>(texts: &[&str], in_vocab: F) -> Vec<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    texts
        .iter()
        .map(|t| tokenize(t).into_iter().filter(|w| in_vocab(w)).collect())
        .collect()
}
