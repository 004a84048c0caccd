/// Cosine of the angle between `a` and `b`.
///
/// Returns `0.0` when the lengths differ or either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b).sqrt()) as f32
}

/// Pairwise cosine similarities of a set of embeddings.
#[must_use]
pub fn similarity_matrix(vectors: &[Vec<f32>]) -> Vec<Vec<f32>> {
    vectors
        .iter()
        .map(|a| vectors.iter().map(|b| cosine_similarity(a, b)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_same() {
        assert_eq!(cosine_similarity(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_cosine_different() {
        assert!(cosine_similarity(&[1.0, 1.0, 1.0], &[1.0, 1.0, 2.0]) < 1.0);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_similarity_matrix() {
        let m = similarity_matrix(&[vec![1.0, 0.0], vec![0.0, 2.0]]);
        assert_eq!(m, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
