//! # Vector Math for Unit Embeddings
//!
//! All embeddings are L2-normalized at the edge, so cosine similarity
//! reduces to a dot product. `top_k` keeps ordering stable: ties by
//! similarity preserve the input order, which the entity resolver
//! relies on for its created_at tie-break.

/// Normalize a vector to unit length in place. A zero vector is left
/// unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two unit vectors (dot product). Mismatched
/// lengths score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Indices and similarities of the `k` most similar candidates to
/// `query`, descending by similarity; ties keep input order.
pub fn top_k(query: &[f32], candidates: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_similarity(query, c)))
        .collect();
    // Stable sort so equal similarities keep candidate order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_unchanged() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn identical_unit_vectors_score_one() {
        let mut a = vec![1.0, 2.0, 3.0];
        l2_normalize(&mut a);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn top_k_orders_and_truncates() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            vec![0.0, 1.0],  // 0.0
            vec![1.0, 0.0],  // 1.0
            vec![0.7071, 0.7071], // ~0.707
        ];
        let top = top_k(&query, &candidates, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 1);
        assert_eq!(top[1].0, 2);
    }

    #[test]
    fn top_k_ties_keep_input_order() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let top = top_k(&query, &candidates, 2);
        assert_eq!(top[0].0, 0);
        assert_eq!(top[1].0, 1);
    }
}
