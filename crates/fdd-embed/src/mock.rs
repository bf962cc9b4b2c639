//! # Deterministic Mock Embedder
//!
//! Character-trigram hashing embedder. Each trigram of the lowercased
//! input contributes to a bucket chosen by its SHA-256, so similar
//! strings share most buckets and score high cosine similarity while
//! unrelated strings do not. Deterministic across runs and platforms —
//! suitable for tests and offline development, not for production
//! matching quality.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{vector::l2_normalize, EmbedError, EmbeddingProvider, EMBEDDING_DIM};

/// Deterministic trigram-hash embedder.
#[derive(Debug, Clone, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous embedding; the trait impl delegates here.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        let padded = format!("  {normalized}  ");
        let chars: Vec<char> = padded.chars().collect();

        let mut vector = vec![0.0f32; EMBEDDING_DIM];
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            let hash = Sha256::digest(trigram.as_bytes());
            let bucket = u16::from_be_bytes([hash[0], hash[1]]) as usize % EMBEDDING_DIM;
            // Sign from another hash byte spreads mass around zero.
            let sign = if hash[2] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::cosine_similarity;

    #[test]
    fn deterministic() {
        let e = HashEmbedder::new();
        assert_eq!(e.embed_sync("Acme Burgers"), e.embed_sync("Acme Burgers"));
    }

    #[test]
    fn unit_length() {
        let v = HashEmbedder::new().embed_sync("Acme Burgers");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(v.len(), EMBEDDING_DIM);
    }

    #[test]
    fn similar_names_score_higher_than_unrelated() {
        let e = HashEmbedder::new();
        let a = e.embed_sync("acme burgers");
        let b = e.embed_sync("akme burgers");
        let c = e.embed_sync("zenith plumbing supply");
        let close = cosine_similarity(&a, &b);
        let far = cosine_similarity(&a, &c);
        assert!(close > far, "close={close}, far={far}");
        assert!(close > 0.5, "close={close}");
    }

    #[tokio::test]
    async fn trait_impl_matches_sync() {
        let e = HashEmbedder::new();
        assert_eq!(e.embed("x").await.unwrap(), e.embed_sync("x"));
    }
}
