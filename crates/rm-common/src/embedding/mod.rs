pub mod hash;
pub mod http;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;

use thiserror::Error;

use crate::config::MatcherConfig;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding service returned status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
}

/// Maps a text summary to a fixed-dimension vector.
///
/// Implementations:
/// - `HashEmbedder`: deterministic feature hashing, no model required
/// - `HttpEmbedder`: remote encoder behind an Ollama-compatible endpoint
///
/// `name()` and `version()` are persisted with the index so a mismatched
/// encoder is detectable at load time.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &'static str;

    fn version(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Runtime-selected embedder. The pipeline is generic over `Embedder`, so the
/// choice is made once here rather than through trait objects.
pub enum AnyEmbedder {
    Hash(HashEmbedder),
    Http(HttpEmbedder),
}

impl Embedder for AnyEmbedder {
    fn name(&self) -> &'static str {
        match self {
            AnyEmbedder::Hash(e) => e.name(),
            AnyEmbedder::Http(e) => e.name(),
        }
    }

    fn version(&self) -> &str {
        match self {
            AnyEmbedder::Hash(e) => e.version(),
            AnyEmbedder::Http(e) => e.version(),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            AnyEmbedder::Hash(e) => e.dimension(),
            AnyEmbedder::Http(e) => e.dimension(),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        match self {
            AnyEmbedder::Hash(e) => e.embed(text).await,
            AnyEmbedder::Http(e) => e.embed(text).await,
        }
    }
}

pub fn create_embedder(config: &MatcherConfig) -> AnyEmbedder {
    match config.embedder.as_str() {
        "http" => AnyEmbedder::Http(HttpEmbedder::new(
            &config.embed_endpoint,
            &config.embed_model,
            config.embed_dimension,
        )),
        _ => AnyEmbedder::Hash(HashEmbedder::new(config.embed_dimension)),
    }
}

/// Cosine distance over L2-normalized vectors (smaller = closer).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "vector dimension mismatch; returning maximum distance"
        );
        return 2.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (1.0 - dot).max(0.0)
}

/// L2-normalize in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        let a = vec![1.0, 0.0, 0.0];
        assert!(cosine_distance(&a, &a) < f32::EPSILON);
    }

    #[test]
    fn orthogonal_vectors_have_unit_distance() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn dimension_mismatch_is_maximally_distant() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_distance(&a, &b), 2.0);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn factory_defaults_to_hash() {
        let embedder = create_embedder(&MatcherConfig::default());
        assert_eq!(embedder.name(), "hash");
        let v = embedder.embed("rust postgres").await.unwrap();
        assert_eq!(v.len(), 768);
    }
}
