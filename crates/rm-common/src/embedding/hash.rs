use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

use super::{EmbedError, Embedder, normalize};

/// Fixed seeds keep the hash deterministic across processes and Rust
/// versions. Changing them changes every embedding; bump `version()` too.
const HASH_SEED_K0: u64 = 0x7f4a_9c31_d2e8_55b6;
const HASH_SEED_K1: u64 = 0x1b06_e3f7_48ca_92dd;

/// Feature-hashing text encoder.
///
/// Summaries are lowercased and split on non-alphanumeric boundaries; each
/// token lands in a hashed dimension with a hashed sign, and the result is
/// L2-normalized. No model download, no network, fully deterministic, which
/// is what the offline index rebuild and the test suite want.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_token(&self, token: &str) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let h = self.hash_token(&token);
            let idx = (h as usize) % self.dimension;
            // Sign hashing keeps collisions from always accumulating.
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn version(&self) -> &str {
        "v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.encode(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_distance;

    #[test]
    fn embeddings_are_normalized() {
        let embedder = HashEmbedder::new(256);
        let v = embedder.encode("Rust engineer, 5 years of backend experience");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "L2 norm should be 1.0, got {norm}");
    }

    #[test]
    fn embeddings_are_deterministic() {
        let embedder = HashEmbedder::new(256);
        assert_eq!(
            embedder.encode("python sql airflow"),
            embedder.encode("python sql airflow")
        );
    }

    #[test]
    fn overlapping_summaries_are_closer() {
        let embedder = HashEmbedder::new(256);
        let job = embedder.encode("rust postgres kubernetes backend");
        let similar = embedder.encode("rust postgres docker backend services");
        let different = embedder.encode("graphic design illustrator branding");

        assert!(cosine_distance(&job, &similar) < cosine_distance(&job, &different));
    }

    #[test]
    fn tokenization_is_case_and_punctuation_insensitive() {
        let embedder = HashEmbedder::new(128);
        assert_eq!(
            embedder.encode("Rust, Postgres."),
            embedder.encode("rust postgres")
        );
    }

    #[test]
    fn empty_text_encodes_to_zero_vector() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.encode("");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
