//! Runtime configuration for the matching core.
//!
//! Every tunable the pipeline consumes lives in one `MatcherConfig` that is
//! built once (from the environment) and passed explicitly to the entry
//! points. Components never read the environment on their own.

use crate::index::HnswParams;

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// How many nearest candidates to retrieve per job.
    pub retrieval_k: usize,
    /// Minimum score (after ceiling) for a candidate to be shortlisted.
    pub shortlist_threshold: f64,
    /// Generation model used for scoring.
    pub model: String,
    /// Base URL of the generation service (Ollama-compatible).
    pub endpoint: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    /// How many times a malformed reply is re-requested before the candidate
    /// is given the no-score sentinel.
    pub max_parse_retries: u32,
    /// Which embedder implementation to use ("hash" or "http").
    pub embedder: String,
    pub embed_model: String,
    pub embed_endpoint: String,
    pub embed_dimension: usize,
    pub hnsw: HnswParams,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 6,
            shortlist_threshold: 80.0,
            model: "deepseek-r1:14b".into(),
            endpoint: "http://localhost:11434".into(),
            temperature: 0.1,
            top_k: 25,
            top_p: 0.95,
            max_parse_retries: 2,
            embedder: "hash".into(),
            embed_model: "nomic-embed-text".into(),
            embed_endpoint: "http://localhost:11434".into(),
            embed_dimension: 768,
            hnsw: HnswParams::default(),
        }
    }
}

impl MatcherConfig {
    pub fn from_env() -> Self {
        fn parse_usize(key: &str, default: usize) -> usize {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<usize>().ok())
                .unwrap_or(default)
        }

        fn parse_u32(key: &str, default: u32) -> u32 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<u32>().ok())
                .unwrap_or(default)
        }

        fn parse_f32(key: &str, default: f32) -> f32 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<f32>().ok())
                .unwrap_or(default)
        }

        fn parse_f64(key: &str, default: f64) -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(default)
        }

        fn parse_string(key: &str, default: &str) -> String {
            std::env::var(key).unwrap_or_else(|_| default.into())
        }

        let defaults = Self::default();
        Self {
            retrieval_k: parse_usize("RM_RETRIEVAL_K", defaults.retrieval_k).max(1),
            shortlist_threshold: parse_f64("RM_SHORTLIST_THRESHOLD", defaults.shortlist_threshold),
            model: parse_string("RM_GENERATION_MODEL", &defaults.model),
            endpoint: parse_string("RM_GENERATION_ENDPOINT", &defaults.endpoint),
            temperature: parse_f32("RM_DECODE_TEMPERATURE", defaults.temperature),
            top_k: parse_u32("RM_DECODE_TOP_K", defaults.top_k),
            top_p: parse_f32("RM_DECODE_TOP_P", defaults.top_p),
            max_parse_retries: parse_u32("RM_MAX_PARSE_RETRIES", defaults.max_parse_retries),
            embedder: parse_string("RM_EMBEDDER", &defaults.embedder),
            embed_model: parse_string("RM_EMBEDDING_MODEL", &defaults.embed_model),
            embed_endpoint: parse_string("RM_EMBEDDING_ENDPOINT", &defaults.embed_endpoint),
            embed_dimension: parse_usize("RM_EMBEDDING_DIMENSION", defaults.embed_dimension)
                .max(1),
            hnsw: HnswParams {
                m: parse_usize("RM_HNSW_M", defaults.hnsw.m).max(2),
                ef_construction: parse_usize(
                    "RM_HNSW_EF_CONSTRUCTION",
                    defaults.hnsw.ef_construction,
                )
                .max(1),
                ef_search: parse_usize("RM_HNSW_EF_SEARCH", defaults.hnsw.ef_search).max(1),
            },
        }
    }
}
