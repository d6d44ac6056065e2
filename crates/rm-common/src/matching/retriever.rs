use thiserror::Error;
use tracing::debug;

use crate::embedding::Embedder;
use crate::index::{IndexError, SearchHit, VectorIndex};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("job summary is empty; nothing to retrieve against")]
    EmptySummary,
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Fetch the top-k candidates for a job summary, most similar first.
///
/// The index ordering is returned unchanged; no re-ranking happens here.
/// An empty summary is an input precondition failure, reported as an error
/// before any query is made.
pub async fn retrieve_candidates<E: Embedder>(
    index: &VectorIndex,
    embedder: &E,
    job_summary: &str,
    k: usize,
) -> Result<Vec<SearchHit>, RetrievalError> {
    let summary = job_summary.trim();
    if summary.is_empty() {
        return Err(RetrievalError::EmptySummary);
    }

    let hits = index.search(embedder, summary, k).await?;
    debug!(requested = k, retrieved = hits.len(), "retrieved candidates");
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidateProfile;
    use crate::embedding::HashEmbedder;
    use crate::index::HnswParams;

    async fn small_index(embedder: &HashEmbedder) -> VectorIndex {
        let candidates = vec![
            CandidateProfile {
                filename: "a.pdf".into(),
                email: Some("a@example.com".into()),
                skills_summary: Some("rust backend".into()),
                ..Default::default()
            },
            CandidateProfile {
                filename: "b.pdf".into(),
                email: Some("b@example.com".into()),
                skills_summary: Some("frontend react".into()),
                ..Default::default()
            },
        ];
        VectorIndex::build(embedder, HnswParams::default(), &candidates)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_summary_is_rejected_before_querying() {
        let embedder = HashEmbedder::new(64);
        let index = small_index(&embedder).await;

        let result = retrieve_candidates(&index, &embedder, "   ", 6).await;
        assert!(matches!(result, Err(RetrievalError::EmptySummary)));
    }

    #[tokio::test]
    async fn returns_index_order_unchanged() {
        let embedder = HashEmbedder::new(64);
        let index = small_index(&embedder).await;

        let hits = retrieve_candidates(&index, &embedder, "rust services", 6)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
        assert_eq!(hits[0].reference.email, "a@example.com");
    }
}
