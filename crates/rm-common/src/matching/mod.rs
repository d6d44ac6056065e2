pub mod pipeline;
pub mod retriever;
pub mod store;

pub use pipeline::{MatchPipeline, PipelineError, RunReport};
pub use retriever::{RetrievalError, retrieve_candidates};
pub use store::{Decision, DecisionOutcome, JobRow, MatchStore, ShortlistEntry, StoreError};

/// Shortlist rule: the raw score is rounded up before the comparison, so
/// 79.2 becomes 80 and passes an 80 threshold while 79.0 does not. The
/// ceiling is deliberate; changing it to floor flips outcomes near the
/// boundary.
pub fn passes_threshold(score: f64, threshold: f64) -> bool {
    score.ceil() >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_threshold_passes() {
        assert!(passes_threshold(80.0, 80.0));
    }

    #[test]
    fn just_below_rounds_up_and_passes() {
        assert!(passes_threshold(79.99, 80.0));
        assert!(passes_threshold(79.2, 80.0));
    }

    #[test]
    fn whole_point_below_fails() {
        assert!(!passes_threshold(79.0, 80.0));
        assert!(!passes_threshold(0.0, 80.0));
    }

    #[test]
    fn above_threshold_passes() {
        assert!(passes_threshold(100.0, 80.0));
        assert!(passes_threshold(80.5, 80.0));
    }
}
