use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use super::retriever::{RetrievalError, retrieve_candidates};
use super::store::{Decision, DecisionOutcome, MatchStore, StoreError};
use super::passes_threshold;
use crate::config::MatcherConfig;
use crate::embedding::Embedder;
use crate::index::{IndexError, VectorIndex};
use crate::llm::{ScoreClient, ScoreError, ScoreOutcome};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Counters reported at the end of a batch run. Skipped rows are never
/// silently lost: every skip shows up both here and as a warning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub jobs_processed: usize,
    pub jobs_skipped: usize,
    pub candidates_scored: usize,
    pub candidates_skipped: usize,
    pub shortlisted: usize,
}

/// Batch matching: one pass over every unprocessed job, strictly sequential.
///
/// Per job: retrieve the top-k candidates from the read-only index, score
/// each pair through the generation service, apply the ceiling threshold,
/// and commit the decision as one unit. Transport failures abort the run;
/// the per-entity guards in the store make the rerun safe.
pub struct MatchPipeline<'a, S, E, C> {
    store: &'a S,
    index: &'a VectorIndex,
    embedder: &'a E,
    scorer: &'a C,
    config: &'a MatcherConfig,
}

impl<'a, S, E, C> MatchPipeline<'a, S, E, C>
where
    S: MatchStore,
    E: Embedder,
    C: ScoreClient,
{
    pub fn new(
        store: &'a S,
        index: &'a VectorIndex,
        embedder: &'a E,
        scorer: &'a C,
        config: &'a MatcherConfig,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            scorer,
            config,
        }
    }

    pub async fn run(&self, max_jobs: Option<usize>) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        let jobs = self.store.fetch_unprocessed_jobs().await?;
        info!(unprocessed = jobs.len(), "starting matching run");

        for job in jobs.into_iter().take(max_jobs.unwrap_or(usize::MAX)) {
            let summary = job.requirement_summary.as_deref().unwrap_or("");

            let hits = match retrieve_candidates(
                self.index,
                self.embedder,
                summary,
                self.config.retrieval_k,
            )
            .await
            {
                Ok(hits) => hits,
                Err(RetrievalError::EmptySummary) => {
                    warn!(
                        job_id = job.job_id,
                        "job has no requirement summary; skipped"
                    );
                    report.jobs_skipped += 1;
                    continue;
                }
                Err(RetrievalError::Index(err)) => return Err(err.into()),
            };

            let mut decision = Decision::default();
            for hit in &hits {
                let started = Instant::now();
                match self.scorer.score(summary, &hit.summary).await? {
                    ScoreOutcome::NoScore => {
                        warn!(
                            job_id = job.job_id,
                            email = %hit.reference.email,
                            "no usable score; candidate skipped"
                        );
                        report.candidates_skipped += 1;
                    }
                    ScoreOutcome::Scored(match_score) => {
                        report.candidates_scored += 1;
                        info!(
                            job_id = job.job_id,
                            email = %hit.reference.email,
                            score = match_score.score,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "scored candidate"
                        );
                        if passes_threshold(match_score.score, self.config.shortlist_threshold) {
                            decision.push(hit.reference.email.clone(), match_score.reason);
                        }
                    }
                }
            }

            match self.store.record_decision(job.job_id, &decision).await? {
                DecisionOutcome::Recorded { candidates_marked } => {
                    info!(
                        job_id = job.job_id,
                        shortlisted = decision.len(),
                        candidates_marked,
                        "job decided"
                    );
                    report.jobs_processed += 1;
                    report.shortlisted += decision.len();
                }
                DecisionOutcome::AlreadyDecided => {
                    warn!(job_id = job.job_id, "job already decided; left untouched");
                    report.jobs_skipped += 1;
                }
            }
        }

        info!(
            jobs_processed = report.jobs_processed,
            jobs_skipped = report.jobs_skipped,
            candidates_scored = report.candidates_scored,
            candidates_skipped = report.candidates_skipped,
            shortlisted = report.shortlisted,
            "matching run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidateProfile;
    use crate::embedding::HashEmbedder;
    use crate::index::HnswParams;
    use crate::llm::MatchScore;
    use crate::matching::store::JobRow;
    use crate::state::{CandidateState, JobState};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemoryJob {
        job_id: i64,
        requirement_summary: Option<String>,
        state: JobState,
        shortlisted_emails: Option<String>,
    }

    #[derive(Default)]
    struct MemoryCandidate {
        state: CandidateState,
        outcome_reason: Option<String>,
    }

    /// In-memory stand-in for the Postgres store, enforcing the same guards
    /// through the typed state transitions.
    #[derive(Default)]
    struct MemoryStore {
        jobs: Mutex<Vec<MemoryJob>>,
        candidates: Mutex<HashMap<String, MemoryCandidate>>,
    }

    impl MemoryStore {
        fn with_jobs(summaries: &[(i64, Option<&str>)]) -> Self {
            let store = Self::default();
            {
                let mut jobs = store.jobs.lock().unwrap();
                for (job_id, summary) in summaries {
                    jobs.push(MemoryJob {
                        job_id: *job_id,
                        requirement_summary: summary.map(str::to_string),
                        state: JobState::Unprocessed,
                        shortlisted_emails: None,
                    });
                }
            }
            store
        }

        fn job_emails(&self, job_id: i64) -> Option<String> {
            self.jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.job_id == job_id)
                .and_then(|j| j.shortlisted_emails.clone())
        }

        fn candidate(&self, email: &str) -> (CandidateState, Option<String>) {
            let candidates = self.candidates.lock().unwrap();
            candidates
                .get(email)
                .map(|c| (c.state, c.outcome_reason.clone()))
                .unwrap_or((CandidateState::Unset, None))
        }
    }

    impl MatchStore for MemoryStore {
        async fn fetch_unprocessed_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.state == JobState::Unprocessed)
                .map(|j| JobRow {
                    job_id: j.job_id,
                    requirement_summary: j.requirement_summary.clone(),
                })
                .collect())
        }

        async fn record_decision(
            &self,
            job_id: i64,
            decision: &Decision,
        ) -> Result<DecisionOutcome, StoreError> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| j.job_id == job_id)
                .ok_or_else(|| StoreError::Mapping(format!("no job {job_id}")))?;

            let Ok(next) = job.state.decide() else {
                return Ok(DecisionOutcome::AlreadyDecided);
            };
            job.state = next;
            job.shortlisted_emails = Some(decision.joined_emails());

            let mut candidates = self.candidates.lock().unwrap();
            let mut marked = 0;
            for entry in &decision.entries {
                let candidate = candidates.entry(entry.email.clone()).or_default();
                if let Ok(next) = candidate.state.shortlist() {
                    candidate.state = next;
                    candidate.outcome_reason = Some(entry.reason.clone());
                    marked += 1;
                }
            }

            Ok(DecisionOutcome::Recorded {
                candidates_marked: marked,
            })
        }
    }

    /// Scorer scripted by candidate summary text.
    struct ScriptedScorer {
        outcomes: HashMap<String, ScoreOutcome>,
    }

    impl ScriptedScorer {
        fn new(scores: &[(&str, Option<(f64, &str)>)]) -> Self {
            let outcomes = scores
                .iter()
                .map(|(summary, score)| {
                    let outcome = match score {
                        Some((value, reason)) => ScoreOutcome::Scored(MatchScore {
                            score: *value,
                            reason: reason.to_string(),
                        }),
                        None => ScoreOutcome::NoScore,
                    };
                    (summary.to_string(), outcome)
                })
                .collect();
            Self { outcomes }
        }
    }

    impl ScoreClient for ScriptedScorer {
        async fn score(
            &self,
            _job_summary: &str,
            candidate_text: &str,
        ) -> Result<ScoreOutcome, ScoreError> {
            Ok(self
                .outcomes
                .get(candidate_text)
                .cloned()
                .unwrap_or(ScoreOutcome::NoScore))
        }
    }

    struct UnavailableScorer;

    impl ScoreClient for UnavailableScorer {
        async fn score(&self, _: &str, _: &str) -> Result<ScoreOutcome, ScoreError> {
            Err(ScoreError::Service {
                status: 503,
                message: "connection refused".into(),
            })
        }
    }

    fn profile(email: &str, summary: &str) -> CandidateProfile {
        CandidateProfile {
            filename: format!("{}.pdf", email.split('@').next().unwrap_or("cv")),
            email: Some(email.to_string()),
            skills_summary: Some(summary.to_string()),
            ..Default::default()
        }
    }

    async fn build_index(embedder: &HashEmbedder, candidates: &[CandidateProfile]) -> VectorIndex {
        VectorIndex::build(embedder, HnswParams::default(), candidates)
            .await
            .unwrap()
    }

    fn test_config() -> MatcherConfig {
        MatcherConfig {
            embed_dimension: 128,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn decides_every_unprocessed_job_and_never_revisits() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(
            &embedder,
            &[
                profile("ada@example.com", "rust systems programming"),
                profile("grace@example.com", "compilers cobol leadership"),
            ],
        )
        .await;
        let store = MemoryStore::with_jobs(&[(1, Some("rust systems role"))]);
        let scorer = ScriptedScorer::new(&[
            ("rust systems programming", Some((91.0, "direct fit"))),
            ("compilers cobol leadership", Some((40.0, "different stack"))),
        ]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.jobs_processed, 1);
        assert_eq!(report.candidates_scored, 2);
        assert_eq!(report.shortlisted, 1);
        assert_eq!(store.job_emails(1).as_deref(), Some("ada@example.com"));

        let (state, reason) = store.candidate("ada@example.com");
        assert_eq!(state, CandidateState::Shortlisted);
        assert_eq!(reason.as_deref(), Some("direct fit"));

        // Second run: nothing is unprocessed, nothing changes.
        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report, RunReport::default());
        assert_eq!(store.job_emails(1).as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn ceiling_rule_decides_the_boundary() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(
            &embedder,
            &[
                profile("exact@example.com", "exactly eighty points"),
                profile("close@example.com", "seventy nine point nine nine"),
                profile("below@example.com", "seventy nine flat"),
            ],
        )
        .await;
        let store = MemoryStore::with_jobs(&[(1, Some("any role"))]);
        let scorer = ScriptedScorer::new(&[
            ("exactly eighty points", Some((80.0, "at threshold"))),
            ("seventy nine point nine nine", Some((79.99, "rounds up"))),
            ("seventy nine flat", Some((79.0, "stays below"))),
        ]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.shortlisted, 2);

        assert_eq!(
            store.candidate("exact@example.com").0,
            CandidateState::Shortlisted
        );
        assert_eq!(
            store.candidate("close@example.com").0,
            CandidateState::Shortlisted
        );
        assert_eq!(store.candidate("below@example.com").0, CandidateState::Unset);

        let emails = store.job_emails(1).unwrap();
        assert!(emails.contains("exact@example.com"));
        assert!(!emails.contains("below@example.com"));
    }

    #[tokio::test]
    async fn malformed_reply_skips_candidate_without_mutation() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(
            &embedder,
            &[
                profile("fine@example.com", "kubernetes platform engineering"),
                profile("garbled@example.com", "devops terraform aws"),
            ],
        )
        .await;
        let store = MemoryStore::with_jobs(&[(1, Some("platform role"))]);
        let scorer = ScriptedScorer::new(&[
            ("kubernetes platform engineering", Some((88.0, "great fit"))),
            ("devops terraform aws", None),
        ]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.jobs_processed, 1);
        assert_eq!(report.candidates_skipped, 1);
        assert_eq!(report.candidates_scored, 1);

        // The garbled candidate was left completely untouched.
        let (state, reason) = store.candidate("garbled@example.com");
        assert_eq!(state, CandidateState::Unset);
        assert_eq!(reason, None);
        assert_eq!(store.job_emails(1).as_deref(), Some("fine@example.com"));
    }

    #[tokio::test]
    async fn zero_matches_still_marks_the_job_processed() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(&embedder, &[profile("only@example.com", "php wordpress")]).await;
        let store = MemoryStore::with_jobs(&[(7, Some("embedded firmware role"))]);
        let scorer = ScriptedScorer::new(&[("php wordpress", Some((12.0, "unrelated")))]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.jobs_processed, 1);
        assert_eq!(report.shortlisted, 0);
        // Empty string, not NULL: processed with zero matches.
        assert_eq!(store.job_emails(7).as_deref(), Some(""));

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.jobs_processed, 0);
    }

    #[tokio::test]
    async fn empty_summary_skips_the_job_but_not_the_batch() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(&embedder, &[profile("dev@example.com", "go grpc services")]).await;
        let store = MemoryStore::with_jobs(&[(1, Some("   ")), (2, None), (3, Some("go role"))]);
        let scorer = ScriptedScorer::new(&[("go grpc services", Some((95.0, "yes")))]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.jobs_skipped, 2);
        assert_eq!(report.jobs_processed, 1);

        // Skipped jobs stay unprocessed for a later run.
        assert_eq!(store.job_emails(1), None);
        assert_eq!(store.job_emails(2), None);
        assert_eq!(store.job_emails(3).as_deref(), Some("dev@example.com"));
    }

    #[tokio::test]
    async fn candidate_finalized_by_one_job_is_not_overwritten_by_the_next() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(
            &embedder,
            &[profile("shared@example.com", "fullstack typescript rust")],
        )
        .await;
        let store = MemoryStore::with_jobs(&[
            (1, Some("rust backend role")),
            (2, Some("typescript frontend role")),
        ]);
        let scorer = ScriptedScorer::new(&[(
            "fullstack typescript rust",
            Some((90.0, "matches whichever job scores first")),
        )]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

        let report = pipeline.run(None).await.unwrap();
        assert_eq!(report.jobs_processed, 2);

        // Both jobs list the candidate, but the candidate record carries the
        // first job's outcome and was not touched again.
        assert_eq!(store.job_emails(1).as_deref(), Some("shared@example.com"));
        assert_eq!(store.job_emails(2).as_deref(), Some("shared@example.com"));

        let (state, reason) = store.candidate("shared@example.com");
        assert_eq!(state, CandidateState::Shortlisted);
        assert_eq!(
            reason.as_deref(),
            Some("matches whichever job scores first")
        );
    }

    #[tokio::test]
    async fn generation_outage_aborts_the_run() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(&embedder, &[profile("dev@example.com", "scala spark")]).await;
        let store = MemoryStore::with_jobs(&[(1, Some("data role"))]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &UnavailableScorer, &config);

        let result = pipeline.run(None).await;
        assert!(matches!(result, Err(PipelineError::Score(_))));
        // Nothing was committed; the job is retryable on the next run.
        assert_eq!(store.job_emails(1), None);
    }

    #[tokio::test]
    async fn max_jobs_caps_one_run() {
        let embedder = HashEmbedder::new(128);
        let index = build_index(&embedder, &[profile("dev@example.com", "c embedded")]).await;
        let store = MemoryStore::with_jobs(&[(1, Some("role one")), (2, Some("role two"))]);
        let scorer = ScriptedScorer::new(&[("c embedded", Some((85.0, "fits")))]);
        let config = test_config();
        let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

        let report = pipeline.run(Some(1)).await.unwrap();
        assert_eq!(report.jobs_processed, 1);
        assert_eq!(store.job_emails(2), None);
    }
}
