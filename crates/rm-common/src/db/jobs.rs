use chrono::Utc;
use tracing::{info, instrument};

use crate::db::PgPool;
use crate::matching::store::{Decision, DecisionOutcome, JobRow, StoreError};
use crate::state::{CandidateState, JobState};

/// Jobs still waiting for a matching decision, oldest id first so reruns
/// walk the backlog in a stable order.
#[instrument(skip(pool))]
pub async fn fetch_unprocessed_jobs(pool: &PgPool) -> Result<Vec<JobRow>, StoreError> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT job_id, requirement_summary \
             FROM job_listings \
             WHERE match_status = $1 \
             ORDER BY job_id",
            &[&JobState::Unprocessed.as_str()],
        )
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| JobRow {
            job_id: row.get("job_id"),
            requirement_summary: row.get("requirement_summary"),
        })
        .collect())
}

/// Commit one job's decision as a single transaction.
///
/// The job update is guarded on `match_status = 'unprocessed'`; when it hits
/// zero rows another run already decided this job and the transaction is
/// dropped without touching any candidate. Candidate updates carry their own
/// guard on `status = 'unset'`, so a candidate finalized by an earlier job
/// keeps its original outcome even when it qualifies again here.
#[instrument(skip(pool, decision), fields(shortlisted = decision.len()))]
pub async fn record_decision(
    pool: &PgPool,
    job_id: i64,
    decision: &Decision,
) -> Result<DecisionOutcome, StoreError> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let now = Utc::now();
    let joined_emails = decision.joined_emails();
    let job_rows = tx
        .execute(
            "UPDATE job_listings \
             SET shortlisted_emails = $1, match_status = $2, decided_at = $3 \
             WHERE job_id = $4 AND match_status = $5",
            &[
                &joined_emails,
                &JobState::Decided.as_str(),
                &now,
                &job_id,
                &JobState::Unprocessed.as_str(),
            ],
        )
        .await?;

    if job_rows == 0 {
        // Lost the race to another run; the open transaction rolls back on drop.
        return Ok(DecisionOutcome::AlreadyDecided);
    }

    let mut candidates_marked = 0u64;
    for entry in &decision.entries {
        candidates_marked += tx
            .execute(
                "UPDATE candidates \
                 SET status = $1, outcome_reason = $2, updated_at = $3 \
                 WHERE email = $4 AND status = $5",
                &[
                    &CandidateState::Shortlisted.as_str(),
                    &entry.reason,
                    &now,
                    &entry.email,
                    &CandidateState::Unset.as_str(),
                ],
            )
            .await?;
    }

    tx.commit().await?;
    info!(job_id, candidates_marked, "recorded matching decision");

    Ok(DecisionOutcome::Recorded { candidates_marked })
}
