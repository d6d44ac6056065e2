use deadpool_postgres::PoolError;
use tokio_postgres::Error as PgError;

use crate::db::PgPool;
use crate::db::jobs;

/// Field separator in the persisted shortlist string. Downstream readers
/// split on this literal token.
pub const EMAIL_SEPARATOR: &str = "||";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map row: {0}")]
    Mapping(String),
}

/// The slice of a job the pipeline needs: its id and requirement summary.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub job_id: i64,
    pub requirement_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortlistEntry {
    pub email: String,
    pub reason: String,
}

/// Everything written back for one job, committed as a unit. Insertion order
/// follows retrieval order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub entries: Vec<ShortlistEntry>,
}

impl Decision {
    pub fn push(&mut self, email: impl Into<String>, reason: impl Into<String>) {
        self.entries.push(ShortlistEntry {
            email: email.into(),
            reason: reason.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shortlist string as persisted: `a@x||b@y`, empty when nobody
    /// qualified. The empty string still marks the job as processed.
    pub fn joined_emails(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.email.as_str())
            .collect::<Vec<_>>()
            .join(EMAIL_SEPARATOR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The job was marked decided; `candidates_marked` counts candidates
    /// newly moved to shortlisted (already-terminal candidates are skipped
    /// by the guard and not counted).
    Recorded { candidates_marked: u64 },
    /// The job was already decided by an earlier run; nothing was written.
    AlreadyDecided,
}

/// Capability object over the shared relational store. The pipeline only
/// ever talks to this trait, so tests substitute an in-memory fake.
pub trait MatchStore: Send + Sync {
    async fn fetch_unprocessed_jobs(&self) -> Result<Vec<JobRow>, StoreError>;

    async fn record_decision(
        &self,
        job_id: i64,
        decision: &Decision,
    ) -> Result<DecisionOutcome, StoreError>;
}

/// Postgres-backed store used by the batch binaries.
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MatchStore for PgMatchStore {
    async fn fetch_unprocessed_jobs(&self) -> Result<Vec<JobRow>, StoreError> {
        jobs::fetch_unprocessed_jobs(&self.pool).await
    }

    async fn record_decision(
        &self,
        job_id: i64,
        decision: &Decision,
    ) -> Result<DecisionOutcome, StoreError> {
        jobs::record_decision(&self.pool, job_id, decision).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_emails_uses_the_double_pipe_separator() {
        let mut decision = Decision::default();
        decision.push("a@example.com", "fits");
        decision.push("b@example.com", "also fits");
        assert_eq!(decision.joined_emails(), "a@example.com||b@example.com");
    }

    #[test]
    fn empty_decision_joins_to_empty_string() {
        assert_eq!(Decision::default().joined_emails(), "");
    }
}
