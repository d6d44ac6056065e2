use deadpool_postgres::PoolError;
use tokio_postgres::Error as PgError;
use tracing::{instrument, warn};

use crate::CandidateProfile;
use crate::db::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum CandidateFetchError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
}

/// Every candidate row the indexer considers. Rows missing a summary or an
/// email are returned as-is; the index build is the one place that decides
/// to exclude them, with a warning per row.
#[instrument(skip(pool))]
pub async fn fetch_indexable_candidates(
    pool: &PgPool,
) -> Result<Vec<CandidateProfile>, CandidateFetchError> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT candidate_id, filename, raw_text, skills_summary, email, phone \
             FROM candidates \
             ORDER BY candidate_id",
            &[],
        )
        .await?;

    let total = rows.len();
    let profiles: Vec<CandidateProfile> = rows
        .into_iter()
        .map(|row| CandidateProfile {
            candidate_id: row.get("candidate_id"),
            filename: row.get("filename"),
            raw_text: row.get("raw_text"),
            skills_summary: row.get("skills_summary"),
            email: row.get("email"),
            phone: row.get("phone"),
        })
        .collect();

    let incomplete = profiles
        .iter()
        .filter(|p| {
            p.email.as_deref().unwrap_or("").is_empty()
                || p.skills_summary
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty()
        })
        .count();
    if incomplete > 0 {
        warn!(total, incomplete, "some candidate rows lack a summary or email");
    }

    Ok(profiles)
}
