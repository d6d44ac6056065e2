use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::{DbPoolError, PgPool};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to build pool: {0}")]
    PoolBuild(#[from] DbPoolError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "candidate and job tables with typed lifecycle statuses",
        sql: r#"
CREATE TABLE IF NOT EXISTS candidates (
    candidate_id BIGSERIAL PRIMARY KEY,
    filename TEXT NOT NULL,
    raw_text TEXT,
    skills_summary TEXT,
    email TEXT,
    phone TEXT,
    status TEXT NOT NULL DEFAULT 'unset',
    outcome_reason TEXT,
    updated_at TIMESTAMPTZ,
    CONSTRAINT chk_candidate_status
        CHECK (status IN ('unset', 'shortlisted', 'rejected'))
);

CREATE TABLE IF NOT EXISTS job_listings (
    job_id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    combined_text TEXT NOT NULL,
    requirement_summary TEXT,
    shortlisted_emails TEXT,
    match_status TEXT NOT NULL DEFAULT 'unprocessed',
    decided_at TIMESTAMPTZ,
    CONSTRAINT chk_job_match_status
        CHECK (match_status IN ('unprocessed', 'decided'))
);
"#,
    },
    Migration {
        id: 2,
        description: "indexes for the batch scan paths",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_job_listings_unprocessed
    ON job_listings(job_id)
    WHERE match_status = 'unprocessed';

CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_email
    ON candidates(email)
    WHERE email IS NOT NULL;
"#,
    },
];

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}
