pub mod candidates;
pub mod jobs;
pub mod migrations;
pub mod pool;

// Keep re-exports unique so downstream crates see a single symbol per helper.
pub use candidates::{CandidateFetchError, fetch_indexable_candidates};
pub use jobs::{fetch_unprocessed_jobs, record_decision};
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPoolError, PgPool, create_pool_from_url};
