use std::path::PathBuf;

use clap::Parser;
use dotenvy::dotenv;
use rm_common::config::MatcherConfig;
use rm_common::db::{DbPoolError, MigrationError, create_pool_from_url, run_migrations};
use rm_common::embedding::create_embedder;
use rm_common::index::{IndexError, VectorIndex};
use rm_common::llm::OllamaClient;
use rm_common::logging;
use rm_common::matching::store::PgMatchStore;
use rm_common::matching::{MatchPipeline, PipelineError};
use tracing::info;

#[derive(Debug, Clone, Parser)]
#[command(name = "rm-matcher", about = "Score unprocessed jobs against the candidate index")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Directory the index was saved into by rm-indexer
    #[arg(long, env = "RM_INDEX_DIR", default_value = "index")]
    index_dir: PathBuf,

    /// Process at most this many jobs in one run
    #[arg(long, env = "RM_MAX_JOBS")]
    max_jobs: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
enum MatcherError {
    #[error(transparent)]
    Pool(#[from] DbPoolError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

async fn run() -> Result<(), MatcherError> {
    dotenv().ok();
    logging::init_tracing_subscriber("rm-matcher");
    logging::install_tracing_panic_hook("rm-matcher");

    let cli = Cli::parse();
    let config = MatcherConfig::from_env();

    let pool = create_pool_from_url(&cli.database_url)?;
    run_migrations(&pool).await?;

    let index = VectorIndex::load(&cli.index_dir)?;
    let embedder = create_embedder(&config);
    index.check_embedder(&embedder)?;
    info!(
        entries = index.len(),
        embedder = index.embedder_name(),
        "index loaded"
    );

    let scorer = OllamaClient::new(&config);
    let store = PgMatchStore::new(pool);
    let pipeline = MatchPipeline::new(&store, &index, &embedder, &scorer, &config);

    let report = pipeline.run(cli.max_jobs).await?;
    info!(
        jobs_processed = report.jobs_processed,
        jobs_skipped = report.jobs_skipped,
        candidates_scored = report.candidates_scored,
        candidates_skipped = report.candidates_skipped,
        shortlisted = report.shortlisted,
        "matching run complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "rm-matcher failed");
        std::process::exit(1);
    }
}
