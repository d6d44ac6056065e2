use std::path::PathBuf;

use clap::Parser;
use dotenvy::dotenv;
use rm_common::config::MatcherConfig;
use rm_common::db::{
    CandidateFetchError, DbPoolError, MigrationError, create_pool_from_url,
    fetch_indexable_candidates, run_migrations,
};
use rm_common::embedding::create_embedder;
use rm_common::index::{IndexError, VectorIndex};
use rm_common::logging;
use tracing::info;

#[derive(Debug, Clone, Parser)]
#[command(name = "rm-indexer", about = "Rebuild the candidate vector index from the shared store")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Directory the index files are written into
    #[arg(long, env = "RM_INDEX_DIR", default_value = "index")]
    index_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum IndexerError {
    #[error(transparent)]
    Pool(#[from] DbPoolError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Fetch(#[from] CandidateFetchError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

async fn run() -> Result<(), IndexerError> {
    dotenv().ok();
    logging::init_tracing_subscriber("rm-indexer");
    logging::install_tracing_panic_hook("rm-indexer");

    let cli = Cli::parse();
    let config = MatcherConfig::from_env();

    let pool = create_pool_from_url(&cli.database_url)?;
    run_migrations(&pool).await?;

    let candidates = fetch_indexable_candidates(&pool).await?;
    info!(candidates = candidates.len(), "fetched candidate rows");

    let embedder = create_embedder(&config);
    let index = VectorIndex::build(&embedder, config.hnsw, &candidates).await?;
    index.save(&cli.index_dir)?;

    info!(
        indexed = index.len(),
        dir = %cli.index_dir.display(),
        "index rebuild complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "rm-indexer failed");
        std::process::exit(1);
    }
}
