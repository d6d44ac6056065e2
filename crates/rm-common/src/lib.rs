#![allow(async_fn_in_trait)]

pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod logging;
pub mod matching;
pub mod state;

use serde::{Deserialize, Serialize};

/// A candidate row as the collaborating stages leave it in the shared store.
/// This core only reads `skills_summary`, `email` and `filename`; the status
/// and outcome columns are mutated exclusively through the decision path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateProfile {
    pub candidate_id: Option<i64>,
    pub filename: String,
    pub raw_text: Option<String>,
    pub skills_summary: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Back-reference carried as index metadata. Query-time lookups traverse this
/// struct only; no relational join happens during a matching run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRef {
    pub email: String,
    pub filename: String,
}
