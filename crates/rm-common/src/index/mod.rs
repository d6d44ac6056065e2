pub mod hnsw;

pub use hnsw::{HnswGraph, HnswParams};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::CandidateProfile;
use crate::CandidateRef;
use crate::embedding::{EmbedError, Embedder, normalize};

const GRAPH_FILE: &str = "graph.json";
const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to encode text: {0}")]
    Embed(#[from] EmbedError),
    #[error("index io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("index is corrupt: {0}")]
    Corrupt(String),
}

/// One stored document: the summary text that was embedded plus the
/// candidate back-reference returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub reference: CandidateRef,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub reference: CandidateRef,
    pub summary: String,
    pub distance: f32,
}

/// Serialized alongside the graph so a load with the wrong encoder is
/// detectable instead of silently returning nonsense distances.
#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    embedder_name: String,
    embedder_version: String,
    dimension: usize,
    graph: HnswGraph,
}

/// Persistent approximate nearest-neighbor index over candidate summaries.
///
/// Built offline as a full rebuild and treated as read-only during a
/// matching run. Internal vector ids map positionally into the document
/// side table, so lookups never touch the relational store.
pub struct VectorIndex {
    graph: HnswGraph,
    documents: Vec<IndexedDocument>,
    embedder_name: String,
    embedder_version: String,
    dimension: usize,
}

impl VectorIndex {
    /// Embed and insert every candidate with a usable summary.
    ///
    /// Candidates missing a summary or an email are precondition violations:
    /// each is skipped with one warning, and the build continues.
    pub async fn build<E: Embedder>(
        embedder: &E,
        params: HnswParams,
        candidates: &[CandidateProfile],
    ) -> Result<Self, IndexError> {
        let mut graph = HnswGraph::new(params);
        let mut documents = Vec::new();

        for candidate in candidates {
            let summary = candidate
                .skills_summary
                .as_deref()
                .map(str::trim)
                .unwrap_or("");
            if summary.is_empty() {
                warn!(
                    filename = %candidate.filename,
                    "candidate has no skills summary; excluded from index"
                );
                continue;
            }
            let Some(email) = candidate.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
            else {
                warn!(
                    filename = %candidate.filename,
                    "candidate has no contact email; excluded from index"
                );
                continue;
            };

            let mut vector = embedder.embed(summary).await?;
            normalize(&mut vector);
            let id = graph.insert(vector);
            debug_assert_eq!(id as usize, documents.len());

            documents.push(IndexedDocument {
                reference: CandidateRef {
                    email: email.to_string(),
                    filename: candidate.filename.clone(),
                },
                summary: summary.to_string(),
            });
        }

        info!(
            indexed = documents.len(),
            excluded = candidates.len() - documents.len(),
            "vector index built"
        );

        Ok(Self {
            graph,
            documents,
            embedder_name: embedder.name().to_string(),
            embedder_version: embedder.version().to_string(),
            dimension: embedder.dimension(),
        })
    }

    /// Encode the query and return up to `k` candidates, most similar first.
    pub async fn search<E: Embedder>(
        &self,
        embedder: &E,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let mut query = embedder.embed(query_text).await?;
        normalize(&mut query);

        let hits = self
            .graph
            .search(&query, k)
            .into_iter()
            .map(|(id, distance)| {
                let doc = &self.documents[id as usize];
                SearchHit {
                    reference: doc.reference.clone(),
                    summary: doc.summary.clone(),
                    distance,
                }
            })
            .collect();

        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn embedder_name(&self) -> &str {
        &self.embedder_name
    }

    pub fn embedder_version(&self) -> &str {
        &self.embedder_version
    }

    /// Write the graph and the metadata side table into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir)?;

        let graph_file = File::create(dir.join(GRAPH_FILE))?;
        serde_json::to_writer(
            BufWriter::new(graph_file),
            &GraphFile {
                embedder_name: self.embedder_name.clone(),
                embedder_version: self.embedder_version.clone(),
                dimension: self.dimension,
                graph: self.graph.clone(),
            },
        )?;

        let metadata_file = File::create(dir.join(METADATA_FILE))?;
        serde_json::to_writer(BufWriter::new(metadata_file), &self.documents)?;

        info!(dir = %dir.display(), entries = self.documents.len(), "vector index saved");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let graph_file: GraphFile =
            serde_json::from_reader(BufReader::new(File::open(dir.join(GRAPH_FILE))?))?;
        let documents: Vec<IndexedDocument> =
            serde_json::from_reader(BufReader::new(File::open(dir.join(METADATA_FILE))?))?;

        if documents.len() != graph_file.graph.len() {
            return Err(IndexError::Corrupt(format!(
                "metadata has {} entries but graph has {} vectors",
                documents.len(),
                graph_file.graph.len()
            )));
        }

        info!(
            dir = %dir.display(),
            entries = documents.len(),
            embedder = %graph_file.embedder_name,
            "vector index loaded"
        );

        Ok(Self {
            graph: graph_file.graph,
            documents,
            embedder_name: graph_file.embedder_name,
            embedder_version: graph_file.embedder_version,
            dimension: graph_file.dimension,
        })
    }

    /// Verify the index was built with a compatible encoder.
    pub fn check_embedder<E: Embedder>(&self, embedder: &E) -> Result<(), IndexError> {
        if embedder.name() != self.embedder_name || embedder.dimension() != self.dimension {
            return Err(IndexError::Corrupt(format!(
                "index was built with {} (dim {}), but {} (dim {}) is configured",
                self.embedder_name,
                self.dimension,
                embedder.name(),
                embedder.dimension()
            )));
        }
        Ok(())
    }
}
