pub mod error;
pub mod memory_store;
pub mod merge;
pub mod neo4j_store;
pub mod registry;
pub mod store;

pub use error::IngestError;
pub use memory_store::MemoryStore;
pub use merge::{GraphMerger, MergeReport};
pub use neo4j_store::{Neo4jStore, StoreConfig};
pub use registry::{DocumentRegistry, ReingestPolicy, Registration, SourceDocument};
pub use store::{
    DocumentRecord, GraphSession, GraphStats, GraphStore, GraphTriple, StoredChunk,
    STRUCTURAL_RELATIONS,
};

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use extract::GraphExtractor;
use ingest::{Chunk, Chunker, ChunkerConfig, FileReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Ingested,
    Reingested,
    AlreadyIngested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Extraction,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Merged(MergeReport),
    Failed {
        index: usize,
        chunk_id: String,
        stage: FailureStage,
        reason: String,
    },
}

impl ChunkOutcome {
    fn failed(chunk: &Chunk, stage: FailureStage, err: &anyhow::Error) -> Self {
        Self::Failed {
            index: chunk.index,
            chunk_id: chunk.chunk_id.clone(),
            stage,
            reason: format!("{:#}", err),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Merged(report) => report.index,
            Self::Failed { index, .. } => *index,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub source: String,
    pub status: IngestStatus,
    pub chunks: Vec<ChunkOutcome>,
}

impl IngestReport {
    pub fn succeeded(&self) -> usize {
        self.chunks.iter().filter(|c| !c.is_failed()).count()
    }

    pub fn failed(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_failed()).count()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .filter(|c| c.is_failed())
            .map(ChunkOutcome::index)
            .collect()
    }

    pub fn entities_merged(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| match c {
                ChunkOutcome::Merged(report) => report.entities_merged,
                ChunkOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Ingestion pipeline: registry, chunker, then extraction and merge per chunk.
pub struct Indexer {
    store: Arc<dyn GraphStore>,
    extractor: Arc<dyn GraphExtractor>,
    chunker: Chunker,
    merger: GraphMerger,
    policy: ReingestPolicy,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn GraphStore>,
        extractor: Arc<dyn GraphExtractor>,
        chunker_config: ChunkerConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            chunker: Chunker::new(chunker_config),
            merger: GraphMerger::new(),
            policy: ReingestPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReingestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Prepare the store (constraints and indexes)
    pub async fn init(&self) -> Result<(), IngestError> {
        let session = self.store.open().await.map_err(IngestError::Store)?;
        session.ensure_schema().await.map_err(IngestError::Store)
    }

    pub async fn ingest(&self, path: &Path) -> Result<IngestReport, IngestError> {
        self.ingest_with_policy(path, self.policy).await
    }

    pub async fn ingest_with_policy(
        &self,
        path: &Path,
        policy: ReingestPolicy,
    ) -> Result<IngestReport, IngestError> {
        let document = DocumentRegistry::locate(path)?;
        info!(doc_id = %document.doc_id, source = %document.source, "Processing document");

        let text = FileReader::read_file(path)
            .await
            .map_err(|e| IngestError::Read(path.to_path_buf(), e))?;

        let session = self.store.open().await.map_err(IngestError::Store)?;
        let registration = DocumentRegistry::register(session.as_ref(), &document, policy).await?;

        if !registration.proceed {
            return Ok(IngestReport {
                doc_id: document.doc_id,
                source: document.source,
                status: IngestStatus::AlreadyIngested,
                chunks: Vec::new(),
            });
        }

        let chunks = self.chunker.chunk_text(&document.doc_id, &text);
        info!(doc_id = %document.doc_id, chunks = chunks.len(), "Extracting graph from chunks");

        let mut outcomes = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            outcomes.push(self.process_chunk(session.as_ref(), chunk).await);
        }

        let report = IngestReport {
            doc_id: document.doc_id,
            source: document.source,
            status: if registration.already_exists {
                IngestStatus::Reingested
            } else {
                IngestStatus::Ingested
            },
            chunks: outcomes,
        };

        info!(
            doc_id = %report.doc_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Extraction and merge for one chunk. Failures stay inside the outcome.
    async fn process_chunk(&self, session: &dyn GraphSession, chunk: &Chunk) -> ChunkOutcome {
        let extraction = match self.extractor.extract(&chunk.text).await {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!(chunk = chunk.index, error = %format!("{:#}", err), "Extraction failed, continuing");
                // Keep the text retrievable even without a graph for it
                if let Err(store_err) = self.merger.persist_chunk(session, chunk).await {
                    warn!(chunk = chunk.index, error = %format!("{:#}", store_err), "Failed to store chunk text");
                }
                return ChunkOutcome::failed(chunk, FailureStage::Extraction, &err);
            }
        };

        match self.merger.merge_chunk(session, chunk, &extraction).await {
            Ok(report) => {
                info!(
                    chunk = chunk.index + 1,
                    entities = report.entities_merged,
                    relationships = report.relationships_linked,
                    "Chunk saved"
                );
                ChunkOutcome::Merged(report)
            }
            Err(err) => {
                warn!(chunk = chunk.index, error = %format!("{:#}", err), "Merge failed, continuing");
                ChunkOutcome::failed(chunk, FailureStage::Merge, &err)
            }
        }
    }

    /// Document ids, newest first
    pub async fn list_documents(&self) -> Result<Vec<String>, IngestError> {
        let session = self.store.open().await.map_err(IngestError::Store)?;
        session.list_documents().await.map_err(IngestError::Store)
    }

    pub async fn stats(&self) -> Result<GraphStats, IngestError> {
        let session = self.store.open().await.map_err(IngestError::Store)?;
        session.stats().await.map_err(IngestError::Store)
    }
}
