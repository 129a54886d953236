use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use extract::RelationType;
use ingest::Chunk;

pub const HAS_CHUNK: &str = "HAS_CHUNK";
pub const HAS_DOCUMENT: &str = "HAS_DOCUMENT";
pub const MENTIONS: &str = "MENTIONS";

/// Edge types that describe document structure rather than domain facts.
pub const STRUCTURAL_RELATIONS: [&str; 3] = [HAS_CHUNK, HAS_DOCUMENT, MENTIONS];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub source: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub index: usize,
    pub text: String,
}

/// One domain relationship with the types of both endpoints.
///
/// Field order gives the `(source, relation, target)` ordering used when
/// retrieval bounds the number of triples.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GraphTriple {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub source_type: String,
    pub target_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub documents: usize,
    pub chunks: usize,
    pub entities: usize,
    pub relationships: usize,
}

/// A persistent graph backend.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Open a session for one top-level operation.
    ///
    /// The connection is released when the returned session is dropped.
    async fn open(&self) -> Result<Box<dyn GraphSession>>;
}

/// Find-or-create writes and bounded reads against the graph.
///
/// Writes that match on a node which does not exist are no-ops, not errors.
#[async_trait]
pub trait GraphSession: Send + Sync {
    async fn ensure_schema(&self) -> Result<()>;

    async fn document_exists(&self, doc_id: &str) -> Result<bool>;

    /// Create the document or overwrite its `source` and `created`.
    async fn upsert_document(&self, document: &DocumentRecord) -> Result<()>;

    /// Find-or-create the chunk and its `HAS_CHUNK` edge from the document.
    async fn merge_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Find-or-create the entity; its type is overwritten and added to its tags.
    async fn merge_entity(&self, entity_id: &str, entity_type: &str) -> Result<()>;

    async fn merge_mention(&self, chunk_id: &str, entity_id: &str) -> Result<()>;

    /// Returns `false` when either endpoint does not exist.
    async fn merge_relationship(
        &self,
        source_id: &str,
        relation: &RelationType,
        target_id: &str,
    ) -> Result<bool>;

    /// Chunks of a document by ascending index.
    async fn leading_chunks(&self, doc_id: &str, limit: usize) -> Result<Vec<StoredChunk>>;

    /// Distinct domain relationships touching entities the document mentions.
    async fn document_triples(&self, doc_id: &str, limit: usize) -> Result<Vec<GraphTriple>>;

    /// Document ids, newest first.
    async fn list_documents(&self) -> Result<Vec<String>>;

    async fn stats(&self) -> Result<GraphStats>;
}
