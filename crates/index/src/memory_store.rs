use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use extract::RelationType;
use ingest::Chunk;

use crate::store::{
    DocumentRecord, GraphSession, GraphStats, GraphStore, GraphTriple, StoredChunk,
    STRUCTURAL_RELATIONS,
};

#[derive(Debug, Clone)]
struct DocumentNode {
    source: String,
    created: DateTime<Utc>,
    // Insertion order, breaks ties between equal timestamps
    seq: u64,
}

#[derive(Debug, Clone)]
struct ChunkNode {
    doc_id: String,
    index: usize,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNode {
    pub entity_type: String,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct MemoryGraph {
    documents: BTreeMap<String, DocumentNode>,
    chunks: BTreeMap<String, ChunkNode>,
    entities: BTreeMap<String, EntityNode>,
    // (chunk_id, entity_id)
    mentions: BTreeSet<(String, String)>,
    // (source_id, relation, target_id)
    relationships: BTreeSet<(String, String, String)>,
    next_seq: u64,
}

/// In-process graph with the same find-or-create semantics as the Neo4j store.
///
/// Sessions share one graph, so clones of the store see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    graph: Arc<Mutex<MemoryGraph>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn document(&self, doc_id: &str) -> Option<DocumentRecord> {
        self.state().documents.get(doc_id).map(|doc| DocumentRecord {
            id: doc_id.to_string(),
            source: doc.source.clone(),
            created: doc.created,
        })
    }

    pub fn entity(&self, entity_id: &str) -> Option<EntityNode> {
        self.state().entities.get(entity_id).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.state().entities.len()
    }

    /// Entity ids mentioned by a chunk, sorted.
    pub fn mentions(&self, chunk_id: &str) -> Vec<String> {
        self.state()
            .mentions
            .iter()
            .filter(|(chunk, _)| chunk == chunk_id)
            .map(|(_, entity)| entity.clone())
            .collect()
    }

    /// All domain relationships as `(source, relation, target)`, sorted.
    pub fn relationships(&self) -> Vec<(String, String, String)> {
        self.state().relationships.iter().cloned().collect()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn open(&self) -> Result<Box<dyn GraphSession>> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl GraphSession for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn document_exists(&self, doc_id: &str) -> Result<bool> {
        Ok(self.state().documents.contains_key(doc_id))
    }

    async fn upsert_document(&self, document: &DocumentRecord) -> Result<()> {
        let mut graph = self.state();
        let seq = graph.next_seq;
        graph.next_seq += 1;
        graph.documents.insert(
            document.id.clone(),
            DocumentNode {
                source: document.source.clone(),
                created: document.created,
                seq,
            },
        );
        Ok(())
    }

    async fn merge_chunk(&self, chunk: &Chunk) -> Result<()> {
        let mut graph = self.state();
        if !graph.documents.contains_key(&chunk.doc_id) {
            return Ok(());
        }
        graph.chunks.insert(
            chunk.chunk_id.clone(),
            ChunkNode {
                doc_id: chunk.doc_id.clone(),
                index: chunk.index,
                text: chunk.text.clone(),
            },
        );
        Ok(())
    }

    async fn merge_entity(&self, entity_id: &str, entity_type: &str) -> Result<()> {
        let mut graph = self.state();
        let entity = graph
            .entities
            .entry(entity_id.to_string())
            .or_insert_with(|| EntityNode {
                entity_type: entity_type.to_string(),
                tags: BTreeSet::new(),
            });
        entity.entity_type = entity_type.to_string();
        entity.tags.insert(entity_type.to_string());
        Ok(())
    }

    async fn merge_mention(&self, chunk_id: &str, entity_id: &str) -> Result<()> {
        let mut graph = self.state();
        if graph.chunks.contains_key(chunk_id) && graph.entities.contains_key(entity_id) {
            graph
                .mentions
                .insert((chunk_id.to_string(), entity_id.to_string()));
        }
        Ok(())
    }

    async fn merge_relationship(
        &self,
        source_id: &str,
        relation: &RelationType,
        target_id: &str,
    ) -> Result<bool> {
        let mut graph = self.state();
        if !graph.entities.contains_key(source_id) || !graph.entities.contains_key(target_id) {
            return Ok(false);
        }
        graph.relationships.insert((
            source_id.to_string(),
            relation.as_str().to_string(),
            target_id.to_string(),
        ));
        Ok(true)
    }

    async fn leading_chunks(&self, doc_id: &str, limit: usize) -> Result<Vec<StoredChunk>> {
        let graph = self.state();
        let mut chunks: Vec<StoredChunk> = graph
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.doc_id == doc_id)
            .map(|(id, chunk)| StoredChunk {
                id: id.clone(),
                index: chunk.index,
                text: chunk.text.clone(),
            })
            .collect();

        chunks.sort_by_key(|chunk| chunk.index);
        chunks.truncate(limit);
        Ok(chunks)
    }

    async fn document_triples(&self, doc_id: &str, limit: usize) -> Result<Vec<GraphTriple>> {
        let graph = self.state();

        let mentioned: BTreeSet<&String> = graph
            .mentions
            .iter()
            .filter(|(chunk_id, _)| {
                graph
                    .chunks
                    .get(chunk_id)
                    .is_some_and(|chunk| chunk.doc_id == doc_id)
            })
            .map(|(_, entity_id)| entity_id)
            .collect();

        let entity_type = |id: &String| {
            graph
                .entities
                .get(id)
                .map(|entity| entity.entity_type.clone())
                .unwrap_or_else(|| extract::DEFAULT_ENTITY_TYPE.to_string())
        };

        let triples: BTreeSet<GraphTriple> = graph
            .relationships
            .iter()
            .filter(|(source, relation, target)| {
                !STRUCTURAL_RELATIONS.contains(&relation.as_str())
                    && (mentioned.contains(source) || mentioned.contains(target))
            })
            .map(|(source, relation, target)| GraphTriple {
                source: source.clone(),
                relation: relation.clone(),
                target: target.clone(),
                source_type: entity_type(source),
                target_type: entity_type(target),
            })
            .collect();

        Ok(triples.into_iter().take(limit).collect())
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        let graph = self.state();
        let mut documents: Vec<(&String, &DocumentNode)> = graph.documents.iter().collect();
        documents.sort_by(|a, b| (b.1.created, b.1.seq).cmp(&(a.1.created, a.1.seq)));
        Ok(documents.into_iter().map(|(id, _)| id.clone()).collect())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let graph = self.state();
        Ok(GraphStats {
            documents: graph.documents.len(),
            chunks: graph.chunks.len(),
            entities: graph.entities.len(),
            relationships: graph.relationships.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(raw: &str) -> RelationType {
        RelationType::normalize(raw).unwrap()
    }

    async fn store_with_document(doc_id: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .upsert_document(&DocumentRecord {
                id: doc_id.to_string(),
                source: format!("{}.txt", doc_id),
                created: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_entity_type_is_last_write_wins() {
        let store = MemoryStore::new();
        store.merge_entity("Alice", "Person").await.unwrap();
        store.merge_entity("Alice", "Author").await.unwrap();

        let entity = store.entity("Alice").unwrap();
        assert_eq!(store.entity_count(), 1);
        assert_eq!(entity.entity_type, "Author");
        assert!(entity.tags.contains("Person") && entity.tags.contains("Author"));
    }

    #[tokio::test]
    async fn test_relationship_requires_both_endpoints() {
        let store = MemoryStore::new();
        store.merge_entity("Alice", "Person").await.unwrap();

        let linked = store
            .merge_relationship("Alice", &relation("works for"), "Acme")
            .await
            .unwrap();

        assert!(!linked);
        assert!(store.relationships().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_without_document_is_not_stored() {
        let store = MemoryStore::new();
        let chunk = Chunk::new("missing".to_string(), 0, "text".to_string());
        store.merge_chunk(&chunk).await.unwrap();

        assert!(store.leading_chunks("missing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_structural_types_are_not_graph_context() {
        let store = store_with_document("doc").await;
        let chunk = Chunk::new("doc".to_string(), 0, "text".to_string());
        store.merge_chunk(&chunk).await.unwrap();
        store.merge_entity("A", "Thing").await.unwrap();
        store.merge_entity("B", "Thing").await.unwrap();
        store.merge_mention(&chunk.chunk_id, "A").await.unwrap();
        store.merge_relationship("A", &relation("MENTIONS"), "B").await.unwrap();
        store.merge_relationship("B", &relation("OWNS"), "A").await.unwrap();

        let triples = store.document_triples("doc", 100).await.unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].source, "B");
        assert_eq!(triples[0].relation, "OWNS");
        assert_eq!(triples[0].target, "A");
    }

    #[tokio::test]
    async fn test_documents_listed_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (id, age) in [("old", 60), ("new", 0), ("mid", 30)] {
            store
                .upsert_document(&DocumentRecord {
                    id: id.to_string(),
                    source: id.to_string(),
                    created: now - chrono::Duration::seconds(age),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.list_documents().await.unwrap(), vec!["new", "mid", "old"]);
    }
}
