use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use extract::{clean_entity_id, clean_entity_type, ExtractionResult, RelationType};
use ingest::Chunk;

use crate::store::GraphSession;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub chunk_id: String,
    pub index: usize,
    pub entities_merged: usize,
    pub relationships_linked: usize,
    /// Relationships with an endpoint that is not in the graph
    pub relationships_skipped: usize,
    /// Relationships whose type is not a valid identifier
    pub relationships_rejected: usize,
}

/// Reconciles one chunk's extraction result into the graph.
///
/// Every write is find-or-create, so merging the same chunk twice leaves the
/// graph unchanged apart from entity types, which are last-write-wins.
#[derive(Debug, Default)]
pub struct GraphMerger;

impl GraphMerger {
    pub fn new() -> Self {
        Self
    }

    /// Store the chunk node and its `HAS_CHUNK` edge.
    pub async fn persist_chunk(&self, session: &dyn GraphSession, chunk: &Chunk) -> Result<()> {
        session
            .merge_chunk(chunk)
            .await
            .with_context(|| format!("Failed to store chunk {}", chunk.chunk_id))
    }

    pub async fn merge_chunk(
        &self,
        session: &dyn GraphSession,
        chunk: &Chunk,
        extraction: &ExtractionResult,
    ) -> Result<MergeReport> {
        self.persist_chunk(session, chunk).await?;

        let mut report = MergeReport {
            chunk_id: chunk.chunk_id.clone(),
            index: chunk.index,
            ..MergeReport::default()
        };

        // Phase A: every entity of this chunk exists before any relationship is linked
        for entity in &extraction.entities {
            let entity_id = clean_entity_id(&entity.id);
            if entity_id.is_empty() {
                debug!(chunk_id = %chunk.chunk_id, raw = %entity.id, "Skipping entity with empty id");
                continue;
            }
            let entity_type = clean_entity_type(&entity.entity_type);

            session
                .merge_entity(&entity_id, &entity_type)
                .await
                .with_context(|| format!("Failed to merge entity {:?}", entity_id))?;
            session
                .merge_mention(&chunk.chunk_id, &entity_id)
                .await
                .with_context(|| format!("Failed to link chunk to entity {:?}", entity_id))?;

            report.entities_merged += 1;
        }

        // Phase B: relationships
        for relation in &extraction.relations {
            let relation_type = match RelationType::normalize(&relation.relation) {
                Ok(relation_type) => relation_type,
                Err(err) => {
                    warn!(chunk_id = %chunk.chunk_id, error = %err, "Rejecting relationship");
                    report.relationships_rejected += 1;
                    continue;
                }
            };
            let source_id = clean_entity_id(&relation.source);
            let target_id = clean_entity_id(&relation.target);

            let linked = session
                .merge_relationship(&source_id, &relation_type, &target_id)
                .await
                .with_context(|| {
                    format!("Failed to merge {} {} {}", source_id, relation_type, target_id)
                })?;

            if linked {
                report.relationships_linked += 1;
            } else {
                debug!(
                    chunk_id = %chunk.chunk_id,
                    source = %source_id,
                    relation = %relation_type,
                    target = %target_id,
                    "Relationship endpoint missing, nothing linked"
                );
                report.relationships_skipped += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::store::{DocumentRecord, GraphSession};
    use chrono::Utc;
    use extract::{Entity, Relation};

    async fn setup() -> (MemoryStore, Chunk) {
        let store = MemoryStore::new();
        store
            .upsert_document(&DocumentRecord {
                id: "doc".to_string(),
                source: "doc.txt".to_string(),
                created: Utc::now(),
            })
            .await
            .unwrap();
        let chunk = Chunk::new("doc".to_string(), 0, "Alice works for Acme.".to_string());
        (store, chunk)
    }

    #[tokio::test]
    async fn test_same_entity_twice_keeps_latest_type() {
        let (store, chunk) = setup().await;
        let merger = GraphMerger::new();

        let first = ExtractionResult {
            entities: vec![Entity::new("Alice", "Person")],
            relations: vec![],
        };
        let second = ExtractionResult {
            entities: vec![Entity::new(" \"Alice\" ", "Author")],
            relations: vec![],
        };
        merger.merge_chunk(&store, &chunk, &first).await.unwrap();
        merger.merge_chunk(&store, &chunk, &second).await.unwrap();

        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.entity("Alice").unwrap().entity_type, "Author");
        assert_eq!(store.mentions(&chunk.chunk_id), vec!["Alice"]);
    }

    #[tokio::test]
    async fn test_repeated_triple_creates_one_edge() {
        let (store, chunk) = setup().await;
        let merger = GraphMerger::new();
        let extraction = ExtractionResult {
            entities: vec![Entity::new("Alice", "Person"), Entity::new("Acme", "Organization")],
            relations: vec![
                Relation::new("Alice", "works for", "Acme"),
                Relation::new("Alice", "WORKS_FOR", "Acme"),
            ],
        };

        for _ in 0..3 {
            merger.merge_chunk(&store, &chunk, &extraction).await.unwrap();
        }

        assert_eq!(
            store.relationships(),
            vec![("Alice".to_string(), "WORKS_FOR".to_string(), "Acme".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_silent_noop() {
        let (store, chunk) = setup().await;
        let extraction = ExtractionResult {
            entities: vec![Entity::new("Alice", "Person")],
            relations: vec![Relation::new("Alice", "works for", "Globex")],
        };

        let report = GraphMerger::new()
            .merge_chunk(&store, &chunk, &extraction)
            .await
            .unwrap();

        assert_eq!(report.entities_merged, 1);
        assert_eq!(report.relationships_linked, 0);
        assert_eq!(report.relationships_skipped, 1);
        assert!(store.relationships().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_relation_type_is_rejected() {
        let (store, chunk) = setup().await;
        let extraction = ExtractionResult {
            entities: vec![Entity::new("Alice", "Person"), Entity::new("Acme", "Organization")],
            relations: vec![Relation::new("Alice", "KNOWS]->(x) DELETE x //", "Acme")],
        };

        let report = GraphMerger::new()
            .merge_chunk(&store, &chunk, &extraction)
            .await
            .unwrap();

        assert_eq!(report.relationships_rejected, 1);
        assert!(store.relationships().is_empty());
    }

    #[tokio::test]
    async fn test_empty_entity_ids_are_skipped() {
        let (store, chunk) = setup().await;
        let extraction = ExtractionResult {
            entities: vec![Entity::new("  ", "Person"), Entity::new("Acme", "")],
            relations: vec![],
        };

        let report = GraphMerger::new()
            .merge_chunk(&store, &chunk, &extraction)
            .await
            .unwrap();

        assert_eq!(report.entities_merged, 1);
        assert_eq!(store.entity("Acme").unwrap().entity_type, extract::DEFAULT_ENTITY_TYPE);
    }
}
