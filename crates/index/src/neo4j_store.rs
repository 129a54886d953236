use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{Graph, Query};
use std::fmt;
use tracing::info;

use extract::{RelationType, DEFAULT_ENTITY_TYPE};
use ingest::Chunk;

use crate::store::{
    DocumentRecord, GraphSession, GraphStats, GraphStore, GraphTriple, StoredChunk,
};

#[derive(Clone)]
pub struct StoreConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Neo4j backend. Every session gets its own connection pool, dropped with it.
pub struct Neo4jStore {
    config: StoreConfig,
}

impl Neo4jStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn open(&self) -> Result<Box<dyn GraphSession>> {
        let graph = Graph::new(
            &self.config.uri,
            &self.config.username,
            &self.config.password,
        )
        .await
        .with_context(|| format!("Failed to connect to Neo4j at {}", self.config.uri))?;

        Ok(Box::new(Neo4jSession { graph }))
    }
}

// Cypher LIMIT takes a signed integer
fn cypher_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

pub struct Neo4jSession {
    graph: Graph,
}

impl Neo4jSession {
    async fn count(&self, cypher: &str) -> Result<usize> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;
        let count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(count)
    }
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn ensure_schema(&self) -> Result<()> {
        let constraints = [
            ("document_id_unique", "Document"),
            ("chunk_id_unique", "Chunk"),
            ("entity_id_unique", "Entity"),
        ];

        for (name, label) in constraints {
            let query = Query::new(format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.id IS UNIQUE",
                name, label
            ));
            self.graph.run(query).await
                .with_context(|| format!("Failed to create constraint on {}.id", label))?;
        }

        info!("Neo4j constraints ensured");
        Ok(())
    }

    async fn document_exists(&self, doc_id: &str) -> Result<bool> {
        let query = Query::new(
            "MATCH (d:Document {id: $id}) RETURN count(d) > 0 AS exists".to_string()
        )
        .param("id", doc_id.to_string());

        let mut result = self.graph.execute(query).await
            .context("Failed to check document existence")?;
        let exists = match result.next().await? {
            Some(row) => row.get::<bool>("exists")?,
            None => false,
        };
        Ok(exists)
    }

    async fn upsert_document(&self, document: &DocumentRecord) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (d:Document {id: $id})
            SET d.source = $source,
                d.created = datetime($created)
            "#.to_string()
        )
        .param("id", document.id.clone())
        .param("source", document.source.clone())
        .param("created", document.created.to_rfc3339());

        self.graph.run(query).await
            .context("Failed to upsert document")?;
        Ok(())
    }

    async fn merge_chunk(&self, chunk: &Chunk) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (d:Document {id: $doc_id})
            MERGE (c:Chunk {id: $chunk_id})
            SET c.text = $text, c.index = $index
            MERGE (d)-[:HAS_CHUNK]->(c)
            "#.to_string()
        )
        .param("doc_id", chunk.doc_id.clone())
        .param("chunk_id", chunk.chunk_id.clone())
        .param("text", chunk.text.clone())
        .param("index", chunk.index as i64);

        self.graph.run(query).await
            .context("Failed to merge chunk")?;
        Ok(())
    }

    async fn merge_entity(&self, entity_id: &str, entity_type: &str) -> Result<()> {
        let query = Query::new(
            r#"
            MERGE (e:Entity {id: $id})
            SET e.type = $type,
                e.tags = CASE
                    WHEN $type IN coalesce(e.tags, []) THEN e.tags
                    ELSE coalesce(e.tags, []) + $type
                END
            "#.to_string()
        )
        .param("id", entity_id.to_string())
        .param("type", entity_type.to_string());

        self.graph.run(query).await
            .context("Failed to merge entity")?;
        Ok(())
    }

    async fn merge_mention(&self, chunk_id: &str, entity_id: &str) -> Result<()> {
        let query = Query::new(
            r#"
            MATCH (c:Chunk {id: $chunk_id}), (e:Entity {id: $entity_id})
            MERGE (c)-[:MENTIONS]->(e)
            "#.to_string()
        )
        .param("chunk_id", chunk_id.to_string())
        .param("entity_id", entity_id.to_string());

        self.graph.run(query).await
            .context("Failed to merge mention")?;
        Ok(())
    }

    async fn merge_relationship(
        &self,
        source_id: &str,
        relation: &RelationType,
        target_id: &str,
    ) -> Result<bool> {
        // Relationship types cannot be parameters; RelationType only holds [A-Za-z0-9_]
        let query = Query::new(format!(
            r#"
            MATCH (a:Entity {{id: $source_id}})
            MATCH (b:Entity {{id: $target_id}})
            MERGE (a)-[r:`{}`]->(b)
            RETURN count(r) AS linked
            "#,
            relation.as_str()
        ))
        .param("source_id", source_id.to_string())
        .param("target_id", target_id.to_string());

        let mut result = self.graph.execute(query).await
            .context("Failed to merge relationship")?;
        let linked = match result.next().await? {
            Some(row) => row.get::<i64>("linked").unwrap_or(0),
            None => 0,
        };
        Ok(linked > 0)
    }

    async fn leading_chunks(&self, doc_id: &str, limit: usize) -> Result<Vec<StoredChunk>> {
        let query = Query::new(
            r#"
            MATCH (d:Document {id: $doc_id})-[:HAS_CHUNK]->(c:Chunk)
            RETURN c.id AS id, c.index AS index, c.text AS text
            ORDER BY c.index ASC
            LIMIT $limit
            "#.to_string()
        )
        .param("doc_id", doc_id.to_string())
        .param("limit", cypher_limit(limit));

        let mut result = self.graph.execute(query).await
            .context("Failed to fetch chunks")?;

        let mut chunks = Vec::new();
        while let Some(row) = result.next().await? {
            chunks.push(StoredChunk {
                id: row.get("id")?,
                index: row.get::<i64>("index")? as usize,
                text: row.get("text")?,
            });
        }

        Ok(chunks)
    }

    async fn document_triples(&self, doc_id: &str, limit: usize) -> Result<Vec<GraphTriple>> {
        let query = Query::new(
            r#"
            MATCH (d:Document {id: $doc_id})-[:HAS_CHUNK]->(:Chunk)-[:MENTIONS]->(e:Entity)
            MATCH (e)-[r]-(:Entity)
            WHERE NOT type(r) IN ['HAS_CHUNK', 'HAS_DOCUMENT', 'MENTIONS']
            WITH DISTINCT startNode(r) AS a, type(r) AS relation, endNode(r) AS b
            RETURN a.id AS source,
                   relation,
                   b.id AS target,
                   coalesce(a.type, $default_type) AS source_type,
                   coalesce(b.type, $default_type) AS target_type
            ORDER BY source, relation, target
            LIMIT $limit
            "#.to_string()
        )
        .param("doc_id", doc_id.to_string())
        .param("default_type", DEFAULT_ENTITY_TYPE.to_string())
        .param("limit", cypher_limit(limit));

        let mut result = self.graph.execute(query).await
            .context("Failed to fetch graph context")?;

        let mut triples = Vec::new();
        while let Some(row) = result.next().await? {
            triples.push(GraphTriple {
                source: row.get("source")?,
                relation: row.get("relation")?,
                target: row.get("target")?,
                source_type: row.get("source_type")?,
                target_type: row.get("target_type")?,
            });
        }

        Ok(triples)
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        let query = Query::new(
            "MATCH (d:Document) RETURN d.id AS id ORDER BY d.created DESC".to_string()
        );

        let mut result = self.graph.execute(query).await
            .context("Failed to list documents")?;

        let mut ids = Vec::new();
        while let Some(row) = result.next().await? {
            ids.push(row.get::<String>("id")?);
        }
        Ok(ids)
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            documents: self.count("MATCH (d:Document) RETURN count(d) AS count").await?,
            chunks: self.count("MATCH (c:Chunk) RETURN count(c) AS count").await?,
            entities: self.count("MATCH (e:Entity) RETURN count(e) AS count").await?,
            relationships: self
                .count("MATCH (:Entity)-[r]->(:Entity) RETURN count(r) AS count")
                .await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_hides_password() {
        let config = StoreConfig {
            uri: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("bolt://localhost:7687"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_unbounded_limit_fits_cypher() {
        assert_eq!(cypher_limit(5), 5);
        assert_eq!(cypher_limit(usize::MAX), i64::MAX);
    }
}
