use anyhow::Result;
use serde::Serialize;

use index::{GraphSession, GraphTriple, StoredChunk};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Leading chunks of the document used as text context
    pub max_chunks: usize,
    /// Distinct relationship triples used as graph context
    pub max_triples: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_chunks: 5,
            max_triples: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    pub chunks: Vec<StoredChunk>,
    pub triples: Vec<GraphTriple>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    Found(Context),
    /// Neither chunks nor relationships exist for the document
    NoData,
}

impl Context {
    pub fn text_section(&self) -> String {
        if self.chunks.is_empty() {
            return String::new();
        }

        let mut section = String::from("### TEXT CONTENT ###\n");
        for chunk in &self.chunks {
            section.push_str(&chunk.text);
            section.push_str("\n---\n");
        }
        section
    }

    pub fn graph_section(&self) -> String {
        if self.triples.is_empty() {
            return String::new();
        }

        let mut section = String::from("### KNOWLEDGE GRAPH (Key Entities & Relationships) ###\n");
        for triple in &self.triples {
            section.push_str(&format!(
                "({}:{}) -[:{}]-> ({}:{})\n",
                triple.source, triple.source_type, triple.relation, triple.target, triple.target_type
            ));
        }
        section
    }

    /// Both sections as they appear in the prompt.
    pub fn render(&self) -> String {
        let text = self.text_section();
        let graph = self.graph_section();
        match (text.is_empty(), graph.is_empty()) {
            (false, false) => format!("{}\n{}", text, graph),
            (false, true) => text,
            (true, _) => graph,
        }
    }
}

/// Leading-chunks text context plus the document's relationship triples.
pub struct ContextAssembler {
    config: RetrievalConfig,
}

impl ContextAssembler {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub async fn assemble(&self, session: &dyn GraphSession, doc_id: &str) -> Result<Retrieval> {
        let chunks = session.leading_chunks(doc_id, self.config.max_chunks).await?;
        let triples = session.document_triples(doc_id, self.config.max_triples).await?;

        if chunks.is_empty() && triples.is_empty() {
            return Ok(Retrieval::NoData);
        }

        Ok(Retrieval::Found(Context { chunks, triples }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> StoredChunk {
        StoredChunk {
            id: format!("doc_chunk_{}", index),
            index,
            text: text.to_string(),
        }
    }

    fn triple(source: &str, relation: &str, target: &str) -> GraphTriple {
        GraphTriple {
            source: source.to_string(),
            relation: relation.to_string(),
            target: target.to_string(),
            source_type: "Person".to_string(),
            target_type: "Entity".to_string(),
        }
    }

    #[test]
    fn test_render_both_sections() {
        let context = Context {
            chunks: vec![chunk(0, "First."), chunk(1, "Second.")],
            triples: vec![triple("Alice", "WORKS_FOR", "Acme")],
        };

        assert_eq!(
            context.render(),
            "### TEXT CONTENT ###\nFirst.\n---\nSecond.\n---\n\n\
             ### KNOWLEDGE GRAPH (Key Entities & Relationships) ###\n\
             (Alice:Person) -[:WORKS_FOR]-> (Acme:Entity)\n"
        );
    }

    #[test]
    fn test_render_graph_only() {
        let context = Context {
            chunks: vec![],
            triples: vec![triple("Alice", "KNOWS", "Bob")],
        };

        assert!(context.render().starts_with("### KNOWLEDGE GRAPH"));
        assert!(!context.render().contains("TEXT CONTENT"));
    }
}
