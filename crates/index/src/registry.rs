use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::IngestError;
use crate::store::{DocumentRecord, GraphSession};

/// What to do when a document with the same id is already in the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Return the existing id without touching the graph.
    #[default]
    Skip,
    /// Refresh the document metadata and run extraction again.
    Force,
}

/// A source that exists on disk, with its derived identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub doc_id: String,
    pub source: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub doc_id: String,
    pub already_exists: bool,
    /// Whether chunking and extraction should run.
    pub proceed: bool,
}

pub struct DocumentRegistry;

impl DocumentRegistry {
    /// Resolve a path to its document identity. Never touches the store.
    pub fn locate(path: &Path) -> Result<SourceDocument, IngestError> {
        if !path.exists() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }

        Ok(SourceDocument {
            doc_id: ingest::generate_doc_id(path),
            source: ingest::source_name(path),
            path: path.to_path_buf(),
        })
    }

    pub async fn register(
        session: &dyn GraphSession,
        document: &SourceDocument,
        policy: ReingestPolicy,
    ) -> Result<Registration, IngestError> {
        let already_exists = session
            .document_exists(&document.doc_id)
            .await
            .map_err(IngestError::Store)?;

        if already_exists && policy == ReingestPolicy::Skip {
            info!(doc_id = %document.doc_id, "Document already ingested, skipping");
            return Ok(Registration {
                doc_id: document.doc_id.clone(),
                already_exists,
                proceed: false,
            });
        }

        session
            .upsert_document(&DocumentRecord {
                id: document.doc_id.clone(),
                source: document.source.clone(),
                created: Utc::now(),
            })
            .await
            .map_err(IngestError::Store)?;

        Ok(Registration {
            doc_id: document.doc_id.clone(),
            already_exists,
            proceed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;

    #[test]
    fn test_locate_missing_source() {
        let err = DocumentRegistry::locate(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_register_skip_and_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "text").unwrap();

        let store = MemoryStore::new();
        let document = DocumentRegistry::locate(&path).unwrap();

        let first = DocumentRegistry::register(&store, &document, ReingestPolicy::Skip).await.unwrap();
        assert!(!first.already_exists);
        assert!(first.proceed);
        let created = store.document(&document.doc_id).unwrap().created;

        let second = DocumentRegistry::register(&store, &document, ReingestPolicy::Skip).await.unwrap();
        assert!(second.already_exists);
        assert!(!second.proceed);
        assert_eq!(store.document(&document.doc_id).unwrap().created, created);

        let forced = DocumentRegistry::register(&store, &document, ReingestPolicy::Force).await.unwrap();
        assert!(forced.already_exists);
        assert!(forced.proceed);
        assert_eq!(store.document(&document.doc_id).unwrap().source, "paper.txt");
    }
}
