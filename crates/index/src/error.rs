use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a whole ingestion call.
///
/// Extraction and merge failures never show up here; they are recorded per
/// chunk in the ingestion report.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to read source {0:?}: {1:#}")]
    Read(PathBuf, anyhow::Error),

    #[error("Graph store error: {0:#}")]
    Store(anyhow::Error),
}
