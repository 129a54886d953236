pub mod chunk;
pub mod chunker;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use reader::FileReader;

use sha2::{Digest, Sha256};
use std::path::Path;

/// Generate a stable document ID from the source path.
///
/// The ID is `<file stem>_<6 hex chars of the path hash>`, so the same path
/// always maps to the same document regardless of file content.
pub fn generate_doc_id(path: &Path) -> String {
    let path_str = path.to_string_lossy();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace(' ', "_"))
        .unwrap_or_else(|| "document".to_string());

    let mut hasher = Sha256::new();
    hasher.update(path_str.as_bytes());
    let result = hasher.finalize();
    let digest = hex::encode(&result[..3]);

    format!("{}_{}", stem, digest)
}

/// Display name of a source: its file name, or the whole path as a fallback.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
