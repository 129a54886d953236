use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub index: usize, // 0-based position in split order
    pub text: String,
}

impl Chunk {
    pub fn new(doc_id: String, index: usize, text: String) -> Self {
        let chunk_id = Self::generate_chunk_id(&doc_id, index);

        Self {
            doc_id,
            chunk_id,
            index,
            text,
        }
    }

    /// Chunk ids are scoped by document: `<doc_id>_chunk_<index>`
    pub fn generate_chunk_id(doc_id: &str, index: usize) -> String {
        format!("{}_chunk_{}", doc_id, index)
    }
}
