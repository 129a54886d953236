pub mod engine;
pub mod llm;
pub mod retrieval;

pub use engine::{build_prompt, Answer, QueryEngine, QueryError, NOT_FOUND_MESSAGE};
pub use llm::{Generator, QueryLLM};
pub use retrieval::{Context, ContextAssembler, Retrieval, RetrievalConfig};
