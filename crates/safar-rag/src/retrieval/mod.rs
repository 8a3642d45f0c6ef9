//! Hybrid retrieval: structured graph queries plus vector similarity,
//! merged into one deterministic context document.

pub mod baseline;
pub mod context;
pub mod embedding;
pub mod pipeline;
pub mod templates;

pub use baseline::BaselineRetriever;
pub use context::{ContextBuilder, EMPTY_SENTINEL};
pub use embedding::EmbeddingRetriever;
pub use pipeline::{merge_results, RetrievalPipeline};
