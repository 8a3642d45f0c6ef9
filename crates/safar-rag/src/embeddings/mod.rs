//! Text embedding seam and the ONNX-backed implementation.

pub mod indexer;
pub mod onnx;

pub use onnx::OnnxEncoder;

use anyhow::Result;

/// Sentence encoder contract. `encode("")` returns an empty vector so
/// callers can short-circuit instead of searching with a garbage query.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Embedding vector dimension.
    fn dimension(&self) -> usize;
}

/// Encoder used when embedding retrieval is disabled: every encode yields
/// an empty vector, which the retriever treats as "nothing to search".
pub struct NullEncoder;

impl TextEncoder for NullEncoder {
    fn encode(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }

    fn dimension(&self) -> usize {
        0
    }
}
