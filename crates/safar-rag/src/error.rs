use thiserror::Error;

/// Typed failures for callers that need to discriminate between backends.
/// The orchestrator itself never surfaces these; `safe_retrieve` converts
/// everything into an annotated result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("graph query failed: {0}")]
    Graph(String),

    #[error("embedding encode failed: {0}")]
    Encoder(String),

    #[error("llm call failed: {0}")]
    Llm(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
