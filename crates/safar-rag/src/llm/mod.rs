//! LLM client seam. The engine only ever needs plain prompt-in/text-out
//! generation; structured extraction and label classification are prompt
//! conventions layered on top (see `prompts`).

pub mod answerer;
pub mod hf;
pub mod prompts;

pub use hf::HfClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
            top_p: 0.9,
        }
    }
}

impl GenerationConfig {
    /// Deterministic settings for classification and extraction prompts.
    pub fn deterministic(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            temperature: 0.0,
            top_p: 1.0,
        }
    }
}

/// One completed generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub latency: Duration,
}

/// Text-generation provider. Implementations must enforce their own hard
/// timeout so callers can treat a hang like any other error.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Generation>;
}
