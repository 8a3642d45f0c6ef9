//! Grounded answer generation over the retrieval context.

use anyhow::Result;
use std::sync::Arc;

use crate::retrieval::EMPTY_SENTINEL;

use super::prompts::grounded_answer_prompt;
use super::{GenerationConfig, LlmClient};

/// Answer a user question strictly from the retrieved context document.
/// If retrieval found nothing, the sentinel is returned directly without
/// calling the model.
pub async fn answer_with_context(
    llm: &Arc<dyn LlmClient>,
    query: &str,
    context_text: &str,
) -> Result<String> {
    if context_text.trim().is_empty() || context_text == EMPTY_SENTINEL {
        return Ok(EMPTY_SENTINEL.to_string());
    }

    let prompt = grounded_answer_prompt(context_text, query);
    let config = GenerationConfig::default();

    let generation = llm.generate(&prompt, &config).await?;
    tracing::info!(
        model = %generation.model,
        latency_ms = generation.latency.as_millis() as u64,
        "Generated grounded answer"
    );
    Ok(generation.text.trim().to_string())
}
