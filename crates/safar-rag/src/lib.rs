//! Query understanding and hybrid retrieval for a travel knowledge graph.
//!
//! The engine classifies a natural-language travel question, extracts
//! structured entities (locations, hotels, rating constraints, traveller
//! profile), runs structured graph queries and vector similarity in
//! parallel, and merges everything into one deterministic context document
//! suitable for grounded answer generation.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod gazetteer;
pub mod graph;
pub mod intent;
pub mod llm;
pub mod parse;
pub mod retrieval;
pub mod similarity;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

pub use config::EngineConfig;
pub use error::EngineError;
pub use types::{
    ExtractedEntities, Intent, IntentResult, RatingFilter, RetrievalResult, RetrievedItem,
};

use embeddings::{OnnxEncoder, TextEncoder};
use extract::hotels::HotelMatcher;
use extract::EntityExtractor;
use gazetteer::Gazetteer;
use graph::{GraphQuery, HttpGraphClient};
use intent::IntentRouter;
use llm::{HfClient, LlmClient};
use parse::HeuristicParser;
use retrieval::{BaselineRetriever, ContextBuilder, EmbeddingRetriever, RetrievalPipeline};

const HOTEL_NAMES_QUERY: &str = "MATCH (h:Hotel) RETURN h.name AS name";

/// Long-lived engine owning all pipeline components.
pub struct Engine {
    pipeline: RetrievalPipeline,
    llm: Option<Arc<dyn LlmClient>>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Connect to the graph, load the hotel gazetteer, and wire up every
    /// component per the config. The encoder is only loaded when embedding
    /// retrieval is enabled; the LLM client only when a fallback or
    /// extraction feature wants it.
    pub async fn build(config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(EngineError::Config)
            .context("Invalid engine configuration")?;

        let graph: Arc<dyn GraphQuery> = Arc::new(
            HttpGraphClient::new(&config.graph)
                .map_err(|e| EngineError::Graph(e.to_string()))
                .context("Failed to create graph client")?,
        );

        let llm: Option<Arc<dyn LlmClient>> = if config.features.use_llm_extraction
            || config.features.use_llm_intent_fallback
        {
            match HfClient::new(&config.llm) {
                Ok(client) => Some(Arc::new(client)),
                Err(err) => {
                    tracing::warn!(error = %err, "LLM client unavailable, rule paths only");
                    None
                }
            }
        } else {
            None
        };

        let hotel_names = Self::load_hotel_names(graph.as_ref()).await;
        tracing::info!(hotels = hotel_names.len(), "Loaded hotel gazetteer");

        let gazetteer = Arc::new(Gazetteer::builtin(config.retrieval.fuzzy_city_cutoff));
        let hotel_matcher = HotelMatcher::new(hotel_names, config.retrieval.fuzzy_hotel_cutoff);
        let extractor = EntityExtractor::new(
            Box::new(HeuristicParser::new()),
            gazetteer,
            hotel_matcher,
            llm.clone(),
        );

        let router = IntentRouter::new(
            &config.classifier,
            llm.clone(),
            config.features.use_llm_intent_fallback,
        );

        let encoder: Arc<dyn TextEncoder> = if config.features.use_embeddings {
            Arc::new(
                OnnxEncoder::new(&config.encoder)
                    .map_err(|e| EngineError::Encoder(e.to_string()))
                    .context("Failed to load sentence encoder")?,
            )
        } else {
            Arc::new(embeddings::NullEncoder)
        };

        let baseline = BaselineRetriever::new(graph.clone());
        let embedding = EmbeddingRetriever::new(
            graph,
            encoder,
            config.graph.hotel_vector_index.clone(),
            config.retrieval.overfetch_factor,
        );
        let context = ContextBuilder::new(
            config.retrieval.max_review_snippets,
            config.retrieval.snippet_max_len,
        );

        let pipeline = RetrievalPipeline::new(router, extractor, baseline, embedding, context);

        Ok(Self {
            pipeline,
            llm,
            config,
        })
    }

    async fn load_hotel_names(graph: &dyn GraphQuery) -> Vec<String> {
        graph
            .run(HOTEL_NAMES_QUERY, json!({}))
            .await
            .iter()
            .filter_map(|record| record.get("name").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect()
    }

    /// Full retrieval pass with the configured feature flags. Never errors.
    pub async fn retrieve(&self, query: &str) -> RetrievalResult {
        self.pipeline
            .safe_retrieve(
                query,
                self.config.retrieval.default_limit,
                self.config.features.use_embeddings,
                self.config.features.use_baseline,
                self.config.features.use_llm_extraction,
            )
            .await
    }

    /// Retrieve and then answer from the context document. Requires the
    /// LLM client to be configured.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| EngineError::Llm("No LLM client configured".to_string()))?;

        let result = self.retrieve(query).await;
        llm::answerer::answer_with_context(llm, query, &result.context_text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_surfaces_typed_encoder_error() {
        let mut config = EngineConfig::default();
        config.features.use_embeddings = true;
        config.features.use_llm_extraction = false;
        config.features.use_llm_intent_fallback = false;
        config.encoder.model_dir = std::path::PathBuf::from("/definitely/not/a/model/dir");

        let err = Engine::build(config).await.expect_err("missing model must fail");
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Encoder(_))
        ));
    }
}
