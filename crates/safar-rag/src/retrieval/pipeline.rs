//! Retrieval orchestration.
//!
//! `safe_retrieve` drives the whole classify -> extract -> retrieve -> merge
//! pass and never raises: every failure inside the pipeline degrades to
//! fewer results, and an unexpected error at the outer boundary becomes a
//! result whose context text carries the error message. The two retrievers
//! are independent and run concurrently.

use std::collections::HashSet;

use crate::extract::EntityExtractor;
use crate::intent::IntentRouter;
use crate::types::{
    CombinedResults, HotelRecord, RetrievalResult, RetrievalSource, RetrievedItem,
};

use super::baseline::BaselineRetriever;
use super::context::ContextBuilder;
use super::embedding::EmbeddingRetriever;

pub struct RetrievalPipeline {
    router: IntentRouter,
    extractor: EntityExtractor,
    baseline: BaselineRetriever,
    embedding: EmbeddingRetriever,
    context: ContextBuilder,
}

impl RetrievalPipeline {
    pub fn new(
        router: IntentRouter,
        extractor: EntityExtractor,
        baseline: BaselineRetriever,
        embedding: EmbeddingRetriever,
        context: ContextBuilder,
    ) -> Self {
        Self {
            router,
            extractor,
            baseline,
            embedding,
            context,
        }
    }

    /// Full retrieval pass. Never errors: component failures inside
    /// `retrieve` degrade to fewer results, and anything that still
    /// surfaces as an error becomes a result whose context text carries
    /// the message.
    pub async fn safe_retrieve(
        &self,
        query_text: &str,
        limit: usize,
        use_embeddings: bool,
        use_baseline: bool,
        use_llm: bool,
    ) -> RetrievalResult {
        match self
            .retrieve(query_text, limit, use_embeddings, use_baseline, use_llm)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "Retrieval pass failed");
                Self::error_result(&err.to_string())
            }
        }
    }

    /// Fallible inner pass. Callers that cannot handle a total failure
    /// themselves should go through `safe_retrieve`.
    pub async fn retrieve(
        &self,
        query_text: &str,
        limit: usize,
        use_embeddings: bool,
        use_baseline: bool,
        use_llm: bool,
    ) -> anyhow::Result<RetrievalResult> {
        let query_text = query_text.trim();
        if query_text.is_empty() {
            anyhow::bail!("empty query text");
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let intent_result = self.router.classify(query_text).await;
        let intent = intent_result.intent;
        tracing::info!(
            request_id = %request_id,
            intent = intent.label(),
            fallback = intent_result.fallback_used,
            "Classified query"
        );

        let entities = self.extractor.extract(query_text, use_llm).await;

        let baseline_fut = async {
            if use_baseline {
                self.baseline.retrieve(intent, &entities, limit).await
            } else {
                (Vec::new(), String::new())
            }
        };
        let embedding_fut = async {
            if use_embeddings {
                self.embedding
                    .retrieve(query_text, &entities, limit, intent)
                    .await
            } else {
                Vec::new()
            }
        };
        let ((baseline_items, query_trace), embedding_items) =
            tokio::join!(baseline_fut, embedding_fut);

        let mut combined = merge_results(&baseline_items, &embedding_items);
        self.baseline
            .attach_snippets(&mut combined.hotels, self.context.max_snippets())
            .await;
        let context_text = self.context.build(&combined);

        tracing::info!(
            request_id = %request_id,
            baseline = baseline_items.len(),
            embeddings = embedding_items.len(),
            merged_hotels = combined.hotels.len(),
            visa_facts = combined.visa_info.len(),
            "Retrieval complete"
        );

        Ok(RetrievalResult {
            request_id,
            intent: Some(intent_result),
            entities: Some(entities),
            baseline: baseline_items,
            embeddings: embedding_items,
            combined,
            context_text,
            query_trace,
        })
    }

    /// Annotated empty result for failures at the outer boundary.
    pub fn error_result(message: &str) -> RetrievalResult {
        RetrievalResult {
            request_id: uuid::Uuid::new_v4().to_string(),
            intent: None,
            entities: None,
            baseline: Vec::new(),
            embeddings: Vec::new(),
            combined: CombinedResults::default(),
            context_text: format!("[Retrieval Error: {message}]"),
            query_trace: String::new(),
        }
    }
}

/// Merge both retrievers' output. Baseline items go first so exact
/// structured hits win the dedup; the identity key makes repeated merges
/// idempotent.
pub fn merge_results(
    baseline: &[RetrievedItem],
    embedding: &[RetrievedItem],
) -> CombinedResults {
    let mut combined = CombinedResults::default();
    let mut seen = HashSet::new();
    merge_into(&mut combined, &mut seen, baseline);
    merge_into(&mut combined, &mut seen, embedding);
    combined
}

/// Fold one item list into an accumulator. Exposed separately so sequential
/// merging behaves identically to a single combined merge.
pub fn merge_into(
    combined: &mut CombinedResults,
    seen: &mut HashSet<String>,
    items: &[RetrievedItem],
) {
    for item in items {
        match item {
            RetrievedItem::Visa(fact) => {
                if !combined.visa_info.contains(fact) {
                    combined.visa_info.push(fact.clone());
                }
            }
            RetrievedItem::Hotel(hotel) => match hotel.identity_key() {
                Some(key) => {
                    if seen.insert(key) {
                        combined.hotels.push(hotel.clone());
                    }
                }
                None => combined.others.push(hotel_as_map(hotel)),
            },
            RetrievedItem::Other(map) => {
                // Legacy rows sometimes carry a hotel under aliased field
                // names; normalize those rather than losing them.
                match hotel_from_map(map) {
                    Some(hotel) => match hotel.identity_key() {
                        Some(key) => {
                            if seen.insert(key) {
                                combined.hotels.push(hotel);
                            }
                        }
                        None => combined.others.push(map.clone()),
                    },
                    None => combined.others.push(map.clone()),
                }
            }
        }
    }
}

fn hotel_as_map(hotel: &HotelRecord) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::to_value(hotel) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// Lift an opaque record into the hotel shape when it carries a
/// recognizable name, mapping the `hotel_name`/`avg_score` legacy aliases.
fn hotel_from_map(map: &serde_json::Map<String, serde_json::Value>) -> Option<HotelRecord> {
    let name = map
        .get("name")
        .or_else(|| map.get("hotel_name"))?
        .as_str()?
        .to_string();
    Some(HotelRecord {
        hotel_id: map
            .get("hotel_id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        name,
        city: map.get("city").and_then(|v| v.as_str()).map(str::to_string),
        country: map
            .get("country")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        star_rating: map
            .get("stars")
            .or_else(|| map.get("star_rating"))
            .and_then(|v| v.as_f64()),
        average_score: map
            .get("avg_score")
            .or_else(|| map.get("average_score"))
            .or_else(|| map.get("average_reviews_score"))
            .and_then(|v| v.as_f64()),
        category_scores: Default::default(),
        review_snippets: Vec::new(),
        source: RetrievalSource::Baseline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::embeddings::NullEncoder;
    use crate::extract::hotels::HotelMatcher;
    use crate::gazetteer::Gazetteer;
    use crate::graph::{GraphQuery, Record};
    use crate::parse::HeuristicParser;
    use crate::retrieval::context::EMPTY_SENTINEL;
    use crate::types::{Intent, VisaFact};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct EmptyGraph;

    #[async_trait]
    impl GraphQuery for EmptyGraph {
        async fn run(&self, _query: &str, _params: serde_json::Value) -> Vec<Record> {
            Vec::new()
        }
    }

    fn pipeline() -> RetrievalPipeline {
        let graph: Arc<dyn GraphQuery> = Arc::new(EmptyGraph);
        let extractor = EntityExtractor::new(
            Box::new(HeuristicParser::new()),
            Arc::new(Gazetteer::builtin(0.9)),
            HotelMatcher::new(Vec::new(), 0.7),
            None,
        );
        let router = IntentRouter::new(
            &ClassifierConfig { min_score_to_accept: 1.0, margin_ratio: 1.25 },
            None,
            false,
        );
        let baseline = BaselineRetriever::new(graph.clone());
        let embedding =
            EmbeddingRetriever::new(graph, Arc::new(NullEncoder), "hotel_idx".into(), 5);
        RetrievalPipeline::new(router, extractor, baseline, embedding, ContextBuilder::new(2, 200))
    }

    fn hotel(id: &str, name: &str, source: RetrievalSource) -> RetrievedItem {
        RetrievedItem::Hotel(HotelRecord {
            hotel_id: Some(id.to_string()),
            name: name.to_string(),
            city: None,
            country: None,
            star_rating: None,
            average_score: None,
            category_scores: BTreeMap::new(),
            review_snippets: Vec::new(),
            source,
        })
    }

    fn keys(combined: &CombinedResults) -> Vec<String> {
        combined
            .hotels
            .iter()
            .filter_map(|h| h.identity_key())
            .collect()
    }

    #[test]
    fn test_baseline_wins_dedup() {
        let baseline = vec![hotel("h1", "Nile Plaza", RetrievalSource::Baseline)];
        let embedding = vec![hotel("h1", "Nile Plaza", RetrievalSource::Embedding)];
        let combined = merge_results(&baseline, &embedding);
        assert_eq!(combined.hotels.len(), 1);
        assert_eq!(combined.hotels[0].source, RetrievalSource::Baseline);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let baseline = vec![
            hotel("h1", "Nile Plaza", RetrievalSource::Baseline),
            hotel("h2", "Grand Cairo", RetrievalSource::Baseline),
        ];
        let embedding = vec![
            hotel("h2", "Grand Cairo", RetrievalSource::Embedding),
            hotel("h3", "Hotel Sacher", RetrievalSource::Embedding),
        ];

        let once = merge_results(&baseline, &embedding);

        // Merging the merged set again changes nothing.
        let again_items: Vec<RetrievedItem> = once
            .hotels
            .iter()
            .cloned()
            .map(RetrievedItem::Hotel)
            .collect();
        let twice = merge_results(&again_items, &[]);
        assert_eq!(keys(&once), keys(&twice));

        // Sequential accumulation equals the single-shot merge.
        let mut sequential = CombinedResults::default();
        let mut seen = HashSet::new();
        merge_into(&mut sequential, &mut seen, &baseline);
        merge_into(&mut sequential, &mut seen, &embedding);
        assert_eq!(keys(&once), keys(&sequential));
    }

    #[test]
    fn test_name_key_when_id_missing() {
        let mut a = hotel("x", "Nile Plaza", RetrievalSource::Baseline);
        if let RetrievedItem::Hotel(h) = &mut a {
            h.hotel_id = None;
        }
        let mut b = hotel("x", "  nile plaza ", RetrievalSource::Embedding);
        if let RetrievedItem::Hotel(h) = &mut b {
            h.hotel_id = None;
        }
        let combined = merge_results(&[a], &[b]);
        assert_eq!(combined.hotels.len(), 1);
    }

    #[test]
    fn test_visa_facts_routed_and_deduped() {
        let fact = VisaFact {
            origin_country: "Egypt".into(),
            destination_country: "Germany".into(),
            visa_type: "Schengen".into(),
        };
        let combined = merge_results(
            &[RetrievedItem::Visa(fact.clone())],
            &[RetrievedItem::Visa(fact)],
        );
        assert_eq!(combined.visa_info.len(), 1);
        assert!(combined.hotels.is_empty());
    }

    #[test]
    fn test_legacy_alias_record_lifted_to_hotel() {
        let legacy = json!({"hotel_name": "Old Palace", "avg_score": 7.5});
        let combined = merge_results(
            &[RetrievedItem::Other(legacy.as_object().unwrap().clone())],
            &[],
        );
        assert_eq!(combined.hotels.len(), 1);
        assert_eq!(combined.hotels[0].name, "Old Palace");
        assert_eq!(combined.hotels[0].average_score, Some(7.5));
        assert!(combined.others.is_empty());
    }

    #[test]
    fn test_unidentifiable_record_lands_in_others() {
        let opaque = json!({"some_field": 42});
        let combined = merge_results(
            &[RetrievedItem::Other(opaque.as_object().unwrap().clone())],
            &[],
        );
        assert!(combined.hotels.is_empty());
        assert_eq!(combined.others.len(), 1);
    }

    #[tokio::test]
    async fn test_safe_retrieve_empty_store_yields_sentinel() {
        let result = pipeline()
            .safe_retrieve("find hotels in Egypt", 5, true, true, false)
            .await;
        assert_eq!(result.context_text, EMPTY_SENTINEL);
        assert!(!result.request_id.is_empty());
        assert_eq!(result.intent.map(|i| i.intent), Some(Intent::HotelSearch));
    }

    #[tokio::test]
    async fn test_safe_retrieve_blank_query_annotates_error() {
        let result = pipeline().safe_retrieve("   ", 5, true, true, false).await;
        assert_eq!(result.context_text, "[Retrieval Error: empty query text]");
        assert!(result.intent.is_none());
        assert!(result.combined.is_empty());
    }

    #[test]
    fn test_error_result_annotates_context() {
        let result = RetrievalPipeline::error_result("backend unreachable");
        assert_eq!(result.context_text, "[Retrieval Error: backend unreachable]");
        assert!(result.combined.is_empty());
    }
}
