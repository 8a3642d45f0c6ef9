//! Similarity (embedding) retrieval.
//!
//! Encodes the query and runs a nearest-neighbor search over the hotel
//! vector index. Node-resident constraints (stars, global score) and the
//! location scope are applied inside the vector query as a pre-filter; the
//! per-category review aggregates can only be computed by joining reviews,
//! so those are post-filtered in process against an over-fetched candidate
//! set. Visa intents bypass hotel similarity entirely.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::embeddings::TextEncoder;
use crate::graph::{GraphQuery, Record};
use crate::types::{
    ExtractedEntities, HotelRecord, Intent, RatingFilter, RetrievalSource, RetrievedItem,
};

use super::baseline::VISA_FREE;
use super::templates::{self, selector_for, LocationScope, ScoreSelector};

pub struct EmbeddingRetriever {
    graph: Arc<dyn GraphQuery>,
    encoder: Arc<dyn TextEncoder>,
    index_name: String,
    overfetch_factor: usize,
}

impl EmbeddingRetriever {
    pub fn new(
        graph: Arc<dyn GraphQuery>,
        encoder: Arc<dyn TextEncoder>,
        index_name: String,
        overfetch_factor: usize,
    ) -> Self {
        Self {
            graph,
            encoder,
            index_name,
            overfetch_factor,
        }
    }

    pub async fn retrieve(
        &self,
        query_text: &str,
        entities: &ExtractedEntities,
        top_k: usize,
        intent: Intent,
    ) -> Vec<RetrievedItem> {
        match intent {
            Intent::VisaQuery => return self.visa_facts(entities).await,
            Intent::HotelVisa => {
                let Some(countries) = self.visa_free_countries(entities).await else {
                    return Vec::new();
                };
                if countries.is_empty() {
                    return Vec::new();
                }
                let scope = LocationScope::countries_only(countries);
                return self
                    .similarity_search(query_text, entities, &scope, top_k)
                    .await;
            }
            _ => {}
        }

        let scope = LocationScope::from_entities(&entities.cities, &entities.countries);
        self.similarity_search(query_text, entities, &scope, top_k)
            .await
    }

    async fn similarity_search(
        &self,
        query_text: &str,
        entities: &ExtractedEntities,
        scope: &LocationScope,
        top_k: usize,
    ) -> Vec<RetrievedItem> {
        let embedding = match self.encoder.encode(query_text) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "Query encoding failed, skipping similarity search");
                return Vec::new();
            }
        };
        if embedding.is_empty() {
            return Vec::new();
        }

        let (tail, params) = self.build_tail(entities, scope);
        let fetch_k = top_k.saturating_mul(self.overfetch_factor).max(top_k);
        let records = self
            .graph
            .vector_query(&self.index_name, fetch_k, &embedding, &tail, params)
            .await;

        tracing::debug!(
            candidates = records.len(),
            fetch_k,
            "Vector search returned candidates"
        );

        let mut hotels = normalize_candidates(records);

        if let Some(filter) = &entities.rating_filter {
            if let Some(aggregate_query) = templates::build_category_aggregate(filter.dimension) {
                hotels = self.post_filter(hotels, filter, &aggregate_query).await;
            }
        }

        hotels.truncate(top_k);
        hotels.into_iter().map(RetrievedItem::Hotel).collect()
    }

    /// Cypher tail appended to the vector call: location scoping plus any
    /// node-resident rating pre-filter.
    fn build_tail(&self, entities: &ExtractedEntities, scope: &LocationScope) -> (String, Value) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params = serde_json::Map::new();

        if !scope.cities.is_empty() {
            conditions.push("c.name IN $cities".into());
            params.insert("cities".into(), json!(scope.cities));
        } else if !scope.countries.is_empty() {
            conditions.push("co.name IN $countries".into());
            params.insert("countries".into(), json!(scope.countries));
        }

        if let Some(filter) = &entities.rating_filter {
            if let ScoreSelector::Node(expr) = selector_for(filter.dimension) {
                let expr = expr.replace("h.", "node.");
                match filter.op {
                    crate::types::RatingOp::Between => {
                        conditions
                            .push(format!("{expr} >= $rating_min AND {expr} <= $rating_max"));
                        params.insert("rating_min".into(), json!(filter.value));
                        params
                            .insert("rating_max".into(), json!(filter.max.unwrap_or(filter.value)));
                    }
                    crate::types::RatingOp::Gte => {
                        conditions.push(format!("{expr} >= $rating"));
                        params.insert("rating".into(), json!(filter.value));
                    }
                    crate::types::RatingOp::Lte => {
                        conditions.push(format!("{expr} <= $rating"));
                        params.insert("rating".into(), json!(filter.value));
                    }
                    crate::types::RatingOp::Eq => {
                        conditions.push(format!("{expr} = $rating"));
                        params.insert("rating".into(), json!(filter.value));
                    }
                }
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}\n", conditions.join(" AND "))
        };

        let tail = format!(
            "\nWITH node, score\n\
             MATCH (node)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)\n\
             {where_clause}\
             RETURN node.name AS name, node.hotel_id AS hotel_id, \
             node.star_rating AS stars, node.average_reviews_score AS avg_score, \
             c.name AS city, co.name AS country, score\n\
             ORDER BY score DESC"
        );
        (tail, Value::Object(params))
    }

    /// Drop candidates whose review aggregate misses the filter.
    async fn post_filter(
        &self,
        hotels: Vec<HotelRecord>,
        filter: &RatingFilter,
        aggregate_query: &str,
    ) -> Vec<HotelRecord> {
        let hotel_ids: Vec<&str> = hotels
            .iter()
            .filter_map(|h| h.hotel_id.as_deref())
            .collect();
        if hotel_ids.is_empty() {
            return hotels;
        }

        let records = self
            .graph
            .run(aggregate_query, json!({"hotel_ids": hotel_ids}))
            .await;
        let scores: HashMap<String, f64> = records
            .iter()
            .filter_map(|r| {
                let id = r.get("hotel_id")?.as_str()?;
                let score = r.get("category_score")?.as_f64()?;
                Some((id.to_string(), score))
            })
            .collect();

        let dimension_key = format!("{:?}", filter.dimension).to_lowercase();
        hotels
            .into_iter()
            .filter_map(|mut hotel| {
                let id = hotel.hotel_id.as_deref()?;
                let score = *scores.get(id)?;
                if !filter.accepts(score) {
                    return None;
                }
                hotel.category_scores.insert(dimension_key.clone(), score);
                Some(hotel)
            })
            .collect()
    }

    /// Direct or enumerated visa facts; mirrors the baseline semantics so
    /// either retriever alone can answer a visa query.
    async fn visa_facts(&self, entities: &ExtractedEntities) -> Vec<RetrievedItem> {
        let origins = &entities.origin_country;
        let destinations = &entities.destination_country;
        match (origins.first(), destinations.first()) {
            (Some(origin), Some(destination)) => {
                let records = self
                    .graph
                    .run(templates::VISA_PAIR, json!({"from": origin, "to": destination}))
                    .await;
                records
                    .into_iter()
                    .map(|record| {
                        let visa_type = record
                            .get("visa_type")
                            .and_then(Value::as_str)
                            .unwrap_or(VISA_FREE)
                            .to_string();
                        RetrievedItem::Visa(crate::types::VisaFact {
                            origin_country: origin.clone(),
                            destination_country: destination.clone(),
                            visa_type,
                        })
                    })
                    .collect()
            }
            (Some(origin), None) => {
                let records = self
                    .graph
                    .run(templates::VISA_ENUMERATION, json!({"from": origin}))
                    .await;
                records
                    .into_iter()
                    .filter_map(|record| {
                        let destination =
                            record.get("destination").and_then(Value::as_str)?.to_string();
                        let visa_type = record
                            .get("visa_type")
                            .and_then(Value::as_str)
                            .unwrap_or(VISA_FREE)
                            .to_string();
                        Some(RetrievedItem::Visa(crate::types::VisaFact {
                            origin_country: origin.clone(),
                            destination_country: destination,
                            visa_type,
                        }))
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    async fn visa_free_countries(&self, entities: &ExtractedEntities) -> Option<Vec<String>> {
        let origin = entities
            .origin_country
            .first()
            .or_else(|| entities.countries.first())?;
        let records = self
            .graph
            .run(templates::VISA_FREE_DESTINATIONS, json!({"from": origin}))
            .await;
        Some(
            records
                .iter()
                .filter_map(|r| r.get("destination").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Flatten candidate rows into hotel records, tagging the embedding source
/// and stripping any raw embedding payload that leaked through.
fn normalize_candidates(records: Vec<Record>) -> Vec<HotelRecord> {
    records
        .into_iter()
        .filter_map(|mut record| {
            if let Some(Value::Object(node)) = record.remove("node") {
                for (key, value) in node {
                    record.entry(key).or_insert(value);
                }
            }
            record.retain(|key, _| !key.starts_with("embedding"));

            let name = record.get("name")?.as_str()?.to_string();
            Some(HotelRecord {
                hotel_id: record
                    .get("hotel_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                name,
                city: record.get("city").and_then(Value::as_str).map(str::to_string),
                country: record
                    .get("country")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                star_rating: record
                    .get("stars")
                    .or_else(|| record.get("star_rating"))
                    .and_then(Value::as_f64),
                average_score: record
                    .get("avg_score")
                    .or_else(|| record.get("average_reviews_score"))
                    .and_then(Value::as_f64),
                category_scores: Default::default(),
                review_snippets: Vec::new(),
                source: RetrievalSource::Embedding,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubEncoder {
        dimension: usize,
    }

    impl TextEncoder for StubEncoder {
        fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if text.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![0.1; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    /// Returns three candidates; cleanliness aggregates make only two pass
    /// a >= 8 post-filter.
    struct StubGraph;

    #[async_trait]
    impl GraphQuery for StubGraph {
        async fn run(&self, query: &str, _params: Value) -> Vec<Record> {
            if query.contains("queryNodes") {
                return ["h1", "h2", "h3"]
                    .iter()
                    .enumerate()
                    .map(|(i, id)| {
                        json!({
                            "name": format!("Hotel {id}"),
                            "hotel_id": id,
                            "stars": 4.0,
                            "avg_score": 8.0,
                            "city": "Cairo",
                            "country": "Egypt",
                            "score": 0.9 - i as f64 * 0.1,
                            "embedding_minilm": [0.0, 0.1],
                        })
                        .as_object()
                        .unwrap()
                        .clone()
                    })
                    .collect();
            }
            if query.contains("avg(r.score_cleanliness)") {
                return vec![
                    json!({"hotel_id": "h1", "category_score": 9.1}).as_object().unwrap().clone(),
                    json!({"hotel_id": "h2", "category_score": 6.0}).as_object().unwrap().clone(),
                    json!({"hotel_id": "h3", "category_score": 8.2}).as_object().unwrap().clone(),
                ];
            }
            Vec::new()
        }
    }

    fn retriever() -> EmbeddingRetriever {
        EmbeddingRetriever::new(
            Arc::new(StubGraph),
            Arc::new(StubEncoder { dimension: 384 }),
            "hotel_embedding_minilm_idx".into(),
            5,
        )
    }

    #[tokio::test]
    async fn test_empty_query_short_circuits() {
        let items = retriever()
            .retrieve("", &ExtractedEntities::default(), 10, Intent::HotelSearch)
            .await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_post_filter_drops_low_aggregates() {
        let entities = ExtractedEntities {
            rating_filter: Some(crate::types::RatingFilter::gte(
                crate::types::RatingDimension::Cleanliness,
                8.0,
            )),
            ..Default::default()
        };
        let items = retriever()
            .retrieve("clean hotels in cairo", &entities, 10, Intent::HotelSearch)
            .await;
        assert_eq!(items.len(), 2);
        for item in &items {
            match item {
                RetrievedItem::Hotel(hotel) => {
                    let score = hotel.category_scores["cleanliness"];
                    assert!(score >= 8.0);
                    assert_eq!(hotel.source, RetrievalSource::Embedding);
                }
                other => panic!("expected hotel, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_embedding_payload_stripped() {
        let items = retriever()
            .retrieve("hotels", &ExtractedEntities::default(), 10, Intent::HotelSearch)
            .await;
        assert_eq!(items.len(), 3);
        // Normalization only keeps the typed fields; serialized output must
        // not contain raw vectors.
        let serialized = serde_json::to_string(&items).unwrap();
        assert!(!serialized.contains("embedding_minilm"));
    }
}
