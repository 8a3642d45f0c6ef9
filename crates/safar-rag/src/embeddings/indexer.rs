//! Offline index population: turn each hotel node into a feature sentence,
//! encode it, and write the vector back onto the node so the graph's vector
//! index can serve similarity queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::graph::GraphQuery;

use super::TextEncoder;

const FETCH_HOTELS: &str = "\
MATCH (h:Hotel)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)
OPTIONAL MATCH (r:Review)-[:REVIEWED]->(h)
WITH h, c, co, collect(r.text) AS snippets,
     avg(r.score_cleanliness) AS cleanliness,
     avg(r.score_comfort) AS comfort,
     avg(r.score_facilities) AS facilities,
     avg(r.score_staff) AS staff,
     avg(r.score_value_for_money) AS value_for_money
RETURN h.hotel_id AS hotel_id, h.name AS name,
       c.name AS city, co.name AS country,
       h.star_rating AS stars, h.average_reviews_score AS avg_score,
       snippets, cleanliness, comfort, facilities, staff, value_for_money";

const SET_EMBEDDING: &str = "\
MATCH (h:Hotel {hotel_id: $hotel_id})
SET h.embedding = $embedding
RETURN h.hotel_id AS hotel_id";

/// Everything the feature sentence is built from.
#[derive(Debug, Default)]
pub struct HotelDoc {
    pub hotel_id: String,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub stars: Option<f64>,
    pub average_score: Option<f64>,
    pub category_scores: BTreeMap<String, f64>,
    pub snippets: Vec<String>,
}

pub struct HotelIndexer {
    graph: Arc<dyn GraphQuery>,
    encoder: Arc<dyn TextEncoder>,
    index_name: String,
    max_snippets: usize,
    snippet_max_len: usize,
}

impl HotelIndexer {
    pub fn new(
        graph: Arc<dyn GraphQuery>,
        encoder: Arc<dyn TextEncoder>,
        index_name: &str,
    ) -> Self {
        Self {
            graph,
            encoder,
            index_name: index_name.to_string(),
            max_snippets: 3,
            snippet_max_len: 200,
        }
    }

    /// Create the vector index if it does not exist. Index names cannot be
    /// parameterized in Cypher, so the name and dimension are interpolated.
    pub async fn ensure_index(&self) -> Result<()> {
        let cypher = format!(
            "CREATE VECTOR INDEX {} IF NOT EXISTS \
             FOR (h:Hotel) ON (h.embedding) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {}, `vector.similarity_function`: 'cosine'}}}}",
            self.index_name,
            self.encoder.dimension()
        );
        self.graph.run(&cypher, json!({})).await;
        Ok(())
    }

    /// Encode and store an embedding for every hotel. Feature sentences are
    /// encoded as one batch. Returns the number of hotels indexed.
    pub async fn index_all(&self) -> Result<usize> {
        self.ensure_index().await?;

        let records = self.graph.run(FETCH_HOTELS, json!({})).await;
        if records.is_empty() {
            return Err(anyhow!("No hotels found to index"));
        }

        let docs: Vec<HotelDoc> = records
            .iter()
            .map(|record| self.doc_from_record(record))
            .filter(|doc| {
                if doc.hotel_id.is_empty() {
                    tracing::warn!("Skipping hotel row without hotel_id");
                    return false;
                }
                true
            })
            .collect();

        let texts: Vec<String> = docs
            .iter()
            .map(|doc| feature_text(doc, self.max_snippets, self.snippet_max_len))
            .collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = self.encoder.encode_batch(&text_refs)?;

        let mut indexed = 0usize;
        for (doc, embedding) in docs.iter().zip(embeddings) {
            if embedding.is_empty() {
                tracing::warn!(hotel_id = %doc.hotel_id, "Empty embedding, skipping");
                continue;
            }

            let written = self
                .graph
                .run(
                    SET_EMBEDDING,
                    json!({"hotel_id": doc.hotel_id, "embedding": embedding}),
                )
                .await;
            if written.is_empty() {
                tracing::warn!(hotel_id = %doc.hotel_id, "Failed to store embedding");
            } else {
                indexed += 1;
            }
        }

        tracing::info!(indexed, total = records.len(), "Hotel index populated");
        Ok(indexed)
    }

    fn doc_from_record(&self, record: &crate::graph::Record) -> HotelDoc {
        let get_str = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let get_num = |key: &str| record.get(key).and_then(Value::as_f64);

        let mut category_scores = BTreeMap::new();
        for key in ["cleanliness", "comfort", "facilities", "staff", "value_for_money"] {
            if let Some(score) = get_num(key) {
                category_scores.insert(key.replace('_', " "), score);
            }
        }

        let snippets = record
            .get("snippets")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        HotelDoc {
            hotel_id: get_str("hotel_id").unwrap_or_default(),
            name: get_str("name").unwrap_or_default(),
            city: get_str("city"),
            country: get_str("country"),
            stars: get_num("stars"),
            average_score: get_num("avg_score"),
            category_scores,
            snippets,
        }
    }
}

/// Deterministic feature sentence for one hotel. Field order is fixed so
/// re-indexing an unchanged hotel yields the identical embedding.
pub fn feature_text(doc: &HotelDoc, max_snippets: usize, snippet_max_len: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{}.", doc.name));

    match (&doc.city, &doc.country) {
        (Some(city), Some(country)) => parts.push(format!("Located in {city}, {country}.")),
        (Some(city), None) => parts.push(format!("Located in {city}.")),
        (None, Some(country)) => parts.push(format!("Located in {country}.")),
        (None, None) => {}
    }

    if let Some(stars) = doc.stars {
        parts.push(format!("{stars} star hotel."));
    }
    if let Some(score) = doc.average_score {
        parts.push(format!("Global Review Score: {score}/10."));
    }
    for (category, score) in &doc.category_scores {
        parts.push(format!("{category}: {score:.1}."));
    }

    let snippets: Vec<String> = doc
        .snippets
        .iter()
        .take(max_snippets)
        .map(|s| truncate_chars(s.split_whitespace().collect::<Vec<_>>().join(" "), snippet_max_len))
        .filter(|s| !s.is_empty())
        .collect();
    if !snippets.is_empty() {
        parts.push(format!("Reviews: {}", snippets.join(" | ")));
    }

    parts.join(" ")
}

fn truncate_chars(text: String, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text
    } else {
        text.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Record;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts batch calls so the indexing loop's encoding strategy is
    /// observable.
    struct BatchCountingEncoder {
        batches: AtomicUsize,
    }

    impl TextEncoder for BatchCountingEncoder {
        fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 4])
        }

        fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    /// Three hotel rows, one without an id; stores echo the written id.
    struct StubGraph;

    #[async_trait]
    impl GraphQuery for StubGraph {
        async fn run(&self, query: &str, params: Value) -> Vec<Record> {
            if query.contains("RETURN h.hotel_id AS hotel_id") {
                return [
                    json!({"hotel_id": "h1", "name": "Nile Plaza"}),
                    json!({"name": "No Id Hotel"}),
                    json!({"hotel_id": "h2", "name": "Grand Cairo"}),
                ]
                .iter()
                .map(|v| v.as_object().unwrap().clone())
                .collect();
            }
            if query.contains("SET h.embedding") {
                return vec![json!({"hotel_id": params["hotel_id"]})
                    .as_object()
                    .unwrap()
                    .clone()];
            }
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_index_all_encodes_one_batch() {
        let encoder = Arc::new(BatchCountingEncoder { batches: AtomicUsize::new(0) });
        let indexer = HotelIndexer::new(Arc::new(StubGraph), encoder.clone(), "hotel_idx");

        let indexed = indexer.index_all().await.unwrap();

        assert_eq!(indexed, 2);
        assert_eq!(encoder.batches.load(Ordering::SeqCst), 1);
    }

    fn sample_doc() -> HotelDoc {
        let mut category_scores = BTreeMap::new();
        category_scores.insert("cleanliness".to_string(), 8.24);
        category_scores.insert("staff".to_string(), 9.0);
        HotelDoc {
            hotel_id: "h1".to_string(),
            name: "Nile Plaza".to_string(),
            city: Some("Cairo".to_string()),
            country: Some("Egypt".to_string()),
            stars: Some(5.0),
            average_score: Some(8.7),
            category_scores,
            snippets: vec![
                "Great   view of the river".to_string(),
                "Friendly staff".to_string(),
                "Good breakfast".to_string(),
                "Never included".to_string(),
            ],
        }
    }

    #[test]
    fn test_feature_text_layout() {
        let text = feature_text(&sample_doc(), 3, 200);
        assert!(text.starts_with("Nile Plaza. Located in Cairo, Egypt. 5 star hotel."));
        assert!(text.contains("Global Review Score: 8.7/10."));
        assert!(text.contains("cleanliness: 8.2."));
        assert!(text.contains("staff: 9.0."));
        assert!(text.contains("Reviews: Great view of the river | Friendly staff | Good breakfast"));
        assert!(!text.contains("Never included"));
    }

    #[test]
    fn test_feature_text_is_deterministic() {
        let a = feature_text(&sample_doc(), 3, 200);
        let b = feature_text(&sample_doc(), 3, 200);
        assert_eq!(a, b);
    }

    #[test]
    fn test_feature_text_missing_fields() {
        let doc = HotelDoc {
            hotel_id: "h2".to_string(),
            name: "Mystery Inn".to_string(),
            ..Default::default()
        };
        let text = feature_text(&doc, 3, 200);
        assert_eq!(text, "Mystery Inn.");
    }

    #[test]
    fn test_snippet_truncation() {
        let mut doc = sample_doc();
        doc.snippets = vec!["abcdefghij".to_string()];
        let text = feature_text(&doc, 3, 5);
        assert!(text.contains("Reviews: abcde"));
        assert!(!text.contains("abcdef"));
    }
}
