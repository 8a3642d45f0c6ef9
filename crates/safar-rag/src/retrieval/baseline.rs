//! Structured (baseline) retrieval.
//!
//! Routes (intent, entities) to a parameterized graph query: rating-filtered
//! hotel search through the template generator, review lookups, traveller
//! recommendations, and visa resolution. Visa semantics: a missing
//! NEEDS_VISA edge means "Visa Free", and the hotel_visa intent resolves
//! the visa-free destination set before searching hotels inside it.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::graph::{GraphQuery, Record};
use crate::types::{
    ExtractedEntities, HotelRecord, Intent, RatingDimension, RetrievalSource, RetrievedItem,
    VisaFact,
};

use super::templates::{self, BuiltQuery, LocationScope};

pub const VISA_FREE: &str = "Visa Free";

pub struct BaselineRetriever {
    graph: Arc<dyn GraphQuery>,
}

impl BaselineRetriever {
    pub fn new(graph: Arc<dyn GraphQuery>) -> Self {
        Self { graph }
    }

    pub async fn retrieve(
        &self,
        intent: Intent,
        entities: &ExtractedEntities,
        limit: usize,
    ) -> (Vec<RetrievedItem>, String) {
        let mut trace = Vec::new();
        let items = match intent {
            Intent::HotelSearch | Intent::Booking | Intent::GenericQa => {
                self.hotel_path(entities, limit, &mut trace).await
            }
            Intent::Recommendation => self.recommendation(entities, limit, &mut trace).await,
            Intent::ReviewQuery => self.reviews(entities, limit, &mut trace).await,
            Intent::VisaQuery => self.visa(entities, &mut trace).await,
            Intent::HotelVisa => self.hotel_visa(entities, limit, &mut trace).await,
        };
        tracing::debug!(intent = intent.label(), results = items.len(), "Baseline retrieval done");
        (items, trace.join("\n---\n"))
    }

    /// Rating filter first, then location, then free-text hotel name, then
    /// unconstrained top hotels.
    async fn hotel_path(
        &self,
        entities: &ExtractedEntities,
        limit: usize,
        trace: &mut Vec<String>,
    ) -> Vec<RetrievedItem> {
        let scope = LocationScope::from_entities(&entities.cities, &entities.countries);

        if let Some(filter) = &entities.rating_filter {
            let built = templates::build_hotel_query(filter, &scope, limit);
            let records = self.run_traced(&built, trace).await;
            return normalize_hotels(records, Some(filter.dimension));
        }

        if let Some(built) = templates::build_location_query(&scope, limit) {
            let records = self.run_traced(&built, trace).await;
            if !records.is_empty() {
                return normalize_hotels(records, None);
            }
        }

        if let Some(hotel) = entities.hotels.first() {
            let built = BuiltQuery {
                cypher: templates::HOTEL_BY_NAME_SUBSTRING.into(),
                params: json!({"q": hotel, "limit": limit}),
            };
            let records = self.run_traced(&built, trace).await;
            if !records.is_empty() {
                return normalize_hotels(records, None);
            }
        }

        let built = BuiltQuery {
            cypher: templates::TOP_HOTELS.into(),
            params: json!({"limit": limit}),
        };
        normalize_hotels(self.run_traced(&built, trace).await, None)
    }

    async fn recommendation(
        &self,
        entities: &ExtractedEntities,
        limit: usize,
        trace: &mut Vec<String>,
    ) -> Vec<RetrievedItem> {
        if let Some(traveller_type) = entities.traveller_type {
            let built = BuiltQuery {
                cypher: templates::RECOMMEND_BY_TRAVELLER_TYPE.into(),
                params: json!({"traveller_type": traveller_type.label(), "limit": limit}),
            };
            let records = self.run_traced(&built, trace).await;
            if !records.is_empty() {
                return normalize_hotels(records, None);
            }
        }
        self.hotel_path(entities, limit, trace).await
    }

    async fn reviews(
        &self,
        entities: &ExtractedEntities,
        limit: usize,
        trace: &mut Vec<String>,
    ) -> Vec<RetrievedItem> {
        let Some(hotel) = entities.hotels.first() else {
            // No hotel to fetch reviews for; a rating constraint still makes
            // this a filtered hotel search.
            if entities.rating_filter.is_some() {
                return self.hotel_path(entities, limit, trace).await;
            }
            return Vec::new();
        };
        let built = BuiltQuery {
            cypher: templates::HOTEL_REVIEWS_BY_NAME.into(),
            params: json!({"hotel": hotel, "limit": limit}),
        };
        let records = self.run_traced(&built, trace).await;
        normalize_review_rows(records)
    }

    async fn visa(
        &self,
        entities: &ExtractedEntities,
        trace: &mut Vec<String>,
    ) -> Vec<RetrievedItem> {
        let origins = &entities.origin_country;
        let destinations = &entities.destination_country;

        match (origins.first(), destinations.first()) {
            (Some(origin), Some(destination)) => {
                let built = BuiltQuery {
                    cypher: templates::VISA_PAIR.into(),
                    params: json!({"from": origin, "to": destination}),
                };
                let records = self.run_traced(&built, trace).await;
                normalize_visa_rows(records, origin, Some(destination))
            }
            (Some(origin), None) => {
                let built = BuiltQuery {
                    cypher: templates::VISA_ENUMERATION.into(),
                    params: json!({"from": origin}),
                };
                let records = self.run_traced(&built, trace).await;
                normalize_visa_rows(records, origin, None)
            }
            _ => Vec::new(),
        }
    }

    /// Resolve the visa-free destination set, then search hotels located in
    /// any of those countries.
    async fn hotel_visa(
        &self,
        entities: &ExtractedEntities,
        limit: usize,
        trace: &mut Vec<String>,
    ) -> Vec<RetrievedItem> {
        let Some(countries) = self.visa_free_set(entities, trace).await else {
            return Vec::new();
        };
        if countries.is_empty() {
            return Vec::new();
        }

        let scope = LocationScope::countries_only(countries);
        let built = match &entities.rating_filter {
            Some(filter) => templates::build_hotel_query(filter, &scope, limit),
            None => match templates::build_location_query(&scope, limit) {
                Some(built) => built,
                None => return Vec::new(),
            },
        };
        let dimension = entities.rating_filter.as_ref().map(|f| f.dimension);
        normalize_hotels(self.run_traced(&built, trace).await, dimension)
    }

    /// Countries the query's origin can enter without a visa. `None` when no
    /// origin is known.
    pub async fn visa_free_set(
        &self,
        entities: &ExtractedEntities,
        trace: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        let origin = entities
            .origin_country
            .first()
            .or_else(|| entities.countries.first())?;
        let built = BuiltQuery {
            cypher: templates::VISA_FREE_DESTINATIONS.into(),
            params: json!({"from": origin}),
        };
        let records = self.run_traced(&built, trace).await;
        Some(
            records
                .iter()
                .filter_map(|r| r.get("destination").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
        )
    }

    /// Fill in review snippets for merged hotels that came back without any,
    /// so the context document can quote reviews for every hotel.
    pub async fn attach_snippets(&self, hotels: &mut [HotelRecord], snippet_limit: usize) {
        let ids: Vec<String> = hotels
            .iter()
            .filter(|h| h.review_snippets.is_empty())
            .filter_map(|h| h.hotel_id.clone())
            .collect();
        if ids.is_empty() {
            return;
        }

        let records = self
            .graph
            .run(
                templates::REVIEW_SNIPPETS_BY_HOTEL_IDS,
                json!({"hotel_ids": ids, "snippet_limit": snippet_limit}),
            )
            .await;

        let mut by_id: std::collections::HashMap<String, Vec<String>> = records
            .iter()
            .filter_map(|record| {
                let id = record.get("hotel_id")?.as_str()?.to_string();
                let snippets = record
                    .get("snippets")?
                    .as_array()?
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                Some((id, snippets))
            })
            .collect();

        for hotel in hotels.iter_mut() {
            if !hotel.review_snippets.is_empty() {
                continue;
            }
            if let Some(id) = &hotel.hotel_id {
                if let Some(snippets) = by_id.remove(id) {
                    hotel.review_snippets = snippets;
                }
            }
        }
    }

    async fn run_traced(&self, built: &BuiltQuery, trace: &mut Vec<String>) -> Vec<Record> {
        trace.push(built.cypher.clone());
        self.graph.run(&built.cypher, built.params.clone()).await
    }
}

fn get_str(record: &Record, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_f64(record: &Record, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

/// Normalize raw graph records into the common hotel shape. Handles both
/// flat rows and rows nesting the hotel node under "h".
pub fn normalize_hotels(
    records: Vec<Record>,
    category_dimension: Option<RatingDimension>,
) -> Vec<RetrievedItem> {
    records
        .into_iter()
        .filter_map(|mut record| {
            // Flatten a nested node map into the row.
            if let Some(Value::Object(node)) = record.remove("h") {
                for (key, value) in node {
                    record.entry(key).or_insert(value);
                }
            }

            let name = get_str(&record, "name").or_else(|| get_str(&record, "hotel_name"))?;
            let mut hotel = HotelRecord {
                hotel_id: get_str(&record, "hotel_id"),
                name,
                city: get_str(&record, "city"),
                country: get_str(&record, "country"),
                star_rating: get_f64(&record, "stars").or_else(|| get_f64(&record, "star_rating")),
                average_score: get_f64(&record, "avg_score")
                    .or_else(|| get_f64(&record, "average_reviews_score")),
                category_scores: Default::default(),
                review_snippets: Vec::new(),
                source: RetrievalSource::Baseline,
            };
            if let (Some(dimension), Some(score)) =
                (category_dimension, get_f64(&record, "category_score"))
            {
                hotel
                    .category_scores
                    .insert(format!("{dimension:?}").to_lowercase(), score);
            }
            Some(RetrievedItem::Hotel(hotel))
        })
        .collect()
}

/// Collapse per-review rows into one hotel record per hotel, with the
/// review texts as snippets.
fn normalize_review_rows(records: Vec<Record>) -> Vec<RetrievedItem> {
    let mut hotels: Vec<HotelRecord> = Vec::new();
    for record in records {
        let Some(name) = get_str(&record, "name") else {
            continue;
        };
        let hotel_id = get_str(&record, "hotel_id");
        let snippet = get_str(&record, "text");

        let existing = hotels.iter_mut().find(|h| {
            h.hotel_id == hotel_id && h.name.eq_ignore_ascii_case(&name)
        });
        let hotel = match existing {
            Some(hotel) => hotel,
            None => {
                hotels.push(HotelRecord {
                    hotel_id,
                    name,
                    city: None,
                    country: None,
                    star_rating: None,
                    average_score: get_f64(&record, "score"),
                    category_scores: Default::default(),
                    review_snippets: Vec::new(),
                    source: RetrievalSource::Baseline,
                });
                hotels.last_mut().unwrap()
            }
        };
        if let Some(snippet) = snippet {
            hotel.review_snippets.push(snippet);
        }
    }
    hotels.into_iter().map(RetrievedItem::Hotel).collect()
}

/// Normalize visa rows; a null visa_type is the negative-existence case and
/// reads as "Visa Free".
fn normalize_visa_rows(
    records: Vec<Record>,
    origin: &str,
    destination: Option<&str>,
) -> Vec<RetrievedItem> {
    if records.is_empty() {
        // Both countries missing from the graph entirely; with a concrete
        // pair we still answer with the negative-existence default.
        if let Some(destination) = destination {
            return vec![RetrievedItem::Visa(VisaFact {
                origin_country: origin.to_string(),
                destination_country: destination.to_string(),
                visa_type: VISA_FREE.to_string(),
            })];
        }
        return Vec::new();
    }

    records
        .into_iter()
        .filter_map(|record| {
            let fact = VisaFact {
                origin_country: get_str(&record, "origin")
                    .unwrap_or_else(|| origin.to_string()),
                destination_country: get_str(&record, "destination")
                    .or_else(|| destination.map(str::to_string))?,
                visa_type: get_str(&record, "visa_type")
                    .unwrap_or_else(|| VISA_FREE.to_string()),
            };
            Some(RetrievedItem::Visa(fact))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Stub graph with one NEEDS_VISA edge (Egypt -> Germany, "Schengen")
    /// and a couple of hotels.
    struct StubGraph;

    #[async_trait]
    impl GraphQuery for StubGraph {
        async fn run(&self, query: &str, params: Value) -> Vec<Record> {
            if query.contains("OPTIONAL MATCH") && query.contains("NEEDS_VISA") {
                let from = params["from"].as_str().unwrap_or_default();
                let to = params["to"].as_str().unwrap_or_default();
                let visa_type = if from == "Egypt" && to == "Germany" {
                    json!("Schengen")
                } else {
                    Value::Null
                };
                let row = json!({"origin": from, "destination": to, "visa_type": visa_type});
                return vec![row.as_object().unwrap().clone()];
            }
            if query.contains("NOT (from)-[:NEEDS_VISA]->(dest)") {
                return vec![
                    json!({"destination": "Austria"}).as_object().unwrap().clone(),
                    json!({"destination": "France"}).as_object().unwrap().clone(),
                ];
            }
            if query.contains("collect(r.text)[0..$snippet_limit]") {
                return vec![json!({
                    "hotel_id": "h1",
                    "snippets": ["Lovely stay", "Great pool"]
                })
                .as_object()
                .unwrap()
                .clone()];
            }
            if query.contains("MATCH (h:Hotel)") {
                return vec![json!({
                    "name": "Nile Plaza",
                    "hotel_id": "h1",
                    "stars": 5.0,
                    "avg_score": 8.7,
                    "city": "Cairo",
                    "country": "Egypt"
                })
                .as_object()
                .unwrap()
                .clone()];
            }
            Vec::new()
        }
    }

    fn visa_entities(origin: &str, destination: &str) -> ExtractedEntities {
        ExtractedEntities {
            origin_country: vec![origin.to_string()],
            destination_country: vec![destination.to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_visa_edge_returns_its_type() {
        let retriever = BaselineRetriever::new(Arc::new(StubGraph));
        let (items, _) = retriever
            .retrieve(Intent::VisaQuery, &visa_entities("Egypt", "Germany"), 10)
            .await;
        match &items[0] {
            RetrievedItem::Visa(fact) => assert_eq!(fact.visa_type, "Schengen"),
            other => panic!("expected visa fact, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_visa_edge_means_visa_free() {
        let retriever = BaselineRetriever::new(Arc::new(StubGraph));
        let (items, _) = retriever
            .retrieve(Intent::VisaQuery, &visa_entities("France", "Austria"), 10)
            .await;
        match &items[0] {
            RetrievedItem::Visa(fact) => {
                assert_eq!(fact.visa_type, VISA_FREE);
                assert_eq!(fact.origin_country, "France");
                assert_eq!(fact.destination_country, "Austria");
            }
            other => panic!("expected visa fact, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hotel_visa_resolves_set_then_searches() {
        let retriever = BaselineRetriever::new(Arc::new(StubGraph));
        let entities = ExtractedEntities {
            origin_country: vec!["Egypt".to_string()],
            ..Default::default()
        };
        let (items, trace) = retriever.retrieve(Intent::HotelVisa, &entities, 10).await;
        assert!(trace.contains("NOT (from)-[:NEEDS_VISA]->(dest)"));
        assert!(trace.contains("co.name IN $countries"));
        assert_eq!(items.len(), 1);
        match &items[0] {
            RetrievedItem::Hotel(hotel) => assert_eq!(hotel.name, "Nile Plaza"),
            other => panic!("expected hotel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hotel_search_normalizes_records() {
        let retriever = BaselineRetriever::new(Arc::new(StubGraph));
        let entities = ExtractedEntities {
            cities: vec!["Cairo".to_string()],
            ..Default::default()
        };
        let (items, _) = retriever.retrieve(Intent::HotelSearch, &entities, 10).await;
        match &items[0] {
            RetrievedItem::Hotel(hotel) => {
                assert_eq!(hotel.hotel_id.as_deref(), Some("h1"));
                assert_eq!(hotel.star_rating, Some(5.0));
                assert_eq!(hotel.average_score, Some(8.7));
                assert_eq!(hotel.source, RetrievalSource::Baseline);
            }
            other => panic!("expected hotel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_attach_snippets_fills_empty_hotels_only() {
        let retriever = BaselineRetriever::new(Arc::new(StubGraph));
        let mut hotels = vec![
            HotelRecord {
                hotel_id: Some("h1".to_string()),
                name: "Nile Plaza".to_string(),
                city: None,
                country: None,
                star_rating: None,
                average_score: None,
                category_scores: Default::default(),
                review_snippets: Vec::new(),
                source: RetrievalSource::Baseline,
            },
            HotelRecord {
                hotel_id: Some("h2".to_string()),
                name: "Grand Cairo".to_string(),
                city: None,
                country: None,
                star_rating: None,
                average_score: None,
                category_scores: Default::default(),
                review_snippets: vec!["Already present".to_string()],
                source: RetrievalSource::Baseline,
            },
        ];
        retriever.attach_snippets(&mut hotels, 2).await;
        assert_eq!(hotels[0].review_snippets, vec!["Lovely stay", "Great pool"]);
        assert_eq!(hotels[1].review_snippets, vec!["Already present"]);
    }

    #[tokio::test]
    async fn test_visa_query_without_origin_is_empty() {
        let retriever = BaselineRetriever::new(Arc::new(StubGraph));
        let (items, _) = retriever
            .retrieve(Intent::VisaQuery, &ExtractedEntities::default(), 10)
            .await;
        assert!(items.is_empty());
    }
}
