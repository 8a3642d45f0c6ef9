//! Core data model shared across the engine: intents, extracted entities,
//! rating constraints, and normalized retrieval records.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Closed set of user goals the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    HotelSearch,
    ReviewQuery,
    Recommendation,
    Booking,
    VisaQuery,
    HotelVisa,
    GenericQa,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HotelSearch => "hotel_search",
            Self::ReviewQuery => "review_query",
            Self::Recommendation => "recommendation",
            Self::Booking => "booking",
            Self::VisaQuery => "visa_query",
            Self::HotelVisa => "hotel_visa",
            Self::GenericQa => "generic_qa",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "hotel_search" => Some(Self::HotelSearch),
            "review_query" => Some(Self::ReviewQuery),
            "recommendation" => Some(Self::Recommendation),
            "booking" => Some(Self::Booking),
            "visa_query" => Some(Self::VisaQuery),
            "hotel_visa" => Some(Self::HotelVisa),
            "generic_qa" => Some(Self::GenericQa),
            _ => None,
        }
    }

    pub fn all() -> &'static [Intent] {
        &[
            Self::HotelSearch,
            Self::ReviewQuery,
            Self::Recommendation,
            Self::Booking,
            Self::VisaQuery,
            Self::HotelVisa,
            Self::GenericQa,
        ]
    }
}

/// Where the final intent label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    RuleBased,
    LlmFallback,
}

/// Outcome of intent classification. Exactly one label, never "unknown":
/// low-confidence rule results are resolved by the LLM fallback or a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub source: IntentSource,
    pub scores: BTreeMap<Intent, f64>,
    pub top_score: f64,
    pub fallback_used: bool,
}

/// Which score a rating constraint applies to. `Reviews` is the global
/// average review score stored on the hotel node; the rest are per-review
/// category scores aggregated at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingDimension {
    Stars,
    Cleanliness,
    Comfort,
    Facilities,
    Staff,
    Money,
    Reviews,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingOp {
    Gte,
    Lte,
    Between,
    Eq,
}

/// A numeric rating constraint on a 0-10 scale (star counts are converted
/// through a fixed table before they get here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingFilter {
    pub dimension: RatingDimension,
    pub op: RatingOp,
    pub value: f64,
    /// Upper bound, present iff `op == Between`.
    pub max: Option<f64>,
}

impl RatingFilter {
    pub fn gte(dimension: RatingDimension, value: f64) -> Self {
        Self { dimension, op: RatingOp::Gte, value, max: None }
    }

    pub fn lte(dimension: RatingDimension, value: f64) -> Self {
        Self { dimension, op: RatingOp::Lte, value, max: None }
    }

    pub fn eq(dimension: RatingDimension, value: f64) -> Self {
        Self { dimension, op: RatingOp::Eq, value, max: None }
    }

    pub fn between(dimension: RatingDimension, min: f64, max: f64) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Self { dimension, op: RatingOp::Between, value: lo, max: Some(hi) }
    }

    /// True when a hotel score satisfies this constraint.
    pub fn accepts(&self, score: f64) -> bool {
        match self.op {
            RatingOp::Gte => score >= self.value,
            RatingOp::Lte => score <= self.value,
            RatingOp::Eq => (score - self.value).abs() < 1e-9,
            RatingOp::Between => {
                let hi = self.max.unwrap_or(self.value);
                score >= self.value && score <= hi
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravellerType {
    Solo,
    Family,
    Couple,
    Business,
    Group,
}

impl TravellerType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Family => "family",
            Self::Couple => "couple",
            Self::Business => "business",
            Self::Group => "group",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// Structured constraints pulled out of one query. Created per request,
/// consumed read-only by both retrievers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub cities: Vec<String>,
    pub countries: Vec<String>,
    pub hotels: Vec<String>,
    pub origin_country: Vec<String>,
    pub destination_country: Vec<String>,
    pub traveller_type: Option<TravellerType>,
    pub age_group: Option<String>,
    pub gender: Vec<Gender>,
    pub rating_filter: Option<RatingFilter>,
    /// Per-field confidence in [0,1] when the LLM path produced this result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<HashMap<String, f64>>,
}

/// Which retrieval path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Baseline,
    Embedding,
}

/// Normalized hotel record, the common shape both retrievers converge on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelRecord {
    pub hotel_id: Option<String>,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub star_rating: Option<f64>,
    pub average_score: Option<f64>,
    pub category_scores: BTreeMap<String, f64>,
    pub review_snippets: Vec<String>,
    pub source: RetrievalSource,
}

impl HotelRecord {
    /// Stable identity across both retrieval paths: hotel_id when present,
    /// else the trimmed lower-cased name.
    pub fn identity_key(&self) -> Option<String> {
        if let Some(id) = &self.hotel_id {
            if !id.trim().is_empty() {
                return Some(id.trim().to_string());
            }
        }
        let name = self.name.trim().to_lowercase();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// One visa relationship fact; `visa_type = "Visa Free"` encodes the absence
/// of a restricting edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaFact {
    pub origin_country: String,
    pub destination_country: String,
    pub visa_type: String,
}

/// A single retrieved item before merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievedItem {
    Hotel(HotelRecord),
    Visa(VisaFact),
    Other(serde_json::Map<String, serde_json::Value>),
}

/// Merged, deduplicated view of both retrievers' output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombinedResults {
    pub hotels: Vec<HotelRecord>,
    pub visa_info: Vec<VisaFact>,
    pub others: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl CombinedResults {
    pub fn is_empty(&self) -> bool {
        self.hotels.is_empty() && self.visa_info.is_empty() && self.others.is_empty()
    }
}

/// Full engine output for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Unique id for correlating logs with a returned result.
    pub request_id: String,
    pub intent: Option<IntentResult>,
    pub entities: Option<ExtractedEntities>,
    pub baseline: Vec<RetrievedItem>,
    pub embeddings: Vec<RetrievedItem>,
    pub combined: CombinedResults,
    pub context_text: String,
    pub query_trace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_prefers_hotel_id() {
        let record = HotelRecord {
            hotel_id: Some("h42".into()),
            name: "Grand Plaza".into(),
            city: None,
            country: None,
            star_rating: None,
            average_score: None,
            category_scores: BTreeMap::new(),
            review_snippets: Vec::new(),
            source: RetrievalSource::Baseline,
        };
        assert_eq!(record.identity_key().as_deref(), Some("h42"));
    }

    #[test]
    fn test_identity_key_falls_back_to_normalized_name() {
        let record = HotelRecord {
            hotel_id: None,
            name: "  Grand Plaza ".into(),
            city: None,
            country: None,
            star_rating: None,
            average_score: None,
            category_scores: BTreeMap::new(),
            review_snippets: Vec::new(),
            source: RetrievalSource::Embedding,
        };
        assert_eq!(record.identity_key().as_deref(), Some("grand plaza"));
    }

    #[test]
    fn test_between_filter_orders_bounds() {
        let f = RatingFilter::between(RatingDimension::Reviews, 9.0, 7.0);
        assert_eq!(f.value, 7.0);
        assert_eq!(f.max, Some(9.0));
        assert!(f.accepts(8.0));
        assert!(!f.accepts(9.5));
    }

    #[test]
    fn test_intent_label_round_trip() {
        for intent in Intent::all() {
            assert_eq!(Intent::from_label(intent.label()), Some(*intent));
        }
        assert_eq!(Intent::from_label("unknown"), None);
    }
}
