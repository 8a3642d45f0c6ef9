//! Entity extraction.
//!
//! `EntityExtractor` composes the constraint parsers behind a single
//! infallible `extract` call. It is an explicit, constructor-injected
//! component: gazetteers and the hotel matcher are loaded once at process
//! start and shared by reference, never re-created per query. The LLM path
//! is optional and falls back to the rules transparently.

pub mod hotels;
pub mod llm;
pub mod location;
pub mod rating;
pub mod traveller;

use std::sync::Arc;

use crate::gazetteer::Gazetteer;
use crate::llm::LlmClient;
use crate::parse::QueryParser;
use crate::types::ExtractedEntities;

use hotels::HotelMatcher;
use llm::LlmEntityExtractor;
use location::LocationExtractor;
use rating::RatingParser;
use traveller::TravellerExtractor;

pub struct EntityExtractor {
    parser: Box<dyn QueryParser>,
    gazetteer: Arc<Gazetteer>,
    hotel_matcher: HotelMatcher,
    rating: RatingParser,
    traveller: TravellerExtractor,
    location: LocationExtractor,
    llm_extractor: LlmEntityExtractor,
    llm: Option<Arc<dyn LlmClient>>,
}

impl EntityExtractor {
    pub fn new(
        parser: Box<dyn QueryParser>,
        gazetteer: Arc<Gazetteer>,
        hotel_matcher: HotelMatcher,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self {
            parser,
            gazetteer,
            hotel_matcher,
            rating: RatingParser::new(),
            traveller: TravellerExtractor::new(),
            location: LocationExtractor::new(),
            llm_extractor: LlmEntityExtractor::new(),
            llm,
        }
    }

    /// Extract structured constraints from a query. Never fails: the LLM
    /// path degrades to the rule path, which always produces a result.
    pub async fn extract(&self, text: &str, use_llm: bool) -> ExtractedEntities {
        if use_llm {
            if let Some(llm) = &self.llm {
                match self.llm_extractor.extract(llm.as_ref(), text).await {
                    Ok(entities) => return entities,
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM extraction failed, using rule path");
                    }
                }
            } else {
                tracing::debug!("LLM extraction requested but no client configured");
            }
        }
        self.extract_rules(text)
    }

    /// Pure rule-based extraction.
    pub fn extract_rules(&self, text: &str) -> ExtractedEntities {
        let parsed = self.parser.parse(text);
        let locations = self.location.extract(&parsed, &self.gazetteer);

        let gender = self.traveller.extract_genders(text);
        let traveller_type = self.traveller.extract_type(text, &gender);
        let age_group = self.traveller.extract_age_group(text);

        let hotels = self
            .hotel_matcher
            .find(text)
            .map(|h| vec![h])
            .unwrap_or_default();

        let rating_filter = self.rating.parse(text);

        ExtractedEntities {
            cities: locations.cities,
            countries: locations.countries,
            hotels,
            origin_country: locations.origin_country,
            destination_country: locations.destination_country,
            traveller_type,
            age_group,
            gender,
            rating_filter,
            confidence: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::HeuristicParser;
    use crate::types::{RatingOp, TravellerType};

    fn extractor() -> EntityExtractor {
        EntityExtractor::new(
            Box::new(HeuristicParser::new()),
            Arc::new(Gazetteer::builtin(0.9)),
            HotelMatcher::new(vec!["Nile Plaza".into(), "Hotel Sacher".into()], 0.7),
            None,
        )
    }

    #[test]
    fn test_rule_extraction_full_query() {
        let entities = extractor()
            .extract_rules("We are a family travelling from Egypt to Vienna, need a hotel rated above 8");
        assert_eq!(entities.origin_country, vec!["Egypt".to_string()]);
        assert_eq!(entities.cities, vec!["Vienna".to_string()]);
        assert_eq!(entities.traveller_type, Some(TravellerType::Family));
        let filter = entities.rating_filter.unwrap();
        assert_eq!(filter.op, RatingOp::Gte);
        assert!((filter.value - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_hotel_name_picked_up() {
        let entities = extractor().extract_rules("reviews for Hotel Sacher");
        assert_eq!(entities.hotels, vec!["Hotel Sacher".to_string()]);
    }

    #[tokio::test]
    async fn test_llm_flag_without_client_uses_rules() {
        let entities = extractor().extract("hotels in Cairo", true).await;
        assert_eq!(entities.cities, vec!["Cairo".to_string()]);
        assert!(entities.confidence.is_none());
    }
}
