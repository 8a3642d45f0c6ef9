//! Schema-constrained entity extraction through the LLM.
//!
//! The model is prompted to emit a fixed JSON object. Responses are repaired
//! rather than trusted: code fences are stripped, missing keys are filled
//! from the canonical empty template, the literal string "null" becomes an
//! actual null. Anything unrecoverable is an `Err` so the caller can fall
//! back to the rule-based path.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::llm::{prompts, GenerationConfig, LlmClient};
use crate::types::{
    ExtractedEntities, Gender, RatingDimension, RatingFilter, TravellerType,
};

/// Canonical empty extraction result; also the repair template.
fn empty_template() -> Value {
    json!({
        "cities": [],
        "countries": [],
        "hotels": [],
        "origin_country": [],
        "destination_country": [],
        "traveller_type": null,
        "age_group": null,
        "gender": [],
        "rating": null,
        "confidence": {
            "cities": 0.0,
            "countries": 0.0,
            "hotels": 0.0,
            "origin_country": 0.0,
            "destination_country": 0.0,
            "traveller_type": 0.0,
            "age_group": 0.0,
            "gender": 0.0,
            "rating": 0.0,
        }
    })
}

pub struct LlmEntityExtractor;

impl LlmEntityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub async fn extract(
        &self,
        llm: &dyn LlmClient,
        query: &str,
    ) -> Result<ExtractedEntities> {
        let prompt = prompts::entity_extraction_prompt(query);
        let config = GenerationConfig::deterministic(300);
        let generation = llm.generate(&prompt, &config).await?;
        Self::parse_response(&generation.text)
    }

    /// Parse and repair a raw model response.
    pub fn parse_response(raw: &str) -> Result<ExtractedEntities> {
        let content = strip_code_fences(raw.trim());
        let parsed: Value = serde_json::from_str(content)
            .map_err(|e| anyhow!("extraction response is not valid JSON: {}", e))?;

        let Value::Object(mut map) = parsed else {
            return Err(anyhow!("extraction response is not a JSON object"));
        };

        // Fill missing keys from the template, normalize "null" strings.
        let Value::Object(template) = empty_template() else {
            unreachable!()
        };
        for (key, default) in template {
            let entry = map.entry(key).or_insert(default);
            if matches!(entry, Value::String(s) if s.eq_ignore_ascii_case("null")) {
                *entry = Value::Null;
            }
        }

        Ok(entities_from_repaired(&map))
    }
}

impl Default for LlmEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_code_fences(content: &str) -> &str {
    if !content.starts_with("```") {
        return content;
    }
    let mut parts = content.split("```").filter(|p| !p.trim().is_empty());
    let inner = parts.next().unwrap_or("");
    inner.trim_start_matches("json").trim()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.trim().is_empty() && !s.eq_ignore_ascii_case("null"))
                .map(|s| s.trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn entities_from_repaired(map: &serde_json::Map<String, Value>) -> ExtractedEntities {
    let traveller_type = map
        .get("traveller_type")
        .and_then(|v| v.as_str())
        .and_then(|s| match s {
            "solo" => Some(TravellerType::Solo),
            "family" => Some(TravellerType::Family),
            "couple" => Some(TravellerType::Couple),
            "business" => Some(TravellerType::Business),
            "group" => Some(TravellerType::Group),
            _ => None,
        });

    let gender = map
        .get("gender")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| match s {
                    "male" => Some(Gender::Male),
                    "female" => Some(Gender::Female),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    // The schema's bare numeric rating is a minimum bar on the global score.
    let rating_filter = map
        .get("rating")
        .and_then(|v| v.as_f64())
        .map(|value| RatingFilter::gte(RatingDimension::Reviews, value));

    let confidence = map.get("confidence").and_then(|v| v.as_object()).map(|c| {
        c.iter()
            .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
            .collect()
    });

    ExtractedEntities {
        cities: string_list(map.get("cities").unwrap_or(&Value::Null)),
        countries: string_list(map.get("countries").unwrap_or(&Value::Null)),
        hotels: string_list(map.get("hotels").unwrap_or(&Value::Null)),
        origin_country: string_list(map.get("origin_country").unwrap_or(&Value::Null)),
        destination_country: string_list(map.get("destination_country").unwrap_or(&Value::Null)),
        traveller_type,
        age_group: map
            .get("age_group")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        gender,
        rating_filter,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RatingOp;

    #[test]
    fn test_parse_complete_response() {
        let raw = r#"{
            "cities": ["Cairo"],
            "countries": ["Egypt"],
            "hotels": [],
            "origin_country": [],
            "destination_country": ["Egypt"],
            "traveller_type": "family",
            "age_group": "25-34",
            "gender": [],
            "rating": 8.0,
            "confidence": {"cities": 0.95, "rating": 0.9}
        }"#;
        let entities = LlmEntityExtractor::parse_response(raw).unwrap();
        assert_eq!(entities.cities, vec!["Cairo".to_string()]);
        assert_eq!(entities.traveller_type, Some(TravellerType::Family));
        let filter = entities.rating_filter.unwrap();
        assert_eq!(filter.op, RatingOp::Gte);
        assert!((filter.value - 8.0).abs() < 1e-9);
        let confidence = entities.confidence.unwrap();
        assert!((confidence["cities"] - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_missing_keys_filled_from_template() {
        let entities = LlmEntityExtractor::parse_response(r#"{"cities": ["Paris"]}"#).unwrap();
        assert_eq!(entities.cities, vec!["Paris".to_string()]);
        assert!(entities.countries.is_empty());
        assert!(entities.rating_filter.is_none());
        assert!(entities.traveller_type.is_none());
    }

    #[test]
    fn test_null_string_normalized() {
        let raw = r#"{"traveller_type": "null", "age_group": "null"}"#;
        let entities = LlmEntityExtractor::parse_response(raw).unwrap();
        assert!(entities.traveller_type.is_none());
        assert!(entities.age_group.is_none());
    }

    #[test]
    fn test_code_fences_stripped() {
        let raw = "```json\n{\"cities\": [\"Rome\"]}\n```";
        let entities = LlmEntityExtractor::parse_response(raw).unwrap();
        assert_eq!(entities.cities, vec!["Rome".to_string()]);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(LlmEntityExtractor::parse_response("not json at all").is_err());
        assert!(LlmEntityExtractor::parse_response("[1, 2, 3]").is_err());
    }
}
