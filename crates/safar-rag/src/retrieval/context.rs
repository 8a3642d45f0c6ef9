//! Context document construction.
//!
//! A pure, deterministic serialization of the merged result set, in
//! first-seen order: visa facts, then hotels, then unidentified records.
//! The downstream text-generation service grounds its answer on this text.

use std::fmt::Write;

use crate::types::CombinedResults;

pub const EMPTY_SENTINEL: &str = "No relevant information found.";

pub struct ContextBuilder {
    max_snippets: usize,
    snippet_max_len: usize,
}

impl ContextBuilder {
    pub fn new(max_snippets: usize, snippet_max_len: usize) -> Self {
        Self {
            max_snippets,
            snippet_max_len,
        }
    }

    pub fn max_snippets(&self) -> usize {
        self.max_snippets
    }

    pub fn build(&self, combined: &CombinedResults) -> String {
        if combined.is_empty() {
            return EMPTY_SENTINEL.to_string();
        }

        let mut out = String::new();

        if !combined.visa_info.is_empty() {
            out.push_str("Visa Information:\n");
            for fact in &combined.visa_info {
                let _ = writeln!(
                    out,
                    "- Travel from {} to {}: {}",
                    fact.origin_country, fact.destination_country, fact.visa_type
                );
            }
        }

        if !combined.hotels.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Retrieved Hotels:\n");
            for hotel in &combined.hotels {
                let _ = write!(out, "- {}", hotel.name);
                match (&hotel.city, &hotel.country) {
                    (Some(city), Some(country)) => {
                        let _ = write!(out, " ({}, {})", city, country);
                    }
                    (Some(city), None) => {
                        let _ = write!(out, " ({})", city);
                    }
                    (None, Some(country)) => {
                        let _ = write!(out, " ({})", country);
                    }
                    (None, None) => {}
                }
                if let Some(stars) = hotel.star_rating {
                    let _ = write!(out, ", {} star", stars);
                }
                if let Some(score) = hotel.average_score {
                    let _ = write!(out, ", global score {}/10", score);
                }
                out.push('\n');
                for (category, score) in &hotel.category_scores {
                    let _ = writeln!(out, "  {}: {:.1}", category, score);
                }
                for snippet in hotel.review_snippets.iter().take(self.max_snippets) {
                    let _ = writeln!(out, "  review: {}", self.truncate(snippet));
                }
            }
        }

        if !combined.others.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Other Information:\n");
            for other in &combined.others {
                let _ = writeln!(
                    out,
                    "- {}",
                    serde_json::Value::Object(other.clone())
                );
            }
        }

        out.trim_end().to_string()
    }

    fn truncate(&self, snippet: &str) -> String {
        let cleaned = snippet.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.chars().count() <= self.snippet_max_len {
            return cleaned;
        }
        let truncated: String = cleaned.chars().take(self.snippet_max_len).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HotelRecord, RetrievalSource, VisaFact};
    use std::collections::BTreeMap;

    fn hotel(name: &str) -> HotelRecord {
        HotelRecord {
            hotel_id: Some(format!("id-{name}")),
            name: name.to_string(),
            city: Some("Cairo".into()),
            country: Some("Egypt".into()),
            star_rating: Some(5.0),
            average_score: Some(8.7),
            category_scores: BTreeMap::from([("cleanliness".to_string(), 9.1)]),
            review_snippets: vec!["Spotless rooms and friendly staff".into()],
            source: RetrievalSource::Baseline,
        }
    }

    #[test]
    fn test_empty_combined_returns_sentinel() {
        let builder = ContextBuilder::new(2, 200);
        assert_eq!(builder.build(&CombinedResults::default()), EMPTY_SENTINEL);
    }

    #[test]
    fn test_deterministic_output() {
        let builder = ContextBuilder::new(2, 200);
        let combined = CombinedResults {
            hotels: vec![hotel("Nile Plaza"), hotel("Grand Cairo")],
            visa_info: vec![VisaFact {
                origin_country: "Egypt".into(),
                destination_country: "Germany".into(),
                visa_type: "Schengen".into(),
            }],
            others: Vec::new(),
        };
        let first = builder.build(&combined);
        let second = builder.build(&combined);
        assert_eq!(first, second);
        assert!(first.starts_with("Visa Information:\n- Travel from Egypt to Germany: Schengen"));
        assert!(first.contains("Retrieved Hotels:\n- Nile Plaza (Cairo, Egypt)"));
        assert!(first.contains("cleanliness: 9.1"));
    }

    #[test]
    fn test_snippet_truncation() {
        let builder = ContextBuilder::new(1, 10);
        let mut h = hotel("Nile Plaza");
        h.review_snippets = vec!["a very long review text that keeps going".into()];
        let combined = CombinedResults {
            hotels: vec![h],
            ..Default::default()
        };
        let text = builder.build(&combined);
        assert!(text.contains("review: a very lon..."));
    }

    #[test]
    fn test_snippet_cap_respected() {
        let builder = ContextBuilder::new(2, 200);
        let mut h = hotel("Nile Plaza");
        h.review_snippets = vec!["one".into(), "two".into(), "three".into()];
        let combined = CombinedResults {
            hotels: vec![h],
            ..Default::default()
        };
        let text = builder.build(&combined);
        assert!(text.contains("review: one"));
        assert!(text.contains("review: two"));
        assert!(!text.contains("review: three"));
    }
}
