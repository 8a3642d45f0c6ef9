//! Location mention classification and travel-direction resolution.
//!
//! Each geopolitical mention is resolved to a country (directly, or via its
//! city with population-weighted disambiguation), then assigned to origin or
//! destination by the preposition/verb cues governing it. Parse-based
//! detection is best-effort; positional fallbacks cover the inconclusive
//! cases.

use crate::gazetteer::Gazetteer;
use crate::parse::ParsedQuery;

const TRAVEL_VERBS: &[&str] = &["go", "travel", "visit", "fly", "head", "move"];
const ORIGIN_VERBS: &[&str] = &["live", "reside"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationResult {
    pub cities: Vec<String>,
    pub countries: Vec<String>,
    pub origin_country: Vec<String>,
    pub destination_country: Vec<String>,
}

pub struct LocationExtractor;

impl LocationExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, parsed: &ParsedQuery, gazetteer: &Gazetteer) -> LocationResult {
        let mention_texts: Vec<String> =
            parsed.mentions.iter().map(|m| m.text.clone()).collect();
        let classified = gazetteer.classify(&mention_texts);

        let mut origin: Vec<String> = Vec::new();
        let mut destination: Vec<String> = Vec::new();
        let mut origin_city_sources: Vec<String> = Vec::new();

        for mention in &parsed.mentions {
            let is_city = gazetteer.canonical_country(&mention.text).is_none();
            let Some(country) = gazetteer
                .canonical_country(&mention.text)
                .or_else(|| gazetteer.country_of_city(&mention.text))
            else {
                continue;
            };

            let cues = self.cue_chain(parsed, mention.start);

            if Self::is_origin_cue(&cues, parsed, mention.start) {
                if !origin.contains(&country) {
                    origin.push(country);
                    if is_city {
                        if let Some(city) = gazetteer.canonical_city(&mention.text) {
                            origin_city_sources.push(city);
                        }
                    }
                }
            } else if Self::is_destination_cue(&cues) && !destination.contains(&country) {
                destination.push(country);
            }
        }

        // Positional fallbacks when the cue walk was inconclusive.
        let lowered = parsed
            .tokens
            .iter()
            .map(|t| t.lower.as_str())
            .collect::<Vec<_>>();
        if origin.is_empty() && lowered.contains(&"from") {
            if let Some(first) = classified.countries.first() {
                origin.push(first.clone());
            }
        }

        if destination.is_empty() && classified.countries.len() == 1 {
            let only = classified.countries[0].clone();
            if !origin.contains(&only) || origin.len() > 1 {
                destination.push(only);
            }
        }

        // Each city not already consumed as an origin implies its country
        // as a destination, even alongside cue-resolved destinations.
        for city in &classified.cities {
            if origin_city_sources
                .iter()
                .any(|src| src.eq_ignore_ascii_case(city))
            {
                continue;
            }
            if let Some(country) = gazetteer.country_of_city(city) {
                if !destination.contains(&country) {
                    destination.push(country);
                }
            }
        }

        LocationResult {
            cities: classified.cities,
            countries: classified.countries,
            origin_country: origin,
            destination_country: destination,
        }
    }

    /// Preposition/verb lemmas governing the mention at `start`.
    fn cue_chain<'a>(&self, parsed: &'a ParsedQuery, start: usize) -> Vec<&'a str> {
        let floor = parsed
            .mentions
            .iter()
            .map(|m| m.end)
            .filter(|&end| end <= start)
            .max()
            .unwrap_or(0);
        parsed.tokens[floor..start]
            .iter()
            .filter(|t| {
                matches!(
                    t.pos,
                    crate::parse::Pos::Prep | crate::parse::Pos::Verb
                )
            })
            .map(|t| t.lemma.as_str())
            .collect()
    }

    fn is_origin_cue(cues: &[&str], parsed: &ParsedQuery, start: usize) -> bool {
        if cues.contains(&"from") {
            return true;
        }
        if ORIGIN_VERBS.iter().any(|v| cues.contains(v)) {
            return true;
        }
        // "I am in Cairo" reads as current location unless a future marker
        // ("will", "going to") precedes it.
        cues.contains(&"be")
            && cues.contains(&"in")
            && !cues.iter().any(|c| TRAVEL_VERBS.contains(c))
            && !parsed.future_marker_before(start)
    }

    fn is_destination_cue(cues: &[&str]) -> bool {
        cues.contains(&"to") || cues.iter().any(|c| TRAVEL_VERBS.contains(c))
    }
}

impl Default for LocationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{HeuristicParser, QueryParser};

    fn extract(text: &str) -> LocationResult {
        let gazetteer = Gazetteer::builtin(0.9);
        let parsed = HeuristicParser::new().parse(text);
        LocationExtractor::new().extract(&parsed, &gazetteer)
    }

    #[test]
    fn test_from_to_pair() {
        let result = extract("Is a visa needed to travel from Egypt to Germany?");
        assert_eq!(result.origin_country, vec!["Egypt".to_string()]);
        assert_eq!(result.destination_country, vec!["Germany".to_string()]);
    }

    #[test]
    fn test_live_in_marks_origin() {
        let result = extract("I live in France and want to visit Japan");
        assert_eq!(result.origin_country, vec!["France".to_string()]);
        assert_eq!(result.destination_country, vec!["Japan".to_string()]);
    }

    #[test]
    fn test_origin_city_resolves_to_country() {
        let result = extract("I am travelling from Paris to Tokyo");
        assert_eq!(result.origin_country, vec!["France".to_string()]);
        assert_eq!(result.destination_country, vec!["Japan".to_string()]);
    }

    #[test]
    fn test_single_country_defaults_to_destination() {
        let result = extract("find hotels in Egypt");
        assert!(result.origin_country.is_empty());
        assert_eq!(result.destination_country, vec!["Egypt".to_string()]);
    }

    #[test]
    fn test_bare_city_implies_destination_country() {
        let result = extract("best hotels in Vienna");
        assert_eq!(result.cities, vec!["Vienna".to_string()]);
        assert_eq!(result.destination_country, vec!["Austria".to_string()]);
    }

    #[test]
    fn test_each_unconsumed_city_adds_destination() {
        // A bare second city still contributes its country after a cue
        // already resolved another destination.
        let result = extract("I want to fly to Tokyo and maybe Vienna");
        assert_eq!(
            result.destination_country,
            vec!["Japan".to_string(), "Austria".to_string()]
        );
    }

    #[test]
    fn test_i_am_in_marks_origin_without_future() {
        let result = extract("I am in Cairo and need a visa for Spain");
        assert_eq!(result.origin_country, vec!["Egypt".to_string()]);
        assert!(result.destination_country.contains(&"Spain".to_string()));
    }
}
