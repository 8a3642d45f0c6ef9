//! Hotel name recognition against a loaded hotel-name gazetteer: exact
//! substring match first (longest name wins), then fuzzy matching over
//! token windows for typos and partial names.

use crate::similarity::edit_similarity;

pub struct HotelMatcher {
    originals: Vec<String>,
    lowered: Vec<String>,
    fuzzy_cutoff: f64,
}

impl HotelMatcher {
    pub fn new(hotel_names: Vec<String>, fuzzy_cutoff: f64) -> Self {
        let lowered = hotel_names.iter().map(|h| h.to_lowercase()).collect();
        Self {
            originals: hotel_names,
            lowered,
            fuzzy_cutoff,
        }
    }

    /// If the text contains a full hotel name as a substring, return the
    /// longest (most specific) one.
    pub fn match_exact(&self, text: &str) -> Option<String> {
        let text_low = text.to_lowercase();
        self.originals
            .iter()
            .zip(&self.lowered)
            .filter(|(_, lowered)| text_low.contains(lowered.as_str()))
            .max_by_key(|(_, lowered)| lowered.len())
            .map(|(original, _)| original.clone())
    }

    /// Fuzzy match over one- and two-token windows ("niel plazz" finds
    /// "Nile Plaza"). Best edit-similarity above the cutoff wins.
    pub fn match_fuzzy(&self, text: &str) -> Option<String> {
        let cleaned = text.replace(',', " ").to_lowercase();
        let tokens: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|t| t.len() >= 3)
            .collect();

        let mut windows: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        for pair in tokens.windows(2) {
            windows.push(pair.join(" "));
        }

        let mut best: Option<(f64, &str)> = None;
        for window in &windows {
            for (original, lowered) in self.originals.iter().zip(&self.lowered) {
                let ratio = edit_similarity(window, lowered);
                if ratio >= self.fuzzy_cutoff && best.map_or(true, |(r, _)| ratio > r) {
                    best = Some((ratio, original));
                }
            }
        }
        best.map(|(_, name)| name.to_string())
    }

    /// Exact match first, fuzzy as a fallback.
    pub fn find(&self, text: &str) -> Option<String> {
        self.match_exact(text).or_else(|| self.match_fuzzy(text))
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> HotelMatcher {
        HotelMatcher::new(
            vec![
                "Nile Plaza".into(),
                "Grand Nile Plaza Resort".into(),
                "Hotel Sacher".into(),
            ],
            0.7,
        )
    }

    #[test]
    fn test_exact_prefers_longest_name() {
        let found = matcher().match_exact("reviews for grand nile plaza resort please");
        assert_eq!(found.as_deref(), Some("Grand Nile Plaza Resort"));
    }

    #[test]
    fn test_fuzzy_handles_typos() {
        let found = matcher().match_fuzzy("is the niel plaza any good");
        assert_eq!(found.as_deref(), Some("Nile Plaza"));
    }

    #[test]
    fn test_no_match_below_cutoff() {
        assert_eq!(matcher().find("hotels in Cairo"), None);
    }
}
