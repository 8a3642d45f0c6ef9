//! Dual city/country gazetteer.
//!
//! Backed by small embedded seed tables (a world-cities list with populations
//! and a country list with aliases). Lookups are exact first, then fuzzy with
//! a high cutoff; ambiguous city names resolve to the most populous match.
//! When classifying raw mentions, the country check runs before the city
//! check so country names that coincide with city names (Singapore, Monaco)
//! are not swallowed as cities.

use std::collections::HashMap;

use crate::similarity::edit_similarity;

const CITIES_SEED: &str = include_str!("../data/cities.csv");
const COUNTRIES_SEED: &str = include_str!("../data/countries.csv");

#[derive(Debug, Clone)]
struct CityEntry {
    name: String,
    country: String,
    population: u64,
}

/// Classification of raw geopolitical mentions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedMentions {
    pub cities: Vec<String>,
    pub countries: Vec<String>,
}

pub struct Gazetteer {
    cities: Vec<CityEntry>,
    /// lowercase city name -> indices into `cities` (ambiguous names fan out)
    city_lookup: HashMap<String, Vec<usize>>,
    /// lowercase name or alias -> canonical country name
    country_lookup: HashMap<String, String>,
    /// canonical country names, for fuzzy scans
    country_names: Vec<String>,
    fuzzy_cutoff: f64,
}

impl Gazetteer {
    /// Build from the embedded seed tables.
    pub fn builtin(fuzzy_cutoff: f64) -> Self {
        Self::from_seed(CITIES_SEED, COUNTRIES_SEED, fuzzy_cutoff)
    }

    /// Build from external CSV files with the same column layout as the
    /// seed tables (cities: name,country,population; countries:
    /// name,alias;alias).
    pub fn from_csv_files(
        cities_path: &std::path::Path,
        countries_path: &std::path::Path,
        fuzzy_cutoff: f64,
    ) -> anyhow::Result<Self> {
        let cities_csv = std::fs::read_to_string(cities_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", cities_path.display(), e))?;
        let countries_csv = std::fs::read_to_string(countries_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", countries_path.display(), e))?;
        Ok(Self::from_seed(&cities_csv, &countries_csv, fuzzy_cutoff))
    }

    fn from_seed(cities_csv: &str, countries_csv: &str, fuzzy_cutoff: f64) -> Self {
        let mut cities = Vec::new();
        let mut city_lookup: HashMap<String, Vec<usize>> = HashMap::new();
        for line in cities_csv.lines().skip(1) {
            let mut parts = line.split(',');
            let (Some(name), Some(country), Some(pop)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let idx = cities.len();
            cities.push(CityEntry {
                name: name.trim().to_string(),
                country: country.trim().to_string(),
                population: pop.trim().parse().unwrap_or(0),
            });
            city_lookup
                .entry(name.trim().to_lowercase())
                .or_default()
                .push(idx);
        }

        let mut country_lookup = HashMap::new();
        let mut country_names = Vec::new();
        for line in countries_csv.lines().skip(1) {
            let mut parts = line.split(',');
            let Some(name) = parts.next() else { continue };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            country_names.push(name.to_string());
            country_lookup.insert(name.to_lowercase(), name.to_string());
            if let Some(aliases) = parts.next() {
                for alias in aliases.split(';') {
                    let alias = alias.trim().to_lowercase();
                    if !alias.is_empty() {
                        country_lookup.insert(alias, name.to_string());
                    }
                }
            }
        }

        Self {
            cities,
            city_lookup,
            country_lookup,
            country_names,
            fuzzy_cutoff,
        }
    }

    /// Canonical country name for a mention, exact (incl. aliases) then fuzzy.
    pub fn canonical_country(&self, mention: &str) -> Option<String> {
        let key = mention.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        if let Some(canonical) = self.country_lookup.get(&key) {
            return Some(canonical.clone());
        }

        let mut best: Option<(f64, &str)> = None;
        for name in &self.country_names {
            let score = edit_similarity(&key, &name.to_lowercase());
            if score >= self.fuzzy_cutoff && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, name));
            }
        }
        best.map(|(_, name)| name.to_string())
    }

    pub fn is_country(&self, mention: &str) -> bool {
        self.canonical_country(mention).is_some()
    }

    /// Canonical city spelling for a mention, exact then fuzzy.
    pub fn canonical_city(&self, mention: &str) -> Option<String> {
        let key = mention.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        if let Some(indices) = self.city_lookup.get(&key) {
            return indices.first().map(|&i| self.cities[i].name.clone());
        }

        let mut best: Option<(f64, &str)> = None;
        for entry in &self.cities {
            let score = edit_similarity(&key, &entry.name.to_lowercase());
            if score >= self.fuzzy_cutoff && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, &entry.name));
            }
        }
        best.map(|(_, name)| name.to_string())
    }

    pub fn is_city(&self, mention: &str) -> bool {
        self.canonical_city(mention).is_some()
    }

    /// Country a city belongs to. Ambiguous names pick the most populous
    /// entry (a bare "London" means the UK one, not Ontario).
    pub fn country_of_city(&self, city: &str) -> Option<String> {
        let canonical = self.canonical_city(city)?;
        let indices = self.city_lookup.get(&canonical.to_lowercase())?;
        indices
            .iter()
            .map(|&i| &self.cities[i])
            .max_by_key(|entry| entry.population)
            .map(|entry| entry.country.clone())
    }

    /// Sort raw mentions into cities and countries, country check first.
    /// Unrecognized mentions are dropped; order and first-seen uniqueness
    /// are preserved.
    pub fn classify(&self, mentions: &[String]) -> ClassifiedMentions {
        let mut out = ClassifiedMentions::default();
        for mention in mentions {
            if let Some(country) = self.canonical_country(mention) {
                if !out.countries.contains(&country) {
                    out.countries.push(country);
                }
                continue;
            }
            if let Some(city) = self.canonical_city(mention) {
                if !out.cities.contains(&city) {
                    out.cities.push(city);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gazetteer() -> Gazetteer {
        Gazetteer::builtin(0.9)
    }

    #[test]
    fn test_exact_country_and_alias() {
        let g = gazetteer();
        assert_eq!(g.canonical_country("Germany").as_deref(), Some("Germany"));
        assert_eq!(g.canonical_country("UK").as_deref(), Some("United Kingdom"));
        assert_eq!(g.canonical_country("holland").as_deref(), Some("Netherlands"));
    }

    #[test]
    fn test_fuzzy_country() {
        let g = gazetteer();
        assert_eq!(g.canonical_country("Germanyy").as_deref(), Some("Germany"));
        assert_eq!(g.canonical_country("Gremlin"), None);
    }

    #[test]
    fn test_country_precedence_over_city() {
        let g = gazetteer();
        let classified = g.classify(&["Singapore".into(), "Paris".into()]);
        assert_eq!(classified.countries, vec!["Singapore".to_string()]);
        assert_eq!(classified.cities, vec!["Paris".to_string()]);
    }

    #[test]
    fn test_population_weighted_city_country() {
        let g = gazetteer();
        // London, UK (8.9M) outweighs London, Canada (404k).
        assert_eq!(g.country_of_city("London").as_deref(), Some("United Kingdom"));
        assert_eq!(g.country_of_city("Vienna").as_deref(), Some("Austria"));
    }

    #[test]
    fn test_fuzzy_city() {
        let g = gazetteer();
        assert_eq!(g.canonical_city("Amsterdm").as_deref(), Some("Amsterdam"));
        assert_eq!(g.canonical_city("Atlantis"), None);
    }

    #[test]
    fn test_classify_drops_unknown_and_dedups() {
        let g = gazetteer();
        let classified = g.classify(&[
            "Paris".into(),
            "paris".into(),
            "Narnia".into(),
            "Egypt".into(),
        ]);
        assert_eq!(classified.cities, vec!["Paris".to_string()]);
        assert_eq!(classified.countries, vec!["Egypt".to_string()]);
    }
}
