//! Cypher generation.
//!
//! One generator covers the whole rating-dimension x operator x location
//! matrix instead of a branch per combination: a selector table says where
//! each dimension's score lives (on the hotel node, or aggregated from its
//! reviews), an operator table renders the comparison, and the location
//! scope adds its WHERE clause. Fixed single-purpose templates (reviews,
//! visa lookups, name search) live alongside.

use serde_json::{json, Value};

use crate::types::{RatingDimension, RatingFilter, RatingOp};

/// Where a dimension's score is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSelector {
    /// Property stored on the hotel node.
    Node(&'static str),
    /// Per-review category score aggregated at query time.
    ReviewAggregate(&'static str),
}

pub fn selector_for(dimension: RatingDimension) -> ScoreSelector {
    match dimension {
        RatingDimension::Stars => ScoreSelector::Node("h.star_rating"),
        RatingDimension::Reviews => ScoreSelector::Node("h.average_reviews_score"),
        RatingDimension::Cleanliness => ScoreSelector::ReviewAggregate("r.score_cleanliness"),
        RatingDimension::Comfort => ScoreSelector::ReviewAggregate("r.score_comfort"),
        RatingDimension::Facilities => ScoreSelector::ReviewAggregate("r.score_facilities"),
        RatingDimension::Staff => ScoreSelector::ReviewAggregate("r.score_staff"),
        RatingDimension::Money => ScoreSelector::ReviewAggregate("r.score_value_for_money"),
    }
}

/// Comparison fragment for `expr` under the filter's operator.
fn operator_clause(expr: &str, op: RatingOp) -> String {
    match op {
        RatingOp::Gte => format!("{expr} >= $rating"),
        RatingOp::Lte => format!("{expr} <= $rating"),
        RatingOp::Eq => format!("{expr} = $rating"),
        RatingOp::Between => format!("{expr} >= $rating_min AND {expr} <= $rating_max"),
    }
}

/// Optional city/country restriction on the candidate pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationScope {
    pub cities: Vec<String>,
    pub countries: Vec<String>,
}

impl LocationScope {
    pub fn from_entities(cities: &[String], countries: &[String]) -> Self {
        Self {
            cities: cities.to_vec(),
            countries: countries.to_vec(),
        }
    }

    pub fn countries_only(countries: Vec<String>) -> Self {
        Self {
            cities: Vec::new(),
            countries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty() && self.countries.is_empty()
    }

    fn where_clause(&self) -> Option<&'static str> {
        if !self.cities.is_empty() {
            Some("c.name IN $cities")
        } else if !self.countries.is_empty() {
            Some("co.name IN $countries")
        } else {
            None
        }
    }
}

/// A generated query plus its parameters.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub cypher: String,
    pub params: Value,
}

/// Compose the hotel query for one (filter, scope, limit) cell.
pub fn build_hotel_query(
    filter: &RatingFilter,
    scope: &LocationScope,
    limit: usize,
) -> BuiltQuery {
    let mut conditions: Vec<String> = Vec::new();
    if let Some(clause) = scope.where_clause() {
        conditions.push(clause.to_string());
    }

    let cypher = match selector_for(filter.dimension) {
        ScoreSelector::Node(expr) => {
            conditions.push(operator_clause(expr, filter.op));
            format!(
                "MATCH (h:Hotel)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)\n\
                 WHERE {}\n\
                 RETURN h.name AS name, h.hotel_id AS hotel_id, h.star_rating AS stars, \
                 h.average_reviews_score AS avg_score, c.name AS city, co.name AS country\n\
                 ORDER BY h.average_reviews_score DESC\n\
                 LIMIT $limit",
                conditions.join(" AND ")
            )
        }
        ScoreSelector::ReviewAggregate(expr) => {
            let scope_clause = conditions
                .first()
                .map(|c| format!("WHERE {c}\n"))
                .unwrap_or_default();
            format!(
                "MATCH (h:Hotel)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)\n\
                 {scope_clause}\
                 MATCH (r:Review)-[:REVIEWED]->(h)\n\
                 WITH h, c, co, avg({expr}) AS category_score\n\
                 WHERE {}\n\
                 RETURN h.name AS name, h.hotel_id AS hotel_id, h.star_rating AS stars, \
                 h.average_reviews_score AS avg_score, c.name AS city, co.name AS country, \
                 category_score\n\
                 ORDER BY category_score DESC\n\
                 LIMIT $limit",
                operator_clause("category_score", filter.op)
            )
        }
    };

    let mut params = serde_json::Map::new();
    params.insert("limit".into(), json!(limit));
    match filter.op {
        RatingOp::Between => {
            params.insert("rating_min".into(), json!(filter.value));
            params.insert("rating_max".into(), json!(filter.max.unwrap_or(filter.value)));
        }
        _ => {
            params.insert("rating".into(), json!(filter.value));
        }
    }
    if !scope.cities.is_empty() {
        params.insert("cities".into(), json!(scope.cities));
    } else if !scope.countries.is_empty() {
        params.insert("countries".into(), json!(scope.countries));
    }

    BuiltQuery {
        cypher,
        params: Value::Object(params),
    }
}

/// Location-only hotel search (no rating constraint).
pub fn build_location_query(scope: &LocationScope, limit: usize) -> Option<BuiltQuery> {
    let clause = scope.where_clause()?;
    let cypher = format!(
        "MATCH (h:Hotel)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)\n\
         WHERE {clause}\n\
         RETURN h.name AS name, h.hotel_id AS hotel_id, h.star_rating AS stars, \
         h.average_reviews_score AS avg_score, c.name AS city, co.name AS country\n\
         ORDER BY h.average_reviews_score DESC\n\
         LIMIT $limit"
    );
    let mut params = serde_json::Map::new();
    params.insert("limit".into(), json!(limit));
    if !scope.cities.is_empty() {
        params.insert("cities".into(), json!(scope.cities));
    } else {
        params.insert("countries".into(), json!(scope.countries));
    }
    Some(BuiltQuery {
        cypher,
        params: Value::Object(params),
    })
}

pub const HOTEL_BY_NAME_SUBSTRING: &str = "\
MATCH (h:Hotel)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)
WHERE toLower(h.name) CONTAINS toLower($q)
RETURN h.name AS name, h.hotel_id AS hotel_id, h.star_rating AS stars, \
h.average_reviews_score AS avg_score, c.name AS city, co.name AS country
ORDER BY h.average_reviews_score DESC
LIMIT $limit";

pub const TOP_HOTELS: &str = "\
MATCH (h:Hotel)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)
RETURN h.name AS name, h.hotel_id AS hotel_id, h.star_rating AS stars, \
h.average_reviews_score AS avg_score, c.name AS city, co.name AS country
ORDER BY h.average_reviews_score DESC
LIMIT $limit";

pub const HOTEL_REVIEWS_BY_NAME: &str = "\
MATCH (r:Review)-[:REVIEWED]->(h:Hotel)
WHERE toLower(h.name) = toLower($hotel)
RETURN h.name AS name, h.hotel_id AS hotel_id, r.text AS text, \
r.score_overall AS score, r.date AS date
ORDER BY r.date DESC
LIMIT $limit";

pub const RECOMMEND_BY_TRAVELLER_TYPE: &str = "\
MATCH (t:Traveller {type: $traveller_type})-[:STAYED_AT]->(h:Hotel)
MATCH (h)-[:LOCATED_IN]->(c:City)-[:LOCATED_IN]->(co:Country)
RETURN h.name AS name, h.hotel_id AS hotel_id, h.star_rating AS stars, \
count(*) AS freq, h.average_reviews_score AS avg_score, c.name AS city, \
co.name AS country
ORDER BY freq DESC, h.average_reviews_score DESC
LIMIT $limit";

/// Specific origin->destination lookup. OPTIONAL MATCH so a missing edge
/// still yields a row with a null visa_type, which callers read as
/// "Visa Free".
pub const VISA_PAIR: &str = "\
MATCH (from:Country {name: $from}), (to:Country {name: $to})
OPTIONAL MATCH (from)-[v:NEEDS_VISA]->(to)
RETURN from.name AS origin, to.name AS destination, v.visa_type AS visa_type";

/// Every destination reachable from an origin, with the edge attribute when
/// one exists.
pub const VISA_ENUMERATION: &str = "\
MATCH (from:Country {name: $from}), (dest:Country)
WHERE dest.name <> $from
OPTIONAL MATCH (from)-[v:NEEDS_VISA]->(dest)
RETURN from.name AS origin, dest.name AS destination, v.visa_type AS visa_type
ORDER BY dest.name";

/// Countries with no restricting edge from the origin.
pub const VISA_FREE_DESTINATIONS: &str = "\
MATCH (from:Country {name: $from}), (dest:Country)
WHERE dest.name <> $from AND NOT (from)-[:NEEDS_VISA]->(dest)
RETURN dest.name AS destination
ORDER BY dest.name";

/// Per-hotel review aggregate for a dimension, used as the vector-search
/// post-filter. `None` for node-resident dimensions, which are pre-filtered
/// instead.
pub fn build_category_aggregate(dimension: RatingDimension) -> Option<String> {
    match selector_for(dimension) {
        ScoreSelector::Node(_) => None,
        ScoreSelector::ReviewAggregate(expr) => Some(format!(
            "MATCH (r:Review)-[:REVIEWED]->(h:Hotel)\n\
             WHERE h.hotel_id IN $hotel_ids\n\
             WITH h.hotel_id AS hotel_id, avg({expr}) AS category_score\n\
             RETURN hotel_id, category_score"
        )),
    }
}

/// Up to `$snippet_limit` recent reviews per hotel id, for context snippets.
pub const REVIEW_SNIPPETS_BY_HOTEL_IDS: &str = "\
MATCH (r:Review)-[:REVIEWED]->(h:Hotel)
WHERE h.hotel_id IN $hotel_ids
WITH h, r ORDER BY r.date DESC
WITH h, collect(r.text)[0..$snippet_limit] AS snippets
RETURN h.hotel_id AS hotel_id, snippets";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_dimension_filters_on_property() {
        let filter = RatingFilter::gte(RatingDimension::Reviews, 8.0);
        let built = build_hotel_query(&filter, &LocationScope::default(), 10);
        assert!(built.cypher.contains("h.average_reviews_score >= $rating"));
        assert!(!built.cypher.contains("category_score"));
        assert_eq!(built.params["rating"], 8.0);
        assert_eq!(built.params["limit"], 10);
    }

    #[test]
    fn test_aggregate_dimension_joins_reviews() {
        let filter = RatingFilter::gte(RatingDimension::Cleanliness, 8.5);
        let built = build_hotel_query(&filter, &LocationScope::default(), 5);
        assert!(built.cypher.contains("avg(r.score_cleanliness) AS category_score"));
        assert!(built.cypher.contains("category_score >= $rating"));
    }

    #[test]
    fn test_between_emits_both_bounds() {
        let filter = RatingFilter::between(RatingDimension::Reviews, 7.0, 9.0);
        let built = build_hotel_query(&filter, &LocationScope::default(), 10);
        assert!(built.cypher.contains(">= $rating_min"));
        assert!(built.cypher.contains("<= $rating_max"));
        assert_eq!(built.params["rating_min"], 7.0);
        assert_eq!(built.params["rating_max"], 9.0);
    }

    #[test]
    fn test_city_scope_precedes_country_scope() {
        let filter = RatingFilter::gte(RatingDimension::Reviews, 8.0);
        let scope = LocationScope {
            cities: vec!["Cairo".into()],
            countries: vec!["Egypt".into()],
        };
        let built = build_hotel_query(&filter, &scope, 10);
        assert!(built.cypher.contains("c.name IN $cities"));
        assert!(!built.cypher.contains("co.name IN $countries"));
        assert_eq!(built.params["cities"][0], "Cairo");
    }

    #[test]
    fn test_every_dimension_operator_cell_builds() {
        let dims = [
            RatingDimension::Stars,
            RatingDimension::Cleanliness,
            RatingDimension::Comfort,
            RatingDimension::Facilities,
            RatingDimension::Staff,
            RatingDimension::Money,
            RatingDimension::Reviews,
        ];
        for dim in dims {
            for filter in [
                RatingFilter::gte(dim, 8.0),
                RatingFilter::lte(dim, 6.0),
                RatingFilter::eq(dim, 7.0),
                RatingFilter::between(dim, 6.0, 8.0),
            ] {
                let built = build_hotel_query(&filter, &LocationScope::default(), 10);
                assert!(built.cypher.contains("LIMIT $limit"), "{:?}", filter);
            }
        }
    }

    #[test]
    fn test_location_query_requires_scope() {
        assert!(build_location_query(&LocationScope::default(), 10).is_none());
        let built =
            build_location_query(&LocationScope::countries_only(vec!["Egypt".into()]), 10)
                .unwrap();
        assert!(built.cypher.contains("co.name IN $countries"));
    }
}
