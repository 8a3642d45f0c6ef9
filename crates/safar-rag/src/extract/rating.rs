//! Rating constraint parsing.
//!
//! Pulls a numeric rating constraint out of free text. All values end up on
//! a 0-10 scale: X/Y phrases are normalized via (x/y)*10, star counts map
//! through a fixed table, qualitative descriptors through another. When a
//! query carries several minimum-bar cues the maximum is kept, since the
//! highest bar mentioned subsumes the others. That conflation of unrelated
//! numeric mentions is a known coarse heuristic, kept deliberately.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{RatingDimension, RatingFilter};

static SCALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:out of|/)\s*(\d+)").expect("scale regex is valid")
});
static EXPLICIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:rating|score|minimum)\s+.*?(\d+(?:\.\d+)?)").expect("explicit regex is valid")
});
static GTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:above|over|greater than|higher than|at least|min(?:imum)?)\s+(\d+(?:\.\d+)?)")
        .expect("gte regex is valid")
});
static LTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:below|under|less than|at most|no more than)\s+(\d+(?:\.\d+)?)")
        .expect("lte regex is valid")
});
static EQ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"exactly\s+(\d+(?:\.\d+)?)").expect("eq regex is valid")
});
static BETWEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:between|from)\s+(\d+(?:\.\d+)?)\s+(?:and|to)\s+(\d+(?:\.\d+)?)")
        .expect("between regex is valid")
});
static STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)\s*-?\s*star").expect("star regex is valid"));

fn star_to_rating(stars: u32) -> Option<f64> {
    match stars {
        5 => Some(9.0),
        4 => Some(8.0),
        3 => Some(7.0),
        2 => Some(6.0),
        1 => Some(5.0),
        _ => None,
    }
}

static QUALITATIVE: LazyLock<Vec<(Regex, f64)>> = LazyLock::new(|| {
    [
        ("excellent", 9.0),
        ("very good", 8.0),
        ("good", 7.0),
        ("average", 6.0),
        ("decent", 5.0),
        ("terrible", 4.0),
    ]
    .into_iter()
    .map(|(phrase, rating)| {
        let re = Regex::new(&format!(r"\b{}\b", regex::escape(phrase)))
            .expect("qualitative regex is valid");
        (re, rating)
    })
    .collect()
});

/// Keywords that mark a text as talking about ratings at all; the between
/// operator only fires in this context so age ranges are not misread.
const RATING_CONTEXT: &[&str] = &[
    "rating", "ratings", "score", "scores", "review", "reviews", "star",
    "stars", "cleanliness", "comfort", "facilities", "staff", "money",
];

fn dimension_of(text: &str) -> RatingDimension {
    if text.contains("cleanliness") || text.contains("clean") {
        RatingDimension::Cleanliness
    } else if text.contains("comfort") {
        RatingDimension::Comfort
    } else if text.contains("facilit") {
        RatingDimension::Facilities
    } else if text.contains("staff") || text.contains("service") {
        RatingDimension::Staff
    } else if text.contains("value for money") || text.contains("money") {
        RatingDimension::Money
    } else {
        RatingDimension::Reviews
    }
}

fn has_rating_context(text: &str) -> bool {
    RATING_CONTEXT.iter().any(|kw| text.contains(kw))
}

pub struct RatingParser;

impl RatingParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> Option<RatingFilter> {
        let t = text.to_lowercase();
        let dimension = dimension_of(&t);

        // Bounded range, only in explicit rating context.
        if has_rating_context(&t) {
            if let Some(caps) = BETWEEN_RE.captures(&t) {
                let lo: f64 = caps[1].parse().ok()?;
                let hi: f64 = caps[2].parse().ok()?;
                if lo <= 10.0 && hi <= 10.0 {
                    return Some(RatingFilter::between(dimension, lo, hi));
                }
            }
        }

        if let Some(caps) = EQ_RE.captures(&t) {
            if let Ok(value) = caps[1].parse() {
                return Some(RatingFilter::eq(dimension, value));
            }
        }

        if let Some(caps) = LTE_RE.captures(&t) {
            if let Ok(value) = caps[1].parse() {
                return Some(RatingFilter::lte(dimension, value));
            }
        }

        // Everything below expresses a minimum bar; collect candidates and
        // keep the highest.
        let mut candidates: Vec<f64> = Vec::new();

        if let Some(caps) = SCALE_RE.captures(&t) {
            let numerator: f64 = caps[1].parse().ok()?;
            let denominator: f64 = caps[2].parse().ok()?;
            if denominator > 0.0 {
                candidates.push(numerator / denominator * 10.0);
            }
        }

        if let Some(caps) = EXPLICIT_RE.captures(&t) {
            if let Ok(value) = caps[1].parse() {
                candidates.push(value);
            }
        }

        if let Some(caps) = GTE_RE.captures(&t) {
            if let Ok(value) = caps[1].parse() {
                candidates.push(value);
            }
        }

        if let Some(caps) = STAR_RE.captures(&t) {
            if let Some(rating) = caps[1].parse().ok().and_then(star_to_rating) {
                candidates.push(rating);
            }
        }

        for (word_re, rating) in QUALITATIVE.iter() {
            if word_re.is_match(&t) {
                candidates.push(*rating);
            }
        }

        candidates
            .into_iter()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|value| RatingFilter::gte(dimension, value))
    }
}

impl Default for RatingParser {
    fn default() -> Self {
        Self::new()
    }
}
