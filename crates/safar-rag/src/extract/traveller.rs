//! Traveller-type and demographics extraction.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Gender, TravellerType};

// Ordered phrase lists. Solo is checked before group so "travelling alone
// with my friends' blessing" style overlaps resolve to the earlier pattern.
const SOLO_PATTERNS: &[&str] = &[
    "i am travelling alone",
    "i'm travelling alone",
    "traveling alone",
    "travelling alone",
    "alone",
    "solo",
    "by myself",
    "just me",
];

const FAMILY_PATTERNS: &[&str] = &[
    "we are a family",
    "family trip",
    "family vacation",
    "family of",
    "kids",
    "children",
    "with my family",
];

const COUPLE_PATTERNS: &[&str] = &[
    "with my wife",
    "with my husband",
    "with my girlfriend",
    "with my boyfriend",
    "couple",
    "honeymoon",
    "me and my wife",
    "me and my husband",
];

const BUSINESS_PATTERNS: &[&str] = &[
    "business trip",
    "for business",
    "work trip",
    "corporate",
    "conference",
    "work travel",
];

const GROUP_PATTERNS: &[&str] = &[
    "we are a group",
    "group of",
    "with my friends",
    "students",
    "school trip",
    "group travel",
];

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:i am|i'm|age|aged)\s*(\d{1,2})\b").expect("age regex is valid")
});
static AGE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"between\s*(\d{1,2})\s*and\s*(\d{1,2})").expect("age range regex is valid")
});
static MALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:male|man|boy)\b").expect("male regex is valid"));
static FEMALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:female|woman|girl)\b").expect("female regex is valid"));

fn age_bucket(age: u32) -> Option<String> {
    match age {
        0..=17 => None,
        18..=24 => Some("18-24".into()),
        25..=34 => Some("25-34".into()),
        35..=44 => Some("35-44".into()),
        45..=54 => Some("45-54".into()),
        _ => Some("55+".into()),
    }
}

pub struct TravellerExtractor;

impl TravellerExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_type(&self, text: &str, genders: &[Gender]) -> Option<TravellerType> {
        let t = text.to_lowercase();

        let ordered: &[(&[&str], TravellerType)] = &[
            (SOLO_PATTERNS, TravellerType::Solo),
            (FAMILY_PATTERNS, TravellerType::Family),
            (COUPLE_PATTERNS, TravellerType::Couple),
            (BUSINESS_PATTERNS, TravellerType::Business),
            (GROUP_PATTERNS, TravellerType::Group),
        ];
        for (patterns, traveller_type) in ordered {
            if patterns.iter().any(|p| t.contains(p)) {
                return Some(*traveller_type);
            }
        }

        self.infer_group(&t, genders)
    }

    /// Group signals that kick in when no explicit phrase matched: two
    /// distinct genders, plural first-person pronouns, or several persons
    /// joined with "and".
    fn infer_group(&self, t: &str, genders: &[Gender]) -> Option<TravellerType> {
        if genders.len() >= 2 {
            return Some(TravellerType::Group);
        }
        if ["we ", "us ", "our "].iter().any(|p| t.contains(p)) {
            return Some(TravellerType::Group);
        }
        if t.contains(" and ")
            && ["boy", "girl", "man", "woman", "friend", "friends"]
                .iter()
                .any(|w| t.contains(w))
        {
            return Some(TravellerType::Group);
        }
        None
    }

    pub fn extract_age_group(&self, text: &str) -> Option<String> {
        let t = text.to_lowercase();

        if let Some(caps) = AGE_RE.captures(&t) {
            let age: u32 = caps[1].parse().ok()?;
            return age_bucket(age);
        }

        if let Some(caps) = AGE_RANGE_RE.captures(&t) {
            let lo: u32 = caps[1].parse().ok()?;
            let hi: u32 = caps[2].parse().ok()?;
            return age_bucket((lo + hi) / 2);
        }

        None
    }

    pub fn extract_genders(&self, text: &str) -> Vec<Gender> {
        let t = text.to_lowercase();
        let mut genders = Vec::new();
        if MALE_RE.is_match(&t) {
            genders.push(Gender::Male);
        }
        if FEMALE_RE.is_match(&t) {
            genders.push(Gender::Female);
        }
        genders
    }
}

impl Default for TravellerExtractor {
    fn default() -> Self {
        Self::new()
    }
}
