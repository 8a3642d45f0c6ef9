//! Intent classification.
//!
//! A weighted keyword scorer with a confidence gate does the bulk of the
//! work; queries it cannot place confidently are routed to a deterministic
//! LLM label classifier. Callers always get exactly one label back.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::llm::{prompts, GenerationConfig, LlmClient};
use crate::types::{Intent, IntentResult, IntentSource};

const EPS: f64 = 1e-9;
const DOMINANCE_BOOST: f64 = 5.0;

/// Keyword lists per intent. Multi-token entries match as substrings of the
/// normalized query.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Recommendation,
        &["recommend", "suggest", "best", "top", "suggestion", "any suggestions", "could you suggest"],
    ),
    (
        Intent::Booking,
        &["book", "booking", "reserve", "reservation", "help me book", "help me in booking", "can you book", "i want to book"],
    ),
    (
        Intent::VisaQuery,
        &["visa", "visa requirements", "visa info", "passport", "entry", "immigration", "do i need a visa"],
    ),
    (
        Intent::HotelVisa,
        &["visa free", "visa-free", "without a visa", "no visa"],
    ),
    (
        Intent::ReviewQuery,
        &["review", "reviews", "rating", "ratings", "score", "scores", "feedback"],
    ),
    (
        Intent::HotelSearch,
        &["hotel", "hotels", "stay", "staying", "accommodation", "find hotels", "find a hotel"],
    ),
    (
        Intent::GenericQa,
        &["what", "how", "when", "where", "who", "why"],
    ),
];

fn intent_weight(intent: Intent) -> f64 {
    match intent {
        Intent::Recommendation => 2.0,
        Intent::Booking => 2.0,
        Intent::VisaQuery => 1.5,
        Intent::HotelVisa => 1.5,
        Intent::ReviewQuery => 1.2,
        Intent::HotelSearch => 1.0,
        Intent::GenericQa => 0.5,
    }
}

/// High-confidence multi-token phrases; each hit adds a large fixed boost so
/// they win over piles of weaker keyword matches.
const DOMINANCE_PHRASES: &[(Intent, &[&str])] = &[
    (
        Intent::Booking,
        &["help me book", "help me in booking", "can you book", "i want to book", "i'd like to book", "i want to reserve"],
    ),
    (
        Intent::VisaQuery,
        &["do i need a visa", "visa required", "need a visa", "visa information"],
    ),
    (
        Intent::HotelVisa,
        &["hotels in visa free", "visa free countries", "travel without a visa"],
    ),
    (
        Intent::Recommendation,
        &["recommend", "suggest", "any suggestions", "could you suggest"],
    ),
];

/// Only used if a true tie remains after the confidence checks.
const INTENT_PRIORITY: &[Intent] = &[
    Intent::Booking,
    Intent::Recommendation,
    Intent::HotelVisa,
    Intent::VisaQuery,
    Intent::ReviewQuery,
    Intent::HotelSearch,
    Intent::GenericQa,
];

/// Outcome of the rule stage before any fallback resolution.
#[derive(Debug, Clone)]
pub struct RuleClassification {
    pub intent: Option<Intent>,
    pub scores: BTreeMap<Intent, f64>,
    pub top_score: f64,
    pub fallback_needed: bool,
}

pub struct RuleIntentClassifier {
    min_score_to_accept: f64,
    margin_ratio: f64,
}

impl RuleIntentClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            min_score_to_accept: config.min_score_to_accept,
            margin_ratio: config.margin_ratio,
        }
    }

    fn compute_scores(text_norm: &str) -> BTreeMap<Intent, f64> {
        let mut scores: BTreeMap<Intent, f64> =
            Intent::all().iter().map(|i| (*i, 0.0)).collect();

        for (intent, phrases) in DOMINANCE_PHRASES {
            for phrase in *phrases {
                if text_norm.contains(phrase) {
                    *scores.entry(*intent).or_default() += DOMINANCE_BOOST;
                }
            }
        }

        for (intent, keywords) in INTENT_KEYWORDS {
            let hits = keywords.iter().filter(|kw| text_norm.contains(*kw)).count();
            *scores.entry(*intent).or_default() += hits as f64 * intent_weight(*intent);
        }

        scores
    }

    /// Score all intents and apply the confidence gate. `intent` is `None`
    /// when the caller should fall back to the LLM classifier.
    pub fn classify_with_confidence(&self, text: &str) -> RuleClassification {
        let text_norm = text.to_lowercase();
        let text_norm = text_norm.trim();
        let scores = Self::compute_scores(text_norm);

        let mut ranked: Vec<f64> = scores.values().copied().collect();
        ranked.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let top = ranked.first().copied().unwrap_or(0.0);
        let second = ranked.get(1).copied().unwrap_or(0.0);

        if top < self.min_score_to_accept {
            return RuleClassification {
                intent: None,
                scores,
                top_score: top,
                fallback_needed: true,
            };
        }

        if top / (second + EPS) < self.margin_ratio {
            return RuleClassification {
                intent: None,
                scores,
                top_score: top,
                fallback_needed: true,
            };
        }

        let winners: Vec<Intent> = scores
            .iter()
            .filter(|(_, v)| (**v - top).abs() < EPS)
            .map(|(k, _)| *k)
            .collect();

        let chosen = if winners.len() == 1 {
            winners[0]
        } else {
            INTENT_PRIORITY
                .iter()
                .copied()
                .find(|p| winners.contains(p))
                .unwrap_or(winners[0])
        };

        RuleClassification {
            intent: Some(chosen),
            scores,
            top_score: top,
            fallback_needed: false,
        }
    }
}

/// Two-stage classification strategy: rules first, LLM fallback on low
/// confidence. Without an LLM, or with the fallback disabled, low-confidence
/// queries resolve to `GenericQa`.
pub struct IntentRouter {
    rules: RuleIntentClassifier,
    llm: Option<Arc<dyn LlmClient>>,
    use_llm_fallback: bool,
}

impl IntentRouter {
    pub fn new(
        config: &ClassifierConfig,
        llm: Option<Arc<dyn LlmClient>>,
        use_llm_fallback: bool,
    ) -> Self {
        Self {
            rules: RuleIntentClassifier::new(config),
            llm,
            use_llm_fallback,
        }
    }

    pub async fn classify(&self, text: &str) -> IntentResult {
        let rule_result = self.rules.classify_with_confidence(text);

        if let Some(intent) = rule_result.intent {
            return IntentResult {
                intent,
                source: IntentSource::RuleBased,
                scores: rule_result.scores,
                top_score: rule_result.top_score,
                fallback_used: false,
            };
        }

        let intent = match &self.llm {
            Some(llm) if self.use_llm_fallback => {
                self.classify_via_llm(llm.as_ref(), text).await
            }
            _ => Intent::GenericQa,
        };

        IntentResult {
            intent,
            source: IntentSource::LlmFallback,
            scores: rule_result.scores,
            top_score: rule_result.top_score,
            fallback_used: true,
        }
    }

    async fn classify_via_llm(&self, llm: &dyn LlmClient, text: &str) -> Intent {
        let prompt = prompts::intent_label_prompt(text);
        let config = GenerationConfig::deterministic(16);

        let raw = match llm.generate(&prompt, &config).await {
            Ok(generation) => generation.text,
            Err(e) => {
                tracing::warn!(error = %e, "LLM intent fallback failed, defaulting to generic_qa");
                return Intent::GenericQa;
            }
        };

        Self::parse_label(&raw).unwrap_or_else(|| {
            tracing::warn!(response = %raw.trim(), "Unparsable LLM intent label, defaulting");
            Intent::GenericQa
        })
    }

    /// Exact label match, then substring soft-match over the closed set.
    fn parse_label(raw: &str) -> Option<Intent> {
        let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '`' || c == '.').to_lowercase();
        if let Some(intent) = Intent::from_label(&cleaned) {
            return Some(intent);
        }
        Intent::all()
            .iter()
            .copied()
            .find(|intent| cleaned.contains(intent.label()))
    }
}
