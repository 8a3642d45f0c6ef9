//! Lightweight query parsing surface.
//!
//! Origin/destination detection only needs a token stream with coarse
//! part-of-speech tags and proper-noun spans, so the parser is a trait that
//! any NER/parsing backend can sit behind. The default implementation is a
//! lexicon-driven annotator: prepositions, travel and residence verbs,
//! pronouns, and capitalized spans as geopolitical mention candidates.

use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pos {
    Prep,
    Verb,
    Pron,
    Propn,
    Num,
    Other,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub lower: String,
    pub lemma: String,
    pub pos: Pos,
}

/// A contiguous proper-noun span, the unit origin/destination reasoning
/// works on.
#[derive(Debug, Clone)]
pub struct Mention {
    pub text: String,
    /// Index of the span's first token.
    pub start: usize,
    /// Index one past the span's last token.
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    pub tokens: Vec<Token>,
    pub mentions: Vec<Mention>,
}

impl ParsedQuery {
    /// Nearest preposition or verb lemma before `idx`, scanning backwards
    /// and stopping at the previous mention boundary.
    pub fn governing_cue(&self, idx: usize) -> Option<&str> {
        let floor = self
            .mentions
            .iter()
            .map(|m| m.end)
            .filter(|&end| end <= idx)
            .max()
            .unwrap_or(0);
        self.tokens[floor..idx]
            .iter()
            .rev()
            .find(|t| matches!(t.pos, Pos::Prep | Pos::Verb))
            .map(|t| t.lemma.as_str())
    }

    /// True when a future marker ("will", "going to") appears before `idx`.
    pub fn future_marker_before(&self, idx: usize) -> bool {
        self.tokens[..idx]
            .iter()
            .any(|t| t.lower == "will" || t.lemma == "go")
    }
}

pub trait QueryParser: Send + Sync {
    fn parse(&self, text: &str) -> ParsedQuery;
}

static PREPOSITIONS: &[&str] = &["from", "to", "in", "at", "near", "of", "via"];
static PRONOUNS: &[&str] = &["i", "we", "me", "us", "my", "our"];

/// verb surface form -> lemma
static VERB_LEMMAS: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    vec![
        ("travel", "travel"),
        ("travelling", "travel"),
        ("traveling", "travel"),
        ("go", "go"),
        ("going", "go"),
        ("fly", "fly"),
        ("flying", "fly"),
        ("visit", "visit"),
        ("visiting", "visit"),
        ("live", "live"),
        ("living", "live"),
        ("reside", "reside"),
        ("residing", "reside"),
        ("stay", "stay"),
        ("staying", "stay"),
        ("am", "be"),
        ("is", "be"),
        ("are", "be"),
        ("be", "be"),
        ("will", "will"),
        ("book", "book"),
        ("moved", "move"),
        ("moving", "move"),
    ]
});

/// Words that are capitalized in ordinary prose and must not start a
/// proper-noun span on their own.
static STOP_CAPS: &[&str] = &[
    "i", "what", "where", "when", "how", "who", "why", "find", "show", "can",
    "do", "does", "is", "are", "the", "a", "an", "please", "recommend",
    "suggest", "hotels", "hotel", "best", "top", "good", "any", "my", "we",
];

pub struct HeuristicParser;

impl HeuristicParser {
    pub fn new() -> Self {
        Self
    }

    fn tag(word: &str, original: &str) -> (Pos, String) {
        if PREPOSITIONS.contains(&word) {
            return (Pos::Prep, word.to_string());
        }
        if PRONOUNS.contains(&word) {
            return (Pos::Pron, word.to_string());
        }
        if let Some((_, lemma)) = VERB_LEMMAS.iter().find(|(surface, _)| *surface == word) {
            return (Pos::Verb, (*lemma).to_string());
        }
        if word.chars().all(|c| c.is_ascii_digit()) {
            return (Pos::Num, word.to_string());
        }
        let capitalized = original.chars().next().is_some_and(|c| c.is_uppercase());
        if capitalized && !STOP_CAPS.contains(&word) {
            return (Pos::Propn, word.to_string());
        }
        (Pos::Other, word.to_string())
    }
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParser for HeuristicParser {
    fn parse(&self, text: &str) -> ParsedQuery {
        let mut tokens = Vec::new();
        for raw in text.split_whitespace() {
            let stripped: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'' || *c == '-')
                .collect();
            if stripped.is_empty() {
                continue;
            }
            let lower = stripped.to_lowercase();
            let (pos, lemma) = Self::tag(&lower, &stripped);
            tokens.push(Token {
                text: stripped,
                lower,
                lemma,
                pos,
            });
        }

        // Join adjacent proper nouns into compound mentions ("New York").
        let mut mentions = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i].pos == Pos::Propn {
                let start = i;
                while i < tokens.len() && tokens[i].pos == Pos::Propn {
                    i += 1;
                }
                let text = tokens[start..i]
                    .iter()
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                mentions.push(Mention { text, start, end: i });
            } else {
                i += 1;
            }
        }

        ParsedQuery { tokens, mentions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_mention() {
        let parsed = HeuristicParser::new().parse("find hotels in New York");
        assert_eq!(parsed.mentions.len(), 1);
        assert_eq!(parsed.mentions[0].text, "New York");
    }

    #[test]
    fn test_governing_cue_is_nearest_prep() {
        let parsed = HeuristicParser::new().parse("I am travelling from Egypt to Germany");
        assert_eq!(parsed.mentions.len(), 2);
        let egypt = &parsed.mentions[0];
        let germany = &parsed.mentions[1];
        assert_eq!(parsed.governing_cue(egypt.start), Some("from"));
        assert_eq!(parsed.governing_cue(germany.start), Some("to"));
    }

    #[test]
    fn test_cue_scan_stops_at_previous_mention() {
        // "to" governs Paris only; London must not inherit it.
        let parsed = HeuristicParser::new().parse("flights to Paris London");
        assert_eq!(parsed.mentions.len(), 1, "adjacent propns join into one span");
        let parsed = HeuristicParser::new().parse("to Paris and London");
        let london = parsed.mentions.last().cloned();
        if let Some(london) = london {
            assert_eq!(parsed.governing_cue(london.start), None);
        }
    }

    #[test]
    fn test_sentence_initial_stopword_not_a_mention() {
        let parsed = HeuristicParser::new().parse("Find the best hotels");
        assert!(parsed.mentions.is_empty());
    }
}
