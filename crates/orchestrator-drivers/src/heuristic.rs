//! Complexity heuristic gating the optional cloud planner: a small weighted
//! sum over word count plus reasoning-pattern regex hits, thresholded.

use once_cell::sync::Lazy;
use regex::RegexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Easy,
    Hard,
}

const HARD_THRESHOLD: f64 = 0.6;
const WORD_COUNT_WEIGHT: f64 = 0.01;
const PATTERN_WEIGHT: f64 = 0.3;

static REASONING_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)analy(se|ze|sera) och föreslå",
        r"(?i)utvärdera alternativ",
        r"(?i)optimera (med|utifrån) .*(begränsning|villkor)",
        r"(?i)jämför.*(för|nackdelar|alternativ)",
    ])
    .expect("reasoning pattern set is valid")
});

/// Scores `prompt` and classifies it as [`Complexity::Hard`] once the
/// weighted sum of word count and reasoning-pattern hits crosses
/// [`HARD_THRESHOLD`].
pub fn classify_complexity(prompt: &str) -> Complexity {
    let word_count = prompt.split_whitespace().count() as f64;
    let pattern_hits = REASONING_PATTERNS.matches(prompt).iter().count() as f64;

    let score = (word_count * WORD_COUNT_WEIGHT).min(1.0) + pattern_hits * PATTERN_WEIGHT;

    if score >= HARD_THRESHOLD {
        Complexity::Hard
    } else {
        Complexity::Easy
    }
}
