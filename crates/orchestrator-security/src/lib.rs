//! Heuristic scoring for prompt-injection attempts, and the STRICT-mode gate
//! that turns a high suspicion score on a high-risk intent into a
//! confirmation requirement rather than a silent pass-through.
//!
//! This is deliberately not a classifier: it is a small set of regexes over
//! NFKC-normalized input (so homoglyph substitution doesn't dodge a literal
//! match) plus a threshold. It catches the obvious cases cheaply on every
//! turn; it is not a substitute for a dedicated moderation model.

use once_cell::sync::Lazy;
use regex::RegexSet;
use unicode_normalization::UnicodeNormalization;

/// How much weight a security review carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Whether confirmation is required before acting on a suspicious, high-risk turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// Log suspicious turns but never block them.
    Permissive,
    /// Block high-risk intents that also score as suspicious, pending
    /// explicit user confirmation.
    Strict,
}

const SUSPICION_THRESHOLD: f64 = 0.5;

static INJECTION_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)ignore (all )?(previous|prior|above) instructions",
        r"(?i)disable safety",
        r"(?i)\boverride\b",
        r"(?i)run tool",
        r"(?i)execute command",
        r"(?i)system prompt",
        r"(?i)you are now (in )?(dan|developer) mode",
        r"(?i)do anything now",
    ])
    .expect("injection pattern set is valid")
});

/// Result of scoring one turn's text.
#[derive(Debug, Clone)]
pub struct SecurityVerdict {
    pub suspicion_score: f64,
    pub matched_pattern_count: usize,
    pub requires_confirmation: bool,
}

/// Normalizes `text` to NFKC and scores it against the injection pattern set.
/// Score is `matched_patterns / total_patterns`, clamped to `[0.0, 1.0]`.
pub fn score(text: &str) -> (f64, usize) {
    let normalized: String = text.nfkc().collect();
    let matches = INJECTION_PATTERNS.matches(&normalized).iter().count();
    let total = INJECTION_PATTERNS.len();
    (matches as f64 / total as f64, matches)
}

/// Reviews `text` for injection at the given risk level and mode.
pub fn review(text: &str, risk: RiskLevel, mode: SecurityMode) -> SecurityVerdict {
    let (suspicion_score, matched_pattern_count) = score(text);

    let requires_confirmation = mode == SecurityMode::Strict
        && risk >= RiskLevel::Medium
        && suspicion_score >= SUSPICION_THRESHOLD;

    SecurityVerdict { suspicion_score, matched_pattern_count, requires_confirmation }
}
