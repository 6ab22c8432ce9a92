//! Routing policy: scores a turn's text against three keyword-pattern
//! families and picks a class, subject to (in priority order) a forced
//! route, an NLU hint, a small micro-tier nudge, and quota enforcement.
//!
//! No external I/O happens here; the contract is a bounded-time pure
//! function of the input text plus the quota tracker's current state.

use once_cell::sync::Lazy;
use orchestrator_quota::{QuotaTracker, RouteFamily};
use regex::RegexSet;

/// The cost/latency tier a turn is routed to. Distinct from
/// [`orchestrator_quota::RouteFamily`], which only tracks the three driver
/// tiers — `Cache` is a pipeline-level outcome the router itself never
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Micro,
    Planner,
    Deep,
}

impl RouteClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Micro => "micro",
            Self::Planner => "planner",
            Self::Deep => "deep",
        }
    }

    /// Inverse of [`RouteClass::as_str`]; `None` for anything else, which
    /// callers parsing an external hint (e.g. a bandit response) should
    /// treat as "no opinion" rather than a hard error.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "micro" => Some(Self::Micro),
            "planner" => Some(Self::Planner),
            "deep" => Some(Self::Deep),
            _ => None,
        }
    }

    fn family(self) -> RouteFamily {
        match self {
            Self::Micro => RouteFamily::Micro,
            Self::Planner => RouteFamily::Planner,
            Self::Deep => RouteFamily::Deep,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Features {
    char_length: usize,
    word_count: usize,
    has_question_mark: bool,
    has_exclamation: bool,
    has_digits: bool,
    has_url: bool,
    micro_matches: usize,
    planner_matches: usize,
    deep_matches: usize,
}

/// Outcome of a routing decision, including the raw feature counts for
/// debugging and the human-readable `reason` surfaced in telemetry.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub class: RouteClass,
    pub confidence: f64,
    pub reason: String,
}

static MICRO_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)^(hej|hallå|tja|god morgon|god kväll)\b",
        r"(?i)\bvad är klockan\b",
        r"(?i)\bvädret\b",
        r"(?i)^(ja|nej|tack|ok)\b",
        r"(?i)\bkom ihåg\b",
    ])
    .expect("micro pattern set is valid")
});

static PLANNER_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\bboka\b",
        r"(?i)\bskicka\b",
        r"(?i)\bvisa\b",
        r"(?i)\bskapa\b",
        r"(?i)\bändra\b",
        r"(?i)\bsök(a|er)?\b",
    ])
    .expect("planner pattern set is valid")
});

static DEEP_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)\bförklara\b",
        r"(?i)\bsammanfatta\b",
        r"(?i)\bjämför\b",
        r"(?i)\borsak(en)?\b",
        r"(?i)\brekommendera\b",
        r"(?i)\bvarför\b",
    ])
    .expect("deep pattern set is valid")
});

fn extract_features(text: &str) -> Features {
    Features {
        char_length: text.chars().count(),
        word_count: text.split_whitespace().count(),
        has_question_mark: text.contains('?'),
        has_exclamation: text.contains('!'),
        has_digits: text.chars().any(|c| c.is_ascii_digit()),
        has_url: text.contains("http://") || text.contains("https://"),
        micro_matches: MICRO_PATTERNS.matches(text).iter().count(),
        planner_matches: PLANNER_PATTERNS.matches(text).iter().count(),
        deep_matches: DEEP_PATTERNS.matches(text).iter().count(),
    }
}

/// Per-class base score: `pattern_matches * 2` plus length-bucket and
/// interaction bonuses. The specific bonus weights are opaque tuning
/// constants, not load-bearing semantics.
fn base_scores(features: &Features) -> [(RouteClass, f64); 3] {
    let length_bonus_micro = if features.word_count > 0 && features.char_length <= 20 { 1.0 } else { 0.0 };
    let length_bonus_deep = if features.char_length > 80 { 1.0 } else { 0.0 };
    let question_bonus_deep = if features.has_question_mark && features.word_count > 6 { 0.5 } else { 0.0 };
    let exclamation_bonus_micro = if features.has_exclamation { 0.5 } else { 0.0 };

    [
        (RouteClass::Micro, features.micro_matches as f64 * 2.0 + length_bonus_micro + exclamation_bonus_micro),
        (RouteClass::Planner, features.planner_matches as f64 * 2.0),
        (RouteClass::Deep, features.deep_matches as f64 * 2.0 + length_bonus_deep + question_bonus_deep),
    ]
}

/// An NLU hint strong enough to override the keyword score.
#[derive(Debug, Clone, Copy)]
pub struct NluHint {
    pub class: RouteClass,
    pub confidence: f64,
}

const NLU_OVERRIDE_THRESHOLD: f64 = 0.7;
const MICRO_NUDGE_THRESHOLD: f64 = 0.3;

/// The keyword-scoring half of [`decide`]: reads `quota` (to apply the
/// micro-quota nudge) but never records to it. Pure and synchronous, so the
/// pipeline can run it alongside the NLU call instead of after it; `combine`
/// folds in the forced-route/NLU-hint overrides once both are ready.
pub fn score_text(text: &str, quota: &QuotaTracker) -> RouteDecision {
    let features = extract_features(text);
    let mut scores = base_scores(&features);

    // Micro preference nudge: favor the cheap path when it already has a
    // non-trivial score, before quota has a chance to push traffic away.
    let micro_total: f64 = scores.iter().map(|(_, s)| s).sum();
    let normalized_micro = scores[0].1 / micro_total.max(1.0);
    if normalized_micro > MICRO_NUDGE_THRESHOLD {
        scores[0].1 *= 1.5;
        scores[1].1 *= 0.5;
    }

    let mut reason = "keyword_score".to_string();
    if quota.exceeded(RouteFamily::Micro) {
        scores[0].1 *= 0.1;
        scores[1].1 *= 3.0;
        reason = "MICRO quota exceeded".to_string();
    } else if normalized_micro > MICRO_NUDGE_THRESHOLD {
        scores[0].1 *= 1.2;
    }

    // Planner wins any tie for the top score: it accepts an equal score
    // (`>=`) while the other classes only overtake a strictly higher one.
    let (class, best_score) = scores
        .iter()
        .fold((RouteClass::Planner, f64::MIN), |(best_class, best_score), &(class, score)| {
            let overtakes = if class == RouteClass::Planner { score >= best_score } else { score > best_score };
            if overtakes {
                (class, score)
            } else {
                (best_class, best_score)
            }
        });

    let total: f64 = scores.iter().map(|(_, s)| s.max(0.0)).sum();
    let confidence = if total > 0.0 { (best_score.max(0.0) / total).clamp(0.0, 1.0) } else { 0.0 };

    RouteDecision { class, confidence, reason }
}

/// Folds the forced-route and NLU-hint overrides onto a precomputed
/// keyword `base` decision, recording exactly one quota entry for whichever
/// family is ultimately chosen.
///
/// Override priority: `forced_route` > `nlu_hint` (above threshold) >
/// `base`.
pub fn combine(forced_route: Option<RouteClass>, nlu_hint: Option<NluHint>, base: RouteDecision, quota: &QuotaTracker) -> RouteDecision {
    if let Some(class) = forced_route {
        quota.record(class.family());
        return RouteDecision { class, confidence: 1.0, reason: "forced_route".to_string() };
    }

    if let Some(hint) = nlu_hint {
        if hint.confidence >= NLU_OVERRIDE_THRESHOLD {
            quota.record(hint.class.family());
            return RouteDecision {
                class: hint.class,
                confidence: hint.confidence,
                reason: "nlu_hint_override".to_string(),
            };
        }
    }

    quota.record(base.class.family());
    base
}

/// Scores `text`, applies the override chain, records the decision in
/// `quota`, and returns the final [`RouteDecision`]. Equivalent to calling
/// [`score_text`] followed by [`combine`]; callers that can run the NLU call
/// concurrently with the keyword scoring should call those directly instead.
pub fn decide(
    text: &str,
    forced_route: Option<RouteClass>,
    nlu_hint: Option<NluHint>,
    quota: &QuotaTracker,
) -> RouteDecision {
    let base = score_text(text, quota);
    combine(forced_route, nlu_hint, base, quota)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_quota() -> QuotaTracker {
        QuotaTracker::new(
            orchestrator_quota::QuotaConfig::builder()
                .max_share(RouteFamily::Micro, 0.2)
                .minimum_decisions(10)
                .build(),
        )
    }

    #[test]
    fn forced_route_always_wins() {
        let quota = fresh_quota();
        let decision = decide("förklara varför himlen är blå", Some(RouteClass::Micro), None, &quota);
        assert_eq!(decision.class, RouteClass::Micro);
        assert_eq!(decision.reason, "forced_route");
    }

    #[test]
    fn high_confidence_nlu_hint_overrides_keyword_score() {
        let quota = fresh_quota();
        let hint = NluHint { class: RouteClass::Deep, confidence: 0.9 };
        let decision = decide("hej", None, Some(hint), &quota);
        assert_eq!(decision.class, RouteClass::Deep);
        assert_eq!(decision.reason, "nlu_hint_override");
    }

    #[test]
    fn low_confidence_nlu_hint_does_not_override() {
        let quota = fresh_quota();
        let hint = NluHint { class: RouteClass::Deep, confidence: 0.4 };
        let decision = decide("hej!", None, Some(hint), &quota);
        assert_eq!(decision.class, RouteClass::Micro);
    }

    #[test]
    fn greeting_routes_to_micro() {
        let quota = fresh_quota();
        let decision = decide("Hej!", None, None, &quota);
        assert_eq!(decision.class, RouteClass::Micro);
    }

    #[test]
    fn action_verb_routes_to_planner() {
        let quota = fresh_quota();
        let decision = decide("boka ett möte imorgon", None, None, &quota);
        assert_eq!(decision.class, RouteClass::Planner);
    }

    #[test]
    fn analytical_request_routes_to_deep() {
        let quota = fresh_quota();
        let decision = decide(
            "kan du förklara och jämföra varför dessa två strategier skiljer sig åt så mycket i praktiken",
            None,
            None,
            &quota,
        );
        assert_eq!(decision.class, RouteClass::Deep);
    }

    #[test]
    fn exceeding_micro_quota_forces_the_decision_away_from_micro() {
        let quota = fresh_quota();
        for _ in 0..9 {
            quota.record(RouteFamily::Micro);
        }

        let decision = decide("hej", None, None, &quota);
        assert_ne!(decision.class, RouteClass::Micro);
        assert_eq!(decision.reason, "MICRO quota exceeded");
    }

    #[test]
    fn ambiguous_text_ties_resolve_to_planner() {
        let quota = fresh_quota();
        let decision = decide("   ", None, None, &quota);
        assert_eq!(decision.class, RouteClass::Planner);
    }
}
