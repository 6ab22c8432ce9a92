//! Jaccard token-set similarity for the L2 semantic tier.

use std::collections::HashSet;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Intersection over union of two token sets. `1.0` for two empty sets
/// (vacuously identical), `0.0` when exactly one is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn identical_sets_score_one() {
        let a = set(&["boka", "möte", "imorgon"]);
        assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn disjoint_sets_score_zero() {
        let a = set(&["boka", "möte"]);
        let b = set(&["väder", "idag"]);
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_zero_and_one() {
        let a = set(&["boka", "möte", "imorgon"]);
        let b = set(&["boka", "möte", "idag"]);
        let score = jaccard(&a, &b);
        assert!(score > 0.0 && score < 1.0);
    }
}
