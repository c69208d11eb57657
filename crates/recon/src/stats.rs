use crate::model::{BatchStats, ConfidenceTier, Decision};

/// Compute summary statistics from a decision set. A record is bucketed by
/// its best candidate's tier; records with no offered candidate count as
/// no-match.
pub fn compute_stats(decisions: &[Decision]) -> BatchStats {
    let mut stats = BatchStats {
        total: decisions.len(),
        ..BatchStats::default()
    };

    for decision in decisions {
        match decision.candidates.first().map(|c| c.tier) {
            Some(ConfidenceTier::Exact) => stats.exact_matches += 1,
            Some(ConfidenceTier::High) => stats.high_confidence += 1,
            Some(ConfidenceTier::Medium) => stats.medium_confidence += 1,
            Some(ConfidenceTier::Low) => stats.low_confidence += 1,
            None => stats.no_matches += 1,
        }
    }

    let matched = stats.total - stats.no_matches;
    stats.match_rate = if stats.total == 0 {
        0.0
    } else {
        matched as f64 / stats.total as f64 * 100.0
    };
    stats
}
