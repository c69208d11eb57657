use registrar_core::RegistryEntity;

use crate::config::{EngineConfig, Thresholds};
use crate::model::{Candidate, ConfidenceTier, IncomingRecord};
use crate::similarity;

/// Score a record against the registry snapshot and return ranked
/// candidates: sorted descending by score, capped at `top_k`, nothing below
/// the offer threshold. The snapshot is passed in; the engine never
/// queries the registry itself.
pub fn generate_candidates(
    record: &IncomingRecord,
    snapshot: &[RegistryEntity],
    config: &EngineConfig,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = snapshot
        .iter()
        .filter_map(|entity| {
            let score = similarity::score(&record.name, &entity.name);
            let tier = tier_for(score, &config.thresholds)?;
            if !config.candidates.allow_fuzzy && tier != ConfidenceTier::Exact {
                return None;
            }
            Some(Candidate {
                entity_id: entity.id.clone(),
                score,
                tier,
                display_name: entity.name.clone(),
            })
        })
        .collect();

    // Descending by score; entity id breaks ties so ordering is stable
    // across runs.
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    candidates.truncate(config.candidates.top_k);
    candidates
}

/// Tier for a score, or None when it falls below the offer threshold.
fn tier_for(score: f64, thresholds: &Thresholds) -> Option<ConfidenceTier> {
    if score >= 1.0 {
        Some(ConfidenceTier::Exact)
    } else if score >= thresholds.high {
        Some(ConfidenceTier::High)
    } else if score >= thresholds.medium {
        Some(ConfidenceTier::Medium)
    } else if score >= thresholds.confidence {
        Some(ConfidenceTier::Low)
    } else {
        None
    }
}
