use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::model::{
    Candidate, CardinalityReport, ConfidenceTier, Decision, DecisionAction, IncomingRecord,
    ManyToOneGroup, OneToManyRecord, Provenance,
};

// ---------------------------------------------------------------------------
// Automatic resolution
// ---------------------------------------------------------------------------

/// Turn ranked candidates into a decision for one record.
///
/// Only an exact top candidate auto-resolves. Fuzzy matches stay pending
/// for human review unless the caller disables confirmation, in which case
/// the top candidate of any tier is accepted and no-candidate records
/// follow the `skip_unmatched` policy.
pub fn resolve(
    record: &IncomingRecord,
    candidates: Vec<Candidate>,
    config: &EngineConfig,
) -> Decision {
    let mut decision = Decision::new(record);
    decision.candidates = candidates;

    match decision.candidates.first() {
        Some(top) if top.tier == ConfidenceTier::Exact => {
            decision.target_ids = vec![top.entity_id.clone()];
            decision.action = DecisionAction::UseExisting;
            decision.provenance = Provenance::Automatic;
        }
        Some(top) if !config.resolution.require_user_confirmation => {
            decision.target_ids = vec![top.entity_id.clone()];
            decision.action = DecisionAction::UseExisting;
            decision.provenance = Provenance::Automatic;
        }
        None if !config.resolution.require_user_confirmation
            && config.resolution.skip_unmatched =>
        {
            decision.action = DecisionAction::Skip;
        }
        _ => {} // stays pending
    }

    decision
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------
//
// The only legal mutators of a decision after resolution. Each one is
// idempotent and re-derives the action from the target set, so repeated
// overrides never desynchronize from the decision's own state.

/// Toggle an entity's membership in the record's target set (supports
/// one-to-many mappings).
pub fn select_target(decision: &mut Decision, entity_id: &str) {
    if let Some(pos) = decision.target_ids.iter().position(|id| id == entity_id) {
        decision.target_ids.remove(pos);
    } else {
        decision.target_ids.push(entity_id.to_string());
    }
    decision.action = if decision.target_ids.is_empty() {
        DecisionAction::Pending
    } else {
        DecisionAction::UseExisting
    };
    decision.provenance = Provenance::Manual;
}

/// Empty the target set and revert the record to not-yet-decided.
pub fn clear_match(decision: &mut Decision) {
    decision.target_ids.clear();
    decision.action = DecisionAction::Pending;
    decision.provenance = Provenance::Manual;
}

/// Mark the record for creation of a new entity.
pub fn mark_create_new(decision: &mut Decision) {
    decision.target_ids.clear();
    decision.action = DecisionAction::CreateNew;
    decision.provenance = Provenance::Manual;
}

/// Mark the record to be skipped entirely.
pub fn mark_skip(decision: &mut Decision) {
    decision.target_ids.clear();
    decision.action = DecisionAction::Skip;
    decision.provenance = Provenance::Manual;
}

// ---------------------------------------------------------------------------
// Cardinality
// ---------------------------------------------------------------------------

/// Flag many-to-one and one-to-many mappings across the full decision set.
///
/// Run once before execution as a confirmation gate; recomputed from
/// scratch each time, never incremental.
pub fn check_cardinality(decisions: &[Decision]) -> CardinalityReport {
    let mut by_entity: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    let mut one_to_many = Vec::new();

    for decision in decisions {
        if decision.action != DecisionAction::UseExisting {
            continue;
        }
        for id in &decision.target_ids {
            by_entity.entry(id).or_default().push(decision.label());
        }
        if decision.target_ids.len() > 1 {
            one_to_many.push(OneToManyRecord {
                record_label: decision.label(),
                entity_ids: decision.target_ids.clone(),
            });
        }
    }

    let many_to_one = by_entity
        .into_iter()
        .filter(|(_, labels)| labels.len() > 1)
        .map(|(entity_id, record_labels)| ManyToOneGroup {
            entity_id: entity_id.to_string(),
            record_labels,
        })
        .collect();

    CardinalityReport {
        many_to_one,
        one_to_many,
        confirmed: false,
    }
}
