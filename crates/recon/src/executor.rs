use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use registrar_core::{AttrBag, EntityKind, RegistryEntity};

use crate::error::ReconError;
use crate::model::{
    BatchRun, Decision, DecisionAction, ExecutionError, ExecutionResult, IncomingRecord,
};

// ---------------------------------------------------------------------------
// Registry seam
// ---------------------------------------------------------------------------

/// The registry write seam: the executor is the only engine component that
/// mutates entity state, and it does so only through this trait.
/// Implemented by the caller's backend; `MemoryRegistry` provides the
/// reference semantics.
pub trait Registry {
    fn fetch_snapshot(&self, kind: EntityKind) -> Result<Vec<RegistryEntity>, ReconError>;
    fn create_entity(
        &mut self,
        kind: EntityKind,
        name: &str,
        attrs: &AttrBag,
    ) -> Result<String, ReconError>;
    fn update_entity(&mut self, id: &str, attrs: &AttrBag) -> Result<(), ReconError>;
    /// Consolidate duplicates into the primary: reassign all foreign
    /// references, then remove the duplicates. One logical operation.
    fn merge_entities(&mut self, primary_id: &str, duplicate_ids: &[String])
        -> Result<(), ReconError>;
}

/// A duplicate group confirmed for merging by a human.
#[derive(Debug, Clone)]
pub struct MergeGroup {
    pub primary_id: String,
    pub duplicate_ids: Vec<String>,
}

/// Per-execution options.
pub struct ExecuteOpts<'a> {
    /// Attribute key the record's external identifier is attached under
    /// (e.g. `member_id`).
    pub id_field: &'a str,
    /// Confirmed duplicate groups to merge after creates and updates.
    pub merges: &'a [MergeGroup],
    /// Checked between operations; remaining work is reported, not lost.
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> ExecuteOpts<'a> {
    pub fn new(id_field: &'a str) -> Self {
        Self {
            id_field,
            merges: &[],
            cancel: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Apply a resolved batch to the registry.
///
/// Creates run in record order, then updates grouped by target entity (no
/// concurrency within a group, so two records resolving to the same
/// entity never race), then confirmed merges. Every failure is local to its
/// record or group and aggregated into the result; nothing aborts the
/// batch. Errs only when the cardinality report still awaits confirmation.
pub fn execute(
    records: &[IncomingRecord],
    batch: &BatchRun,
    kind: EntityKind,
    registry: &mut dyn Registry,
    opts: &ExecuteOpts,
) -> Result<ExecutionResult, ReconError> {
    if !batch.cardinality.is_empty() && !batch.cardinality.confirmed {
        return Err(ReconError::UnconfirmedCardinality {
            many_to_one: batch.cardinality.many_to_one.len(),
            one_to_many: batch.cardinality.one_to_many.len(),
        });
    }

    let by_ordinal: BTreeMap<usize, &IncomingRecord> =
        records.iter().map(|r| (r.ordinal, r)).collect();

    // One snapshot up front for conflict checks; values attached during
    // this run are tracked separately so later records in the same group
    // see them.
    let snapshot = registry.fetch_snapshot(kind)?;
    let existing_ids: BTreeMap<&str, Option<&str>> = snapshot
        .iter()
        .map(|e| (e.id.as_str(), e.attrs.get(opts.id_field)))
        .collect();
    let mut attached: BTreeMap<String, String> = BTreeMap::new();

    let mut result = ExecutionResult::default();

    // Partition decisions: creates keep record order, updates group by
    // target entity id.
    let mut creates: Vec<(&IncomingRecord, &Decision)> = Vec::new();
    let mut updates: BTreeMap<&str, Vec<(&IncomingRecord, &Decision)>> = BTreeMap::new();

    for decision in &batch.decisions {
        let Some(record) = by_ordinal.get(&decision.ordinal).copied() else {
            result.errors.push(ExecutionError {
                label: decision.label(),
                message: "decision has no matching record".into(),
            });
            result.skipped += 1;
            continue;
        };
        match decision.action {
            DecisionAction::CreateNew => creates.push((record, decision)),
            DecisionAction::UseExisting => {
                for target in &decision.target_ids {
                    updates.entry(target).or_default().push((record, decision));
                }
            }
            DecisionAction::Skip | DecisionAction::Pending => result.skipped += 1,
        }
    }

    info!(
        "executing batch '{}': {} creates, {} target entities, {} merges",
        batch.meta.config_name,
        creates.len(),
        updates.len(),
        opts.merges.len()
    );

    let mut halted = false;

    for (record, decision) in &creates {
        if is_cancelled(opts.cancel) {
            halted = true;
            result.not_attempted.push(decision.label());
            continue;
        }
        let mut attrs = record.attrs.clone();
        if let Some(external_id) = &record.external_id {
            attrs.insert(opts.id_field, external_id.clone());
        }
        match registry.create_entity(kind, &record.name, &attrs) {
            Ok(id) => {
                debug!("created {} as {}", decision.label(), id);
                result.created += 1;
            }
            Err(e) => {
                warn!("create failed for {}: {e}", decision.label());
                result.errors.push(ExecutionError {
                    label: decision.label(),
                    message: e.to_string(),
                });
            }
        }
    }

    for (target_id, group) in &updates {
        if halted || is_cancelled(opts.cancel) {
            halted = true;
            result
                .not_attempted
                .extend(group.iter().map(|(_, d)| d.label()));
            continue;
        }
        for (record, decision) in group {
            apply_update(
                registry,
                target_id,
                record,
                decision,
                opts.id_field,
                &existing_ids,
                &mut attached,
                &mut result,
            );
        }
    }

    for merge in opts.merges {
        if halted || is_cancelled(opts.cancel) {
            halted = true;
            result
                .not_attempted
                .push(format!("merge into {}", merge.primary_id));
            continue;
        }
        match registry.merge_entities(&merge.primary_id, &merge.duplicate_ids) {
            Ok(()) => result.merged_entities += merge.duplicate_ids.len(),
            Err(e) => {
                // A failed merge never takes the rest of the batch with it.
                warn!("merge into {} failed: {e}", merge.primary_id);
                result.errors.push(ExecutionError {
                    label: format!("merge into {}", merge.primary_id),
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(result)
}

/// Attach the record's attributes to one target entity, refusing to
/// overwrite a conflicting identifying value.
#[allow(clippy::too_many_arguments)]
fn apply_update(
    registry: &mut dyn Registry,
    target_id: &str,
    record: &IncomingRecord,
    decision: &Decision,
    id_field: &str,
    existing_ids: &BTreeMap<&str, Option<&str>>,
    attached: &mut BTreeMap<String, String>,
    result: &mut ExecutionResult,
) {
    let Some(stored) = existing_ids.get(target_id) else {
        result.errors.push(ExecutionError {
            label: decision.label(),
            message: format!("target entity '{target_id}' not in registry snapshot"),
        });
        result.skipped += 1;
        return;
    };

    if let Some(external_id) = &record.external_id {
        // Current value = what the entity carried before the run, or what
        // an earlier record in this run attached.
        let current = attached.get(target_id).map(String::as_str).or(*stored);
        if let Some(current) = current {
            if current != external_id {
                warn!(
                    "conflicting {id_field} on {target_id}: has '{current}', record {} carries '{external_id}'",
                    decision.label()
                );
                result.errors.push(ExecutionError {
                    label: decision.label(),
                    message: format!(
                        "entity '{target_id}' already carries {id_field} '{current}' (record has '{external_id}')"
                    ),
                });
                result.skipped += 1;
                return;
            }
        }
    }

    let mut attrs = record.attrs.clone();
    if let Some(external_id) = &record.external_id {
        attrs.insert(id_field, external_id.clone());
    }
    match registry.update_entity(target_id, &attrs) {
        Ok(()) => {
            if let Some(external_id) = &record.external_id {
                attached.insert(target_id.to_string(), external_id.clone());
            }
            result.updated += 1;
        }
        Err(e) => {
            warn!("update failed for {}: {e}", decision.label());
            result.errors.push(ExecutionError {
                label: decision.label(),
                message: e.to_string(),
            });
        }
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BatchMeta, BatchStats};
    use crate::registry::MemoryRegistry;
    use crate::resolve::{mark_create_new, select_target};

    fn record(ordinal: usize, name: &str, external_id: &str) -> IncomingRecord {
        let mut record = IncomingRecord::new(ordinal, name);
        record.external_id = Some(external_id.to_string());
        record
    }

    fn batch_of(decisions: Vec<Decision>) -> BatchRun {
        BatchRun {
            meta: BatchMeta {
                config_name: "test".into(),
                engine_version: "0".into(),
                run_at: String::new(),
            },
            stats: BatchStats::default(),
            cardinality: crate::resolve::check_cardinality(&decisions),
            decisions,
            cancelled: false,
        }
    }

    #[test]
    fn create_attaches_external_id() {
        let mut registry = MemoryRegistry::new();
        let records = vec![record(0, "Acme Pty Ltd", "M-100")];
        let mut decision = Decision::new(&records[0]);
        mark_create_new(&mut decision);
        let batch = batch_of(vec![decision]);

        let result = execute(
            &records,
            &batch,
            EntityKind::Employer,
            &mut registry,
            &ExecuteOpts::new("member_id"),
        )
        .unwrap();

        assert_eq!(result.created, 1);
        assert!(result.errors.is_empty());
        let snapshot = registry.fetch_snapshot(EntityKind::Employer).unwrap();
        assert_eq!(snapshot[0].attrs.get("member_id"), Some("M-100"));
    }

    #[test]
    fn conflicting_external_id_is_error_never_overwritten() {
        let mut registry = MemoryRegistry::new();
        let mut attrs = AttrBag::new();
        attrs.insert("member_id", "M-OLD");
        let target = registry.seed_with_attrs(EntityKind::Employer, "Acme Pty Ltd", attrs);

        let records = vec![record(0, "Acme Pty Ltd", "M-NEW")];
        let mut decision = Decision::new(&records[0]);
        select_target(&mut decision, &target);
        let batch = batch_of(vec![decision]);

        let result = execute(
            &records,
            &batch,
            EntityKind::Employer,
            &mut registry,
            &ExecuteOpts::new("member_id"),
        )
        .unwrap();

        assert_eq!(result.updated, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("M-OLD"));
        assert_eq!(
            registry.entity(&target).unwrap().attrs.get("member_id"),
            Some("M-OLD")
        );
    }

    #[test]
    fn matching_external_id_updates_cleanly() {
        let mut registry = MemoryRegistry::new();
        let mut attrs = AttrBag::new();
        attrs.insert("member_id", "M-100");
        let target = registry.seed_with_attrs(EntityKind::Employer, "Acme Pty Ltd", attrs);

        let records = vec![record(0, "Acme Pty Ltd", "M-100")];
        let mut decision = Decision::new(&records[0]);
        select_target(&mut decision, &target);
        let batch = batch_of(vec![decision]);

        let result = execute(
            &records,
            &batch,
            EntityKind::Employer,
            &mut registry,
            &ExecuteOpts::new("member_id"),
        )
        .unwrap();

        assert_eq!(result.updated, 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn second_record_in_same_run_sees_attached_id() {
        // Two records resolving to the same entity with different external
        // ids: the first attaches, the second must conflict even though
        // the prefetched snapshot predates the first update.
        let mut registry = MemoryRegistry::new();
        let target = registry.seed(EntityKind::Employer, "Acme Pty Ltd");

        let records = vec![
            record(0, "Acme Pty Ltd", "M-1"),
            record(1, "ACME PTY LTD", "M-2"),
        ];
        let mut a = Decision::new(&records[0]);
        select_target(&mut a, &target);
        let mut b = Decision::new(&records[1]);
        select_target(&mut b, &target);

        let mut batch = batch_of(vec![a, b]);
        batch.cardinality.confirmed = true; // many-to-one acknowledged

        let result = execute(
            &records,
            &batch,
            EntityKind::Employer,
            &mut registry,
            &ExecuteOpts::new("member_id"),
        )
        .unwrap();

        assert_eq!(result.updated, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            registry.entity(&target).unwrap().attrs.get("member_id"),
            Some("M-1")
        );
    }

    #[test]
    fn unconfirmed_cardinality_blocks_execution() {
        let mut registry = MemoryRegistry::new();
        let target = registry.seed(EntityKind::Employer, "Acme");

        let records = vec![record(0, "Acme East", "M-1"), record(1, "Acme West", "M-2")];
        let mut a = Decision::new(&records[0]);
        select_target(&mut a, &target);
        let mut b = Decision::new(&records[1]);
        select_target(&mut b, &target);
        let batch = batch_of(vec![a, b]);

        let err = execute(
            &records,
            &batch,
            EntityKind::Employer,
            &mut registry,
            &ExecuteOpts::new("member_id"),
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::UnconfirmedCardinality { .. }));
    }

    #[test]
    fn failed_merge_does_not_abort_batch() {
        let mut registry = MemoryRegistry::new();
        let primary = registry.seed(EntityKind::Employer, "Acme");
        let duplicate = registry.seed(EntityKind::Employer, "Acme 2");

        let records = vec![record(0, "New Employer", "M-9")];
        let mut decision = Decision::new(&records[0]);
        mark_create_new(&mut decision);
        let batch = batch_of(vec![decision]);

        let merges = vec![
            MergeGroup {
                primary_id: "missing".into(),
                duplicate_ids: vec![duplicate.clone()],
            },
            MergeGroup {
                primary_id: primary.clone(),
                duplicate_ids: vec![duplicate.clone()],
            },
        ];
        let opts = ExecuteOpts {
            id_field: "member_id",
            merges: &merges,
            cancel: None,
        };

        let result = execute(&records, &batch, EntityKind::Employer, &mut registry, &opts).unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.merged_entities, 1);
        assert!(registry.entity(&duplicate).is_none());
    }

    #[test]
    fn cancellation_reports_not_attempted() {
        let mut registry = MemoryRegistry::new();
        let records = vec![record(0, "Acme", "M-1"), record(1, "Zenith", "M-2")];
        let mut a = Decision::new(&records[0]);
        mark_create_new(&mut a);
        let mut b = Decision::new(&records[1]);
        mark_create_new(&mut b);
        let batch = batch_of(vec![a, b]);

        let cancel = AtomicBool::new(true);
        let opts = ExecuteOpts {
            id_field: "member_id",
            merges: &[],
            cancel: Some(&cancel),
        };
        let result = execute(&records, &batch, EntityKind::Employer, &mut registry, &opts).unwrap();

        assert_eq!(result.created, 0);
        assert_eq!(result.not_attempted.len(), 2);
        assert!(registry.is_empty());
    }
}
