use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use rayon::prelude::*;
use registrar_core::RegistryEntity;

use crate::candidates::generate_candidates;
use crate::config::EngineConfig;
use crate::error::ReconError;
use crate::model::{BatchMeta, BatchRun, Decision, IncomingRecord, Provenance};
use crate::resolve::{check_cardinality, resolve};
use crate::stats::compute_stats;

/// Progress callback: `(processed, total, current record label)`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize, &str);

/// Per-run options. All default to off.
#[derive(Default)]
pub struct BatchOpts<'a> {
    pub progress: Option<ProgressFn<'a>>,
    /// Checked before each chunk of records; a set flag stops the run and
    /// leaves the remaining records with empty pending decisions.
    pub cancel: Option<&'a AtomicBool>,
    /// A previous run of the same batch. Decisions fixed by a human carry
    /// over untouched; automatic ones are recomputed.
    pub prior: Option<BatchRun>,
}

/// Run the resolver across all records against one immutable registry
/// snapshot.
///
/// Records are scored independently in a bounded worker pool; the
/// cardinality check runs after all results are collected (it needs the
/// full decision set). Re-running with an unchanged snapshot and no new
/// overrides yields the same decision set.
pub fn run_batch(
    records: &[IncomingRecord],
    snapshot: &[RegistryEntity],
    config: &EngineConfig,
    opts: &mut BatchOpts,
) -> Result<BatchRun, ReconError> {
    config.validate()?;

    let total = records.len();

    // Manual decisions survive re-runs untouched; everything else is
    // recomputed from the snapshot.
    let mut kept: BTreeMap<usize, Decision> = BTreeMap::new();
    if let Some(prior) = opts.prior.take() {
        for decision in prior.decisions {
            if decision.provenance == Provenance::Manual {
                kept.insert(decision.ordinal, decision);
            }
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.threads)
        .build()
        .map_err(|e| ReconError::ConfigValidation(format!("worker pool: {e}")))?;
    let workers = pool.current_num_threads().max(1);

    info!(
        "batch '{}': {} records against {} entities ({} decisions carried over)",
        config.name,
        total,
        snapshot.len(),
        kept.len()
    );

    let mut decisions: Vec<Decision> = Vec::with_capacity(total);
    let mut cancelled = false;

    for chunk in records.chunks(workers) {
        if is_cancelled(opts.cancel) {
            cancelled = true;
            break;
        }

        let resolved: Vec<Decision> = pool.install(|| {
            chunk
                .par_iter()
                .map(|record| match kept.get(&record.ordinal) {
                    Some(decision) => decision.clone(),
                    None => {
                        let candidates = generate_candidates(record, snapshot, config);
                        resolve(record, candidates, config)
                    }
                })
                .collect()
        });

        for decision in resolved {
            let processed = decisions.len() + 1;
            let label = decision.label();
            debug!("resolved {} -> {}", label, decision.action);
            decisions.push(decision);
            if let Some(progress) = opts.progress.as_mut() {
                progress(processed, total, &label);
            }
        }
    }

    if cancelled {
        info!(
            "batch '{}' cancelled after {} of {} records",
            config.name,
            decisions.len(),
            total
        );
        // Unscored records keep empty pending decisions so the caller sees
        // exactly which ones were never reached.
        for record in &records[decisions.len()..] {
            decisions.push(Decision::new(record));
        }
    }

    let cardinality = check_cardinality(&decisions);
    let stats = compute_stats(&decisions);

    Ok(BatchRun {
        meta: BatchMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        decisions,
        stats,
        cardinality,
        cancelled,
    })
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false)
}
