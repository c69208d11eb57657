use std::fmt;

use registrar_core::{AttrBag, Polygon};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One externally-sourced row to reconcile against the registry.
///
/// Constructed at the boundary (see `source`); any record reaching the
/// engine has a usable name.
#[derive(Debug, Clone)]
pub struct IncomingRecord {
    /// Position in the source batch, for stable ordering and error labels.
    pub ordinal: usize,
    pub name: String,
    /// Domain-specific external identifier (e.g. a third-party membership
    /// id), attached to the matched or created entity on execution.
    pub external_id: Option<String>,
    /// Additional attributes to apply once resolved.
    pub attrs: AttrBag,
    /// Spatial variant payload: the record's already-validated boundary.
    pub polygon: Option<Polygon>,
}

impl IncomingRecord {
    pub fn new(ordinal: usize, name: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            external_id: None,
            attrs: AttrBag::new(),
            polygon: None,
        }
    }

    /// Label used in progress reporting and error lists.
    pub fn label(&self) -> String {
        format!("row {}: {}", self.ordinal + 1, self.name)
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Discrete confidence bucket derived from a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Exact,
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A scored association between one incoming record and one registry entity.
/// Ephemeral: recomputed per resolution pass, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub entity_id: String,
    pub score: f64,
    pub tier: ConfidenceTier,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Pending,
    UseExisting,
    CreateNew,
    Skip,
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::UseExisting => write!(f, "use_existing"),
            Self::CreateNew => write!(f, "create_new"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Whether the decision was reached automatically or fixed by a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Automatic,
    Manual,
}

/// The resolved outcome for one incoming record.
///
/// Invariants: `UseExisting` carries at least one target id; `CreateNew`
/// carries none. Flags like `can_clear` are derived from the target set,
/// never tracked separately, so overrides cannot desynchronize from state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub ordinal: usize,
    pub record_name: String,
    pub action: DecisionAction,
    pub target_ids: Vec<String>,
    pub provenance: Provenance,
    pub candidates: Vec<Candidate>,
}

impl Decision {
    /// The empty decision every record starts with.
    pub fn new(record: &IncomingRecord) -> Self {
        Self {
            ordinal: record.ordinal,
            record_name: record.name.clone(),
            action: DecisionAction::Pending,
            target_ids: Vec::new(),
            provenance: Provenance::Automatic,
            candidates: Vec::new(),
        }
    }

    pub fn label(&self) -> String {
        format!("row {}: {}", self.ordinal + 1, self.record_name)
    }

    /// A match can be cleared once at least one target is attached.
    pub fn can_clear(&self) -> bool {
        !self.target_ids.is_empty()
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.action, DecisionAction::Pending)
    }
}

// ---------------------------------------------------------------------------
// Cardinality
// ---------------------------------------------------------------------------

/// One registry entity targeted by more than one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManyToOneGroup {
    pub entity_id: String,
    pub record_labels: Vec<String>,
}

/// One record deliberately mapped to more than one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneToManyRecord {
    pub record_label: String,
    pub entity_ids: Vec<String>,
}

/// Non-trivial mappings surfaced for explicit confirmation before the
/// executor mutates the registry. Recomputed from scratch each pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CardinalityReport {
    pub many_to_one: Vec<ManyToOneGroup>,
    pub one_to_many: Vec<OneToManyRecord>,
    /// Set by the caller once a human has acknowledged the groups.
    pub confirmed: bool,
}

impl CardinalityReport {
    pub fn is_empty(&self) -> bool {
        self.many_to_one.is_empty() && self.one_to_many.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Batch output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub exact_matches: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub no_matches: usize,
    /// Percentage of records with at least one offered candidate.
    pub match_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

/// The decision set plus aggregate statistics for one reconciliation
/// session. Discarded after execution or abandonment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRun {
    pub meta: BatchMeta,
    pub decisions: Vec<Decision>,
    pub stats: BatchStats,
    pub cardinality: CardinalityReport,
    /// True when the run stopped at a cancellation check; unscored records
    /// keep their empty pending decisions.
    pub cancelled: bool,
}

impl BatchRun {
    /// Report form for rendering or logging by the caller.
    pub fn to_json(&self) -> Result<String, crate::error::ReconError> {
        serde_json::to_string_pretty(self).map_err(|e| crate::error::ReconError::Io(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Execution output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionError {
    pub label: String,
    pub message: String,
}

/// Outcome of one executor pass. Failures are aggregated here, never
/// thrown; the worst case is a run that reports zero successes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<ExecutionError>,
    pub merged_entities: usize,
    /// Labels not reached before cancellation. Partial batches always
    /// report exactly what was and was not attempted.
    pub not_attempted: Vec<String>,
}

impl ExecutionResult {
    pub fn to_json(&self) -> Result<String, crate::error::ReconError> {
        serde_json::to_string_pretty(self).map_err(|e| crate::error::ReconError::Io(e.to_string()))
    }
}
