//! `registrar-recon` — Entity reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded records and a registry snapshot,
//! returns ranked candidates, decisions, and reports. All registry
//! mutation goes through the executor's `Registry` seam; no UI, queue, or
//! storage dependencies.

pub mod batch;
pub mod candidates;
pub mod config;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod model;
pub mod registry;
pub mod resolve;
pub mod similarity;
pub mod source;
pub mod stats;

pub use batch::{run_batch, BatchOpts};
pub use candidates::generate_candidates;
pub use config::EngineConfig;
pub use error::ReconError;
pub use executor::{execute, ExecuteOpts, MergeGroup, Registry};
pub use geometry::{aggregate, TargetKey};
pub use model::{
    BatchRun, Candidate, ConfidenceTier, Decision, DecisionAction, ExecutionResult,
    IncomingRecord, Provenance,
};
pub use registry::MemoryRegistry;
pub use resolve::{check_cardinality, clear_match, mark_create_new, mark_skip, resolve, select_target};
