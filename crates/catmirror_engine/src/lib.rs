//! # catmirror engine
//!
//! Staleness-driven cascading sync of a remote hierarchical catalog into
//! a local store.
//!
//! This crate provides:
//! - Staleness evaluation and fetch planning over the mirrored hierarchy
//! - Mark-and-sweep reconciliation of fetched record sets, scoped per
//!   parent so sweeps never cross units
//! - Parts payload hashing and the elevation parse lifecycle
//! - A run orchestrator that walks levels in dependency order and runs
//!   each level's units as a bounded concurrent wave
//! - A service front door with run admission, a no-parallel guard,
//!   background execution, and cooperative cancellation
//!
//! ## Key invariants
//!
//! - Levels run in dependency order; units within a level are independent
//! - A unit failure is recorded and the run continues; only
//!   configuration, authentication, and cancellation fail the run
//! - Sweeps are scoped to the reconciled parent and never remove rows of
//!   excluded directories
//! - Exclusion cascades to descendants at planning time and is never
//!   overridden by `force`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod orchestrator;
mod parts;
mod reconcile;
mod service;
mod staleness;
mod store;

pub use error::{StoreError, SyncError, SyncResult};
pub use orchestrator::{CancelHandle, EngineConfig, Orchestrator};
pub use parts::{content_hash, process as parse_parts, GlassSpec, PartRecord, ProcessedParts};
pub use reconcile::{
    reconcile_directories, reconcile_elevations, reconcile_phases, reconcile_projects,
    ElevationOutcome, ReconcileOutcome,
};
pub use service::{RunStatus, SyncService};
pub use staleness::{
    elevation_is_stale, is_stale, needs_children_fetch, Evaluator, PlanLevel, PlanUnit,
};
pub use store::{CatalogStore, MemoryStore, StoreResult};
