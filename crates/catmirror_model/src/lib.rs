//! # catmirror model
//!
//! Shared data types for the catmirror sync engine.
//!
//! This crate defines:
//! - Identifiers (`RemoteId`, `RunId`) and the hierarchy levels
//! - The four mirrored entities (directory, project, phase, elevation)
//!   with their sync bookkeeping fields
//! - Run records (`SyncRun`, `UnitOutcome`) and the run state machine types
//! - Append-only audit records (`SyncLogEntry`)
//! - Remote record DTOs as returned by the catalog API
//!
//! ## Key invariants
//!
//! - Entity identity is `(remote_id, parent)` — remote identifiers are never
//!   assumed globally unique, and phase identifiers may legitimately be
//!   placeholders shared across projects
//! - Exclusion is stored only on directories; descendants inherit it at
//!   read time
//! - `SyncRun` and `SyncLogEntry` are finalized once and never mutated
//!   afterwards except for the run state transition

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod entity;
mod ids;
mod remote;
mod run;

pub use audit::{AuditOperation, SyncLogEntry};
pub use entity::{Directory, Elevation, ParseState, Phase, Project};
pub use ids::{HierarchyLevel, RemoteId, RunId};
pub use remote::{
    RemoteDirectory, RemoteElevation, RemotePhase, RemoteProject, RemoteRecordSet, Scope,
};
pub use run::{RunDescriptor, RunHealth, RunState, SyncRun, SyncType, UnitOutcome, UnitStatus};
