//! Mirrored catalog entities.
//!
//! All entities carry the same sync bookkeeping:
//!
//! - `last_synced_at` — when this row was last reconciled against a fetch
//! - `remote_changed_at` — the remote change marker from that fetch
//! - `children_synced_at` — when this entity's children were last fetched,
//!   tracked separately so reconciling the row itself never masks the
//!   child-fetch decision
//! - `generation` — mark-and-sweep stamp owned by the reconciliation engine

use crate::ids::RemoteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory in the remote catalog tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    /// Remote identifier, unique across directories.
    pub remote_id: RemoteId,
    /// Display name.
    pub name: String,
    /// Full hierarchical path, `/`-separated.
    pub path: String,
    /// Parent directory, `None` for roots.
    pub parent_id: Option<RemoteId>,
    /// Administrative flag: skip this directory and every descendant.
    ///
    /// The only field mutable outside a sync run. Descendant exclusion is
    /// computed at read time by walking ancestors, never stored.
    pub exclude_from_sync: bool,
    /// When this row was last reconciled.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Remote change marker seen at the last reconcile.
    pub remote_changed_at: Option<DateTime<Utc>>,
    /// When this directory's projects were last fetched.
    pub children_synced_at: Option<DateTime<Utc>>,
    /// Mark-and-sweep generation stamp.
    pub generation: u64,
}

/// A project owned by a directory.
///
/// Identity is `(directory_id, remote_id)`; the remote source may reuse
/// project identifiers across directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Remote identifier, unique within the owning directory.
    pub remote_id: RemoteId,
    /// Owning directory.
    pub directory_id: RemoteId,
    /// Display name.
    pub name: String,
    /// Remote-sourced status string.
    pub status: String,
    /// When this row was last reconciled.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Remote change marker seen at the last reconcile.
    pub remote_changed_at: Option<DateTime<Utc>>,
    /// When this project's phases were last fetched.
    pub children_synced_at: Option<DateTime<Utc>>,
    /// Mark-and-sweep generation stamp.
    pub generation: u64,
}

/// A phase owned by a project.
///
/// Identity is `(project_id, remote_id)`. Phase identifiers may be
/// placeholder values shared by many phases, so no single-column
/// uniqueness is ever enforced on `remote_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Remote identifier, possibly a placeholder.
    pub remote_id: RemoteId,
    /// Owning project.
    pub project_id: RemoteId,
    /// Display name.
    pub name: String,
    /// Remote-sourced status string.
    pub status: String,
    /// When this row was last reconciled.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Remote change marker seen at the last reconcile.
    pub remote_changed_at: Option<DateTime<Utc>>,
    /// When this phase's elevations were last fetched.
    pub children_synced_at: Option<DateTime<Utc>>,
    /// Mark-and-sweep generation stamp.
    pub generation: u64,
}

/// Parse lifecycle of an elevation's attached parts payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseState {
    /// Payload present but not yet processed.
    Pending,
    /// Processing started.
    InProgress,
    /// Every part row parsed.
    Success,
    /// A processing attempt was lost before reaching a terminal state
    /// (the run died mid-parse); the next run retries it.
    Failed,
    /// Some part rows parsed, some were invalid.
    Partial,
    /// Payload undecodable or structurally wrong; retrying is pointless
    /// until the payload changes.
    ValidationFailed,
}

impl ParseState {
    /// Returns true if this state ends the lifecycle for the current
    /// payload hash.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParseState::Success | ParseState::Partial | ParseState::ValidationFailed
        )
    }

    /// Returns true if the lifecycle may move from `self` to `next`.
    ///
    /// `Pending` is reachable from anywhere because a changed payload hash
    /// resets the lifecycle.
    pub fn can_transition_to(&self, next: ParseState) -> bool {
        if next == ParseState::Pending {
            return true;
        }
        match self {
            ParseState::Pending => next == ParseState::InProgress,
            ParseState::InProgress => matches!(
                next,
                ParseState::Success
                    | ParseState::Failed
                    | ParseState::Partial
                    | ParseState::ValidationFailed
            ),
            ParseState::Failed => next == ParseState::InProgress,
            ParseState::Success | ParseState::Partial | ParseState::ValidationFailed => false,
        }
    }
}

/// An elevation owned by a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elevation {
    /// Remote identifier, unique within the owning phase.
    pub remote_id: RemoteId,
    /// Owning phase.
    pub phase_id: RemoteId,
    /// Owning project (denormalized for scope queries).
    pub project_id: RemoteId,
    /// Display name.
    pub name: String,
    /// Width in millimetres, if reported.
    pub width_mm: Option<f64>,
    /// Height in millimetres, if reported.
    pub height_mm: Option<f64>,
    /// Free-form description.
    pub description: Option<String>,
    /// Parts payload parse state.
    pub parse_state: ParseState,
    /// Content hash (hex sha256) of the parts payload at the last fetch.
    ///
    /// Change detection independent of timestamps: a differing hash makes
    /// the elevation stale even when markers agree.
    pub parts_hash: Option<String>,
    /// Parse attempts lost to interrupted runs for the current payload.
    /// Bumped when a row is found `InProgress` and moved to `Failed`.
    pub parse_retries: u32,
    /// Error detail from the last failed or partial parse.
    pub last_parse_error: Option<String>,
    /// When this row was last reconciled.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Remote change marker seen at the last reconcile.
    pub remote_changed_at: Option<DateTime<Utc>>,
    /// Mark-and-sweep generation stamp.
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_state_transitions() {
        assert!(ParseState::Pending.can_transition_to(ParseState::InProgress));
        assert!(ParseState::InProgress.can_transition_to(ParseState::Success));
        assert!(ParseState::InProgress.can_transition_to(ParseState::ValidationFailed));
        assert!(ParseState::Failed.can_transition_to(ParseState::InProgress));
        assert!(!ParseState::Success.can_transition_to(ParseState::InProgress));
        assert!(!ParseState::Pending.can_transition_to(ParseState::Success));
    }

    #[test]
    fn changed_payload_resets_any_state() {
        for state in [
            ParseState::Success,
            ParseState::Partial,
            ParseState::ValidationFailed,
            ParseState::Failed,
        ] {
            assert!(state.can_transition_to(ParseState::Pending));
        }
    }

    #[test]
    fn terminal_states() {
        assert!(ParseState::Success.is_terminal());
        assert!(ParseState::ValidationFailed.is_terminal());
        assert!(!ParseState::Failed.is_terminal());
        assert!(!ParseState::Pending.is_terminal());
    }
}
