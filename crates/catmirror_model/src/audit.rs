//! Append-only audit records.

use crate::ids::{HierarchyLevel, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of operation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// Run entered `Running`.
    RunStarted,
    /// Login against the remote catalog.
    Authenticate,
    /// Fetch of one unit's child records.
    FetchLevel,
    /// Reconcile of one fetched record set.
    Reconcile,
    /// Parts payload processing for one elevation.
    ParseParts,
    /// Run reached a terminal state.
    RunFinished,
    /// Cooperative cancellation was observed.
    Cancelled,
}

/// One append-only audit record.
///
/// Entries are created during a run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Run the entry belongs to.
    pub run_id: RunId,
    /// When the operation finished.
    pub at: DateTime<Utc>,
    /// What happened.
    pub operation: AuditOperation,
    /// Hierarchy level, when the operation targets one.
    pub level: Option<HierarchyLevel>,
    /// Target entity or scope label.
    pub target: Option<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error detail on failure.
    pub error: Option<String>,
    /// Records processed by the operation.
    pub processed: u64,
}

impl SyncLogEntry {
    /// Creates a successful entry.
    pub fn success(run_id: RunId, operation: AuditOperation) -> Self {
        Self {
            run_id,
            at: Utc::now(),
            operation,
            level: None,
            target: None,
            duration_ms: 0,
            success: true,
            error: None,
            processed: 0,
        }
    }

    /// Creates a failed entry with error detail.
    pub fn failure(run_id: RunId, operation: AuditOperation, error: impl Into<String>) -> Self {
        Self {
            run_id,
            at: Utc::now(),
            operation,
            level: None,
            target: None,
            duration_ms: 0,
            success: false,
            error: Some(error.into()),
            processed: 0,
        }
    }

    /// Sets the hierarchy level.
    pub fn with_level(mut self, level: HierarchyLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the target label.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the duration.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sets the processed count.
    pub fn with_processed(mut self, processed: u64) -> Self {
        self.processed = processed;
        self
    }
}
