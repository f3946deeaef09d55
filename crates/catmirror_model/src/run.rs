//! Sync run records and the run state machine types.

use crate::ids::{HierarchyLevel, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a run synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Directory tree only.
    Directories,
    /// Projects of known, non-excluded directories.
    Projects,
    /// Phases of known projects.
    Phases,
    /// Elevations of known phases.
    Elevations,
    /// The whole hierarchy, level by level.
    Full,
}

impl SyncType {
    /// Returns the hierarchy levels this run processes, in dependency order.
    pub fn levels(&self) -> &'static [HierarchyLevel] {
        match self {
            SyncType::Directories => &[HierarchyLevel::Directory],
            SyncType::Projects => &[HierarchyLevel::Project],
            SyncType::Phases => &[HierarchyLevel::Phase],
            SyncType::Elevations => &[HierarchyLevel::Elevation],
            SyncType::Full => &[
                HierarchyLevel::Directory,
                HierarchyLevel::Project,
                HierarchyLevel::Phase,
                HierarchyLevel::Elevation,
            ],
        }
    }

    /// Returns true if two run scopes touch any common level.
    ///
    /// Used by the no-parallel guard: overlapping scopes must not run
    /// concurrently.
    pub fn overlaps(&self, other: SyncType) -> bool {
        self.levels().iter().any(|l| other.levels().contains(l))
    }

    /// Returns the scope name as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Directories => "directories",
            SyncType::Projects => "projects",
            SyncType::Phases => "phases",
            SyncType::Elevations => "elevations",
            SyncType::Full => "full",
        }
    }
}

/// The state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, not yet started.
    Draft,
    /// Levels are being processed.
    Running,
    /// Every level resolved; individual units may still have errored.
    Completed,
    /// Aborted by a run-level fatal (configuration, authentication,
    /// cancellation).
    Failed,
}

impl RunState {
    /// Returns true if the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Returns true if the run may move from `self` to `next`.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Draft, RunState::Running)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Failed)
        )
    }
}

/// Outcome of one unit of work within a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum UnitStatus {
    /// The unit's fetch and reconcile succeeded.
    Success {
        /// Rows created.
        created: u64,
        /// Rows updated in place.
        updated: u64,
        /// Rows swept.
        removed: u64,
    },
    /// The unit's own fetch succeeded but some children failed
    /// (e.g. parts payloads that would not parse).
    Partial {
        /// Rows created.
        created: u64,
        /// Rows updated in place.
        updated: u64,
        /// Rows swept.
        removed: u64,
        /// Children that failed processing.
        failed_children: u64,
        /// Detail of the first failure.
        message: String,
    },
    /// The unit failed; the run continues.
    Error {
        /// Error detail.
        message: String,
    },
}

impl UnitStatus {
    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, UnitStatus::Success { .. })
    }

    /// Returns true for `Error`.
    pub fn is_error(&self) -> bool {
        matches!(self, UnitStatus::Error { .. })
    }
}

/// Recorded outcome of one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    /// Level the unit belongs to.
    pub level: HierarchyLevel,
    /// Label of the fetched scope (parent id, or "root").
    pub unit: String,
    /// What happened.
    pub status: UnitStatus,
    /// Wall-clock duration of the unit in milliseconds.
    pub duration_ms: u64,
}

/// Request to start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// Scope of the run.
    pub sync_type: SyncType,
    /// Bypass staleness checks and fetch everything in scope.
    pub force: bool,
}

impl RunDescriptor {
    /// Creates a descriptor for a normal (staleness-driven) run.
    pub fn new(sync_type: SyncType) -> Self {
        Self {
            sync_type,
            force: false,
        }
    }

    /// Creates a descriptor that bypasses staleness checks.
    pub fn forced(sync_type: SyncType) -> Self {
        Self {
            sync_type,
            force: true,
        }
    }
}

/// One execution of the cascading sync orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    /// Run identifier.
    pub id: RunId,
    /// Scope of the run.
    pub sync_type: SyncType,
    /// Current state.
    pub state: RunState,
    /// Whether staleness checks were bypassed.
    pub force: bool,
    /// When the run entered `Running`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Ordered per-unit outcomes.
    pub outcomes: Vec<UnitOutcome>,
    /// Detail of the run-level fatal, if the run failed.
    pub fatal_error: Option<String>,
}

impl SyncRun {
    /// Creates a draft run.
    pub fn new(descriptor: RunDescriptor) -> Self {
        Self {
            id: RunId::new(),
            sync_type: descriptor.sync_type,
            state: RunState::Draft,
            force: descriptor.force,
            started_at: None,
            finished_at: None,
            outcomes: Vec::new(),
            fatal_error: None,
        }
    }

    /// Returns true if any recorded unit errored or was partial.
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.status.is_success())
    }

    /// Total rows created across units.
    pub fn total_created(&self) -> u64 {
        self.sum(|s| match s {
            UnitStatus::Success { created, .. } | UnitStatus::Partial { created, .. } => *created,
            UnitStatus::Error { .. } => 0,
        })
    }

    /// Total rows updated across units.
    pub fn total_updated(&self) -> u64 {
        self.sum(|s| match s {
            UnitStatus::Success { updated, .. } | UnitStatus::Partial { updated, .. } => *updated,
            UnitStatus::Error { .. } => 0,
        })
    }

    /// Total rows removed across units.
    pub fn total_removed(&self) -> u64 {
        self.sum(|s| match s {
            UnitStatus::Success { removed, .. } | UnitStatus::Partial { removed, .. } => *removed,
            UnitStatus::Error { .. } => 0,
        })
    }

    fn sum(&self, f: impl Fn(&UnitStatus) -> u64) -> u64 {
        self.outcomes.iter().map(|o| f(&o.status)).sum()
    }

    /// Derives the operator-facing health of the run.
    ///
    /// A run is never presented as fully successful while any unit errored:
    /// `Completed` with failures maps to [`RunHealth::CompletedWithErrors`].
    pub fn health(&self) -> RunHealth {
        match self.state {
            RunState::Draft | RunState::Running => RunHealth::InProgress,
            RunState::Failed => RunHealth::Failed,
            RunState::Completed => {
                if self.has_failures() {
                    RunHealth::CompletedWithErrors
                } else {
                    RunHealth::Succeeded
                }
            }
        }
    }
}

/// Operator-facing summary of a run's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunHealth {
    /// Not yet terminal.
    InProgress,
    /// Completed with every unit successful.
    Succeeded,
    /// Completed, but one or more units errored or were partial.
    CompletedWithErrors,
    /// Aborted by a run-level fatal.
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scope_covers_all_levels_in_order() {
        assert_eq!(
            SyncType::Full.levels(),
            &[
                HierarchyLevel::Directory,
                HierarchyLevel::Project,
                HierarchyLevel::Phase,
                HierarchyLevel::Elevation,
            ]
        );
    }

    #[test]
    fn scope_overlap() {
        assert!(SyncType::Full.overlaps(SyncType::Phases));
        assert!(SyncType::Projects.overlaps(SyncType::Projects));
        assert!(!SyncType::Directories.overlaps(SyncType::Elevations));
    }

    #[test]
    fn state_transitions() {
        assert!(RunState::Draft.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::Completed));
        assert!(RunState::Running.can_transition_to(RunState::Failed));
        assert!(!RunState::Draft.can_transition_to(RunState::Completed));
        assert!(!RunState::Completed.can_transition_to(RunState::Running));
        assert!(RunState::Completed.is_terminal());
    }

    #[test]
    fn health_reflects_partial_state() {
        let mut run = SyncRun::new(RunDescriptor::new(SyncType::Projects));
        run.state = RunState::Completed;
        assert_eq!(run.health(), RunHealth::Succeeded);

        run.outcomes.push(UnitOutcome {
            level: HierarchyLevel::Project,
            unit: "d1".into(),
            status: UnitStatus::Error {
                message: "duplicate identifier".into(),
            },
            duration_ms: 3,
        });
        assert_eq!(run.health(), RunHealth::CompletedWithErrors);

        run.state = RunState::Failed;
        assert_eq!(run.health(), RunHealth::Failed);
    }

    #[test]
    fn totals_ignore_errored_units() {
        let mut run = SyncRun::new(RunDescriptor::new(SyncType::Projects));
        run.outcomes.push(UnitOutcome {
            level: HierarchyLevel::Project,
            unit: "d1".into(),
            status: UnitStatus::Success {
                created: 2,
                updated: 1,
                removed: 0,
            },
            duration_ms: 5,
        });
        run.outcomes.push(UnitOutcome {
            level: HierarchyLevel::Project,
            unit: "d2".into(),
            status: UnitStatus::Error {
                message: "boom".into(),
            },
            duration_ms: 1,
        });
        assert_eq!(run.total_created(), 2);
        assert_eq!(run.total_updated(), 1);
        assert!(run.has_failures());
    }
}
