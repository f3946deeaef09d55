//! Staleness evaluation and fetch planning.
//!
//! An entity is stale when it has never been synced, when the remote
//! change marker is newer than the last sync, or (elevations) when the
//! parts payload hash differs. Child fetches cascade separately: a parent
//! fetched for the first time forces an unconditional fetch of all its
//! children, because there is no marker to compare yet.

use crate::error::SyncResult;
use crate::parts;
use crate::store::CatalogStore;
use catmirror_model::{Elevation, HierarchyLevel, RemoteElevation, RemoteId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Returns true if a row with the given markers needs a re-fetch.
pub fn is_stale(
    last_synced_at: Option<DateTime<Utc>>,
    remote_changed_at: Option<DateTime<Utc>>,
) -> bool {
    match (last_synced_at, remote_changed_at) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(synced), Some(changed)) => changed > synced,
    }
}

/// Returns true if an elevation needs a re-fetch, considering both the
/// change marker and the parts payload hash.
pub fn elevation_is_stale(local: &Elevation, remote: &RemoteElevation) -> bool {
    if is_stale(local.last_synced_at, remote.changed_at) {
        return true;
    }
    local.parts_hash != parts::content_hash(remote.parts.as_ref())
}

/// Returns true if an entity's children must be fetched.
///
/// A parent never fetched before has no marker to compare, so its first
/// fetch is unconditional.
pub fn needs_children_fetch(
    children_synced_at: Option<DateTime<Utc>>,
    remote_changed_at: Option<DateTime<Utc>>,
    force: bool,
) -> bool {
    if force {
        return true;
    }
    match (children_synced_at, remote_changed_at) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(synced), Some(changed)) => changed > synced,
    }
}

/// One schedulable fetch-and-reconcile unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanUnit {
    /// Fetch the whole directory tree.
    DirectoryTree,
    /// Fetch the projects of one directory.
    ProjectsOf {
        /// Owning directory.
        directory: RemoteId,
    },
    /// Fetch the phases of one project.
    PhasesOf {
        /// Directory the project belongs to.
        directory: RemoteId,
        /// Owning project.
        project: RemoteId,
    },
    /// Fetch the elevations of one phase.
    ElevationsOf {
        /// Owning phase.
        phase: RemoteId,
        /// Project the phase belongs to.
        project: RemoteId,
    },
}

impl PlanUnit {
    /// Returns the level the unit fetches.
    pub fn level(&self) -> HierarchyLevel {
        match self {
            PlanUnit::DirectoryTree => HierarchyLevel::Directory,
            PlanUnit::ProjectsOf { .. } => HierarchyLevel::Project,
            PlanUnit::PhasesOf { .. } => HierarchyLevel::Phase,
            PlanUnit::ElevationsOf { .. } => HierarchyLevel::Elevation,
        }
    }

    /// Returns the label used in outcomes and audit entries.
    pub fn label(&self) -> String {
        match self {
            PlanUnit::DirectoryTree => "root".into(),
            PlanUnit::ProjectsOf { directory } => directory.to_string(),
            PlanUnit::PhasesOf { project, .. } => project.to_string(),
            PlanUnit::ElevationsOf { phase, .. } => phase.to_string(),
        }
    }
}

/// The units of one level, in no particular order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLevel {
    /// Level the units belong to.
    pub level: HierarchyLevel,
    /// Units to process; independent within the level.
    pub units: Vec<PlanUnit>,
}

/// Decides what to fetch, from the current store snapshot.
pub struct Evaluator<'a, S: CatalogStore> {
    store: &'a S,
}

impl<'a, S: CatalogStore> Evaluator<'a, S> {
    /// Creates an evaluator over the store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Returns true if the directory, or any of its ancestors, is
    /// excluded from sync. Unknown directories count as excluded so a
    /// stale reference can never widen the plan.
    pub fn is_directory_excluded(&self, id: &RemoteId) -> SyncResult<bool> {
        let mut seen = HashSet::new();
        let mut current = Some(id.clone());
        while let Some(dir_id) = current {
            if !seen.insert(dir_id.clone()) {
                // Parent cycle in mirrored data; treat as excluded.
                return Ok(true);
            }
            match self.store.get_directory(&dir_id)? {
                Some(directory) if directory.exclude_from_sync => return Ok(true),
                Some(directory) => current = directory.parent_id,
                None => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Plans the units of one level.
    pub fn plan_level(&self, level: HierarchyLevel, force: bool) -> SyncResult<Vec<PlanUnit>> {
        let units = match level {
            HierarchyLevel::Directory => vec![PlanUnit::DirectoryTree],
            HierarchyLevel::Project => {
                let mut units = Vec::new();
                for directory in self.store.list_directories()? {
                    if self.is_directory_excluded(&directory.remote_id)? {
                        continue;
                    }
                    if needs_children_fetch(
                        directory.children_synced_at,
                        directory.remote_changed_at,
                        force,
                    ) {
                        units.push(PlanUnit::ProjectsOf {
                            directory: directory.remote_id,
                        });
                    }
                }
                units
            }
            HierarchyLevel::Phase => {
                let mut units = Vec::new();
                for project in self.store.list_all_projects()? {
                    if self.is_directory_excluded(&project.directory_id)? {
                        continue;
                    }
                    if needs_children_fetch(
                        project.children_synced_at,
                        project.remote_changed_at,
                        force,
                    ) {
                        units.push(PlanUnit::PhasesOf {
                            directory: project.directory_id,
                            project: project.remote_id,
                        });
                    }
                }
                units
            }
            HierarchyLevel::Elevation => {
                let mut units = Vec::new();
                let directory_of: std::collections::HashMap<RemoteId, RemoteId> = self
                    .store
                    .list_all_projects()?
                    .into_iter()
                    .map(|p| (p.remote_id, p.directory_id))
                    .collect();
                for phase in self.store.list_all_phases()? {
                    let excluded = match directory_of.get(&phase.project_id) {
                        Some(directory) => self.is_directory_excluded(directory)?,
                        // Orphaned phase; never widen the plan.
                        None => true,
                    };
                    if excluded {
                        continue;
                    }
                    if needs_children_fetch(
                        phase.children_synced_at,
                        phase.remote_changed_at,
                        force,
                    ) {
                        units.push(PlanUnit::ElevationsOf {
                            phase: phase.remote_id,
                            project: phase.project_id,
                        });
                    }
                }
                units
            }
        };
        debug!(level = %level, units = units.len(), force, "planned level");
        Ok(units)
    }

    /// Plans every level of a run scope, in dependency order.
    pub fn plan(
        &self,
        sync_type: catmirror_model::SyncType,
        force: bool,
    ) -> SyncResult<Vec<PlanLevel>> {
        sync_type
            .levels()
            .iter()
            .map(|&level| {
                Ok(PlanLevel {
                    level,
                    units: self.plan_level(level, force)?,
                })
            })
            .collect()
    }
}
