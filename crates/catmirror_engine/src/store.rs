//! Repository interface to the local store, plus an in-memory
//! implementation.
//!
//! Every trait method is transactional on its own: the orchestrator never
//! spans a run-wide transaction, so a mid-run failure leaves previously
//! committed units intact.

use crate::error::StoreError;
use catmirror_model::{
    Directory, Elevation, Phase, Project, RemoteId, RunId, SyncLogEntry, SyncRun, SyncType,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Repository-style access to the mirrored catalog.
///
/// Writes during a run come only from the reconciliation engine and the
/// orchestrator's bookkeeping; `set_directory_exclusion` is the one
/// administrative mutation allowed outside a run.
pub trait CatalogStore: Send + Sync {
    /// Looks up a directory by remote identifier.
    fn get_directory(&self, id: &RemoteId) -> StoreResult<Option<Directory>>;
    /// Lists all directories.
    fn list_directories(&self) -> StoreResult<Vec<Directory>>;
    /// Creates or replaces a directory row.
    fn put_directory(&self, directory: Directory) -> StoreResult<()>;
    /// Deletes non-excluded directories stamped before `generation`.
    /// Returns the number of rows removed.
    fn sweep_directories(&self, generation: u64) -> StoreResult<u64>;
    /// Toggles the administrative exclusion flag. Returns false if the
    /// directory does not exist.
    fn set_directory_exclusion(&self, id: &RemoteId, excluded: bool) -> StoreResult<bool>;

    /// Looks up a project by `(directory, remote_id)`.
    fn get_project(&self, directory: &RemoteId, id: &RemoteId) -> StoreResult<Option<Project>>;
    /// Lists the projects of a directory.
    fn list_projects(&self, directory: &RemoteId) -> StoreResult<Vec<Project>>;
    /// Lists every project.
    fn list_all_projects(&self) -> StoreResult<Vec<Project>>;
    /// Creates or replaces a project row.
    fn put_project(&self, project: Project) -> StoreResult<()>;
    /// Deletes projects of `directory` stamped before `generation`.
    fn sweep_projects(&self, directory: &RemoteId, generation: u64) -> StoreResult<u64>;

    /// Looks up a phase by `(project, remote_id)`.
    fn get_phase(&self, project: &RemoteId, id: &RemoteId) -> StoreResult<Option<Phase>>;
    /// Lists the phases of a project.
    fn list_phases(&self, project: &RemoteId) -> StoreResult<Vec<Phase>>;
    /// Lists every phase.
    fn list_all_phases(&self) -> StoreResult<Vec<Phase>>;
    /// Creates or replaces a phase row.
    fn put_phase(&self, phase: Phase) -> StoreResult<()>;
    /// Deletes phases of `project` stamped before `generation`.
    fn sweep_phases(&self, project: &RemoteId, generation: u64) -> StoreResult<u64>;

    /// Looks up an elevation by `(project, phase, remote_id)`. Phase
    /// identifiers may be shared placeholders, so the project is part of
    /// the key.
    fn get_elevation(
        &self,
        project: &RemoteId,
        phase: &RemoteId,
        id: &RemoteId,
    ) -> StoreResult<Option<Elevation>>;
    /// Lists the elevations of one phase of one project.
    fn list_elevations(&self, project: &RemoteId, phase: &RemoteId) -> StoreResult<Vec<Elevation>>;
    /// Creates or replaces an elevation row.
    fn put_elevation(&self, elevation: Elevation) -> StoreResult<()>;
    /// Deletes elevations of `(project, phase)` stamped before `generation`.
    fn sweep_elevations(
        &self,
        project: &RemoteId,
        phase: &RemoteId,
        generation: u64,
    ) -> StoreResult<u64>;

    /// Issues the next mark-and-sweep generation. Monotonic.
    fn next_generation(&self) -> u64;
    /// Records that a directory's projects were fetched at `at`.
    fn mark_directory_children_synced(&self, id: &RemoteId, at: DateTime<Utc>) -> StoreResult<()>;
    /// Records that a project's phases were fetched at `at`. Scoped to the
    /// one `(directory, remote_id)` row.
    fn mark_project_children_synced(
        &self,
        directory: &RemoteId,
        id: &RemoteId,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Records that a phase's elevations were fetched at `at`. Scoped to
    /// the one `(project, remote_id)` row, so a shared placeholder
    /// identifier never stamps a sibling project's phase.
    fn mark_phase_children_synced(
        &self,
        project: &RemoteId,
        id: &RemoteId,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Persists a new run record.
    fn create_run(&self, run: &SyncRun) -> StoreResult<()>;
    /// Replaces an existing run record.
    fn update_run(&self, run: &SyncRun) -> StoreResult<()>;
    /// Looks up a run.
    fn get_run(&self, id: &RunId) -> StoreResult<Option<SyncRun>>;
    /// Returns a non-terminal run whose scope overlaps `sync_type`, if any.
    fn active_run(&self, sync_type: SyncType) -> StoreResult<Option<SyncRun>>;

    /// Appends an audit entry.
    fn append_audit(&self, entry: SyncLogEntry) -> StoreResult<()>;
    /// Returns the audit entries of a run, in append order.
    fn audit_entries(&self, run: &RunId) -> StoreResult<Vec<SyncLogEntry>>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    generation: AtomicU64,
}

#[derive(Debug, Default)]
struct Inner {
    directories: BTreeMap<RemoteId, Directory>,
    projects: BTreeMap<(RemoteId, RemoteId), Project>,
    phases: BTreeMap<(RemoteId, RemoteId), Phase>,
    elevations: BTreeMap<(RemoteId, RemoteId, RemoteId), Elevation>,
    runs: HashMap<RunId, SyncRun>,
    audit: Vec<SyncLogEntry>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for MemoryStore {
    fn get_directory(&self, id: &RemoteId) -> StoreResult<Option<Directory>> {
        Ok(self.inner.read().directories.get(id).cloned())
    }

    fn list_directories(&self) -> StoreResult<Vec<Directory>> {
        Ok(self.inner.read().directories.values().cloned().collect())
    }

    fn put_directory(&self, directory: Directory) -> StoreResult<()> {
        self.inner
            .write()
            .directories
            .insert(directory.remote_id.clone(), directory);
        Ok(())
    }

    fn sweep_directories(&self, generation: u64) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.directories.len();
        // Excluded rows are never tombstoned, even when gone remotely.
        inner
            .directories
            .retain(|_, d| d.exclude_from_sync || d.generation >= generation);
        Ok((before - inner.directories.len()) as u64)
    }

    fn set_directory_exclusion(&self, id: &RemoteId, excluded: bool) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        match inner.directories.get_mut(id) {
            Some(directory) => {
                directory.exclude_from_sync = excluded;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_project(&self, directory: &RemoteId, id: &RemoteId) -> StoreResult<Option<Project>> {
        Ok(self
            .inner
            .read()
            .projects
            .get(&(directory.clone(), id.clone()))
            .cloned())
    }

    fn list_projects(&self, directory: &RemoteId) -> StoreResult<Vec<Project>> {
        Ok(self
            .inner
            .read()
            .projects
            .values()
            .filter(|p| &p.directory_id == directory)
            .cloned()
            .collect())
    }

    fn list_all_projects(&self) -> StoreResult<Vec<Project>> {
        Ok(self.inner.read().projects.values().cloned().collect())
    }

    fn put_project(&self, project: Project) -> StoreResult<()> {
        self.inner.write().projects.insert(
            (project.directory_id.clone(), project.remote_id.clone()),
            project,
        );
        Ok(())
    }

    fn sweep_projects(&self, directory: &RemoteId, generation: u64) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.projects.len();
        inner
            .projects
            .retain(|(dir, _), p| dir != directory || p.generation >= generation);
        Ok((before - inner.projects.len()) as u64)
    }

    fn get_phase(&self, project: &RemoteId, id: &RemoteId) -> StoreResult<Option<Phase>> {
        Ok(self
            .inner
            .read()
            .phases
            .get(&(project.clone(), id.clone()))
            .cloned())
    }

    fn list_phases(&self, project: &RemoteId) -> StoreResult<Vec<Phase>> {
        Ok(self
            .inner
            .read()
            .phases
            .values()
            .filter(|p| &p.project_id == project)
            .cloned()
            .collect())
    }

    fn list_all_phases(&self) -> StoreResult<Vec<Phase>> {
        Ok(self.inner.read().phases.values().cloned().collect())
    }

    fn put_phase(&self, phase: Phase) -> StoreResult<()> {
        self.inner
            .write()
            .phases
            .insert((phase.project_id.clone(), phase.remote_id.clone()), phase);
        Ok(())
    }

    fn sweep_phases(&self, project: &RemoteId, generation: u64) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.phases.len();
        inner
            .phases
            .retain(|(proj, _), p| proj != project || p.generation >= generation);
        Ok((before - inner.phases.len()) as u64)
    }

    fn get_elevation(
        &self,
        project: &RemoteId,
        phase: &RemoteId,
        id: &RemoteId,
    ) -> StoreResult<Option<Elevation>> {
        Ok(self
            .inner
            .read()
            .elevations
            .get(&(project.clone(), phase.clone(), id.clone()))
            .cloned())
    }

    fn list_elevations(&self, project: &RemoteId, phase: &RemoteId) -> StoreResult<Vec<Elevation>> {
        Ok(self
            .inner
            .read()
            .elevations
            .values()
            .filter(|e| &e.project_id == project && &e.phase_id == phase)
            .cloned()
            .collect())
    }

    fn put_elevation(&self, elevation: Elevation) -> StoreResult<()> {
        self.inner.write().elevations.insert(
            (
                elevation.project_id.clone(),
                elevation.phase_id.clone(),
                elevation.remote_id.clone(),
            ),
            elevation,
        );
        Ok(())
    }

    fn sweep_elevations(
        &self,
        project: &RemoteId,
        phase: &RemoteId,
        generation: u64,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        let before = inner.elevations.len();
        inner
            .elevations
            .retain(|(proj, ph, _), e| {
                proj != project || ph != phase || e.generation >= generation
            });
        Ok((before - inner.elevations.len()) as u64)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn mark_directory_children_synced(&self, id: &RemoteId, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(directory) = self.inner.write().directories.get_mut(id) {
            directory.children_synced_at = Some(at);
        }
        Ok(())
    }

    fn mark_project_children_synced(
        &self,
        directory: &RemoteId,
        id: &RemoteId,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if let Some(project) = inner.projects.get_mut(&(directory.clone(), id.clone())) {
            project.children_synced_at = Some(at);
        }
        Ok(())
    }

    fn mark_phase_children_synced(
        &self,
        project: &RemoteId,
        id: &RemoteId,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if let Some(phase) = inner.phases.get_mut(&(project.clone(), id.clone())) {
            phase.children_synced_at = Some(at);
        }
        Ok(())
    }

    fn create_run(&self, run: &SyncRun) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.runs.contains_key(&run.id) {
            return Err(StoreError::new(format!("run {} already exists", run.id)));
        }
        inner.runs.insert(run.id, run.clone());
        Ok(())
    }

    fn update_run(&self, run: &SyncRun) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.runs.contains_key(&run.id) {
            return Err(StoreError::new(format!("run {} does not exist", run.id)));
        }
        inner.runs.insert(run.id, run.clone());
        Ok(())
    }

    fn get_run(&self, id: &RunId) -> StoreResult<Option<SyncRun>> {
        Ok(self.inner.read().runs.get(id).cloned())
    }

    fn active_run(&self, sync_type: SyncType) -> StoreResult<Option<SyncRun>> {
        Ok(self
            .inner
            .read()
            .runs
            .values()
            .find(|r| !r.state.is_terminal() && r.sync_type.overlaps(sync_type))
            .cloned())
    }

    fn append_audit(&self, entry: SyncLogEntry) -> StoreResult<()> {
        self.inner.write().audit.push(entry);
        Ok(())
    }

    fn audit_entries(&self, run: &RunId) -> StoreResult<Vec<SyncLogEntry>> {
        Ok(self
            .inner
            .read()
            .audit
            .iter()
            .filter(|e| &e.run_id == run)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catmirror_model::{RunDescriptor, RunState};

    fn directory(id: &str, generation: u64) -> Directory {
        Directory {
            remote_id: RemoteId::new(id),
            name: id.to_string(),
            path: format!("/{id}"),
            parent_id: None,
            exclude_from_sync: false,
            last_synced_at: None,
            remote_changed_at: None,
            children_synced_at: None,
            generation,
        }
    }

    #[test]
    fn generations_are_monotonic() {
        let store = MemoryStore::new();
        let a = store.next_generation();
        let b = store.next_generation();
        assert!(b > a);
    }

    #[test]
    fn sweep_keeps_current_generation_and_excluded_rows() {
        let store = MemoryStore::new();
        store.put_directory(directory("old", 1)).unwrap();
        store.put_directory(directory("current", 2)).unwrap();
        let mut excluded = directory("excluded", 1);
        excluded.exclude_from_sync = true;
        store.put_directory(excluded).unwrap();

        let removed = store.sweep_directories(2).unwrap();
        assert_eq!(removed, 1);

        let remaining: Vec<String> = store
            .list_directories()
            .unwrap()
            .iter()
            .map(|d| d.remote_id.to_string())
            .collect();
        assert_eq!(remaining, vec!["current", "excluded"]);
    }

    #[test]
    fn project_identity_is_scoped_to_directory() {
        let store = MemoryStore::new();
        for dir in ["d1", "d2"] {
            store
                .put_project(Project {
                    remote_id: RemoteId::new("p1"),
                    directory_id: RemoteId::new(dir),
                    name: format!("p1 in {dir}"),
                    status: "open".into(),
                    last_synced_at: None,
                    remote_changed_at: None,
                    children_synced_at: None,
                    generation: 1,
                })
                .unwrap();
        }
        assert_eq!(store.list_all_projects().unwrap().len(), 2);
        assert_eq!(
            store
                .get_project(&RemoteId::new("d2"), &RemoteId::new("p1"))
                .unwrap()
                .unwrap()
                .name,
            "p1 in d2"
        );
    }

    #[test]
    fn placeholder_phase_ids_coexist_across_projects() {
        let store = MemoryStore::new();
        let placeholder = RemoteId::new("00000000-0000-0000-0000-000000000000");
        for project in ["p1", "p2"] {
            store
                .put_phase(Phase {
                    remote_id: placeholder.clone(),
                    project_id: RemoteId::new(project),
                    name: "default".into(),
                    status: "open".into(),
                    last_synced_at: None,
                    remote_changed_at: None,
                    children_synced_at: None,
                    generation: 1,
                })
                .unwrap();
        }
        assert_eq!(store.list_all_phases().unwrap().len(), 2);
    }

    #[test]
    fn children_stamp_only_touches_the_owning_projects_phase() {
        use chrono::TimeZone;
        let store = MemoryStore::new();
        let placeholder = RemoteId::new("00000000-0000-0000-0000-000000000000");
        for project in ["p1", "p2"] {
            store
                .put_phase(Phase {
                    remote_id: placeholder.clone(),
                    project_id: RemoteId::new(project),
                    name: "default".into(),
                    status: "open".into(),
                    last_synced_at: None,
                    remote_changed_at: None,
                    children_synced_at: None,
                    generation: 1,
                })
                .unwrap();
        }

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store
            .mark_phase_children_synced(&RemoteId::new("p1"), &placeholder, at)
            .unwrap();

        let stamped = store
            .get_phase(&RemoteId::new("p1"), &placeholder)
            .unwrap()
            .unwrap();
        assert_eq!(stamped.children_synced_at, Some(at));
        // The sibling project's placeholder phase never had its
        // elevations fetched and must stay unstamped.
        let sibling = store
            .get_phase(&RemoteId::new("p2"), &placeholder)
            .unwrap()
            .unwrap();
        assert_eq!(sibling.children_synced_at, None);
    }

    #[test]
    fn children_stamp_only_touches_the_owning_directorys_project() {
        use chrono::TimeZone;
        let store = MemoryStore::new();
        for dir in ["d1", "d2"] {
            store
                .put_project(Project {
                    remote_id: RemoteId::new("p1"),
                    directory_id: RemoteId::new(dir),
                    name: format!("p1 in {dir}"),
                    status: "open".into(),
                    last_synced_at: None,
                    remote_changed_at: None,
                    children_synced_at: None,
                    generation: 1,
                })
                .unwrap();
        }

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store
            .mark_project_children_synced(&RemoteId::new("d1"), &RemoteId::new("p1"), at)
            .unwrap();

        assert_eq!(
            store
                .get_project(&RemoteId::new("d1"), &RemoteId::new("p1"))
                .unwrap()
                .unwrap()
                .children_synced_at,
            Some(at)
        );
        assert_eq!(
            store
                .get_project(&RemoteId::new("d2"), &RemoteId::new("p1"))
                .unwrap()
                .unwrap()
                .children_synced_at,
            None
        );
    }

    #[test]
    fn elevation_identity_is_scoped_to_project_and_phase() {
        let store = MemoryStore::new();
        let placeholder = RemoteId::new("00000000-0000-0000-0000-000000000000");
        for project in ["p1", "p2"] {
            store
                .put_elevation(Elevation {
                    remote_id: RemoteId::new("e1"),
                    phase_id: placeholder.clone(),
                    project_id: RemoteId::new(project),
                    name: format!("e1 in {project}"),
                    width_mm: None,
                    height_mm: None,
                    description: None,
                    parse_state: catmirror_model::ParseState::Pending,
                    parts_hash: None,
                    parse_retries: 0,
                    last_parse_error: None,
                    last_synced_at: None,
                    remote_changed_at: None,
                    generation: 1,
                })
                .unwrap();
        }

        // Both rows exist side by side despite the shared phase id.
        assert_eq!(
            store
                .get_elevation(&RemoteId::new("p1"), &placeholder, &RemoteId::new("e1"))
                .unwrap()
                .unwrap()
                .name,
            "e1 in p1"
        );
        assert_eq!(
            store
                .list_elevations(&RemoteId::new("p2"), &placeholder)
                .unwrap()
                .len(),
            1
        );

        // Sweeping one project's phase leaves the other project alone.
        let removed = store
            .sweep_elevations(&RemoteId::new("p1"), &placeholder, 2)
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            store
                .list_elevations(&RemoteId::new("p2"), &placeholder)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn active_run_matches_overlapping_scopes_only() {
        let store = MemoryStore::new();
        let mut run = SyncRun::new(RunDescriptor::new(SyncType::Projects));
        run.state = RunState::Running;
        store.create_run(&run).unwrap();

        assert!(store.active_run(SyncType::Full).unwrap().is_some());
        assert!(store.active_run(SyncType::Projects).unwrap().is_some());
        assert!(store.active_run(SyncType::Elevations).unwrap().is_none());

        run.state = RunState::Completed;
        store.update_run(&run).unwrap();
        assert!(store.active_run(SyncType::Full).unwrap().is_none());
    }

    #[test]
    fn audit_is_append_only_per_run() {
        use catmirror_model::AuditOperation;
        let store = MemoryStore::new();
        let run = RunId::new();
        let other = RunId::new();
        store
            .append_audit(SyncLogEntry::success(run, AuditOperation::RunStarted))
            .unwrap();
        store
            .append_audit(SyncLogEntry::success(other, AuditOperation::RunStarted))
            .unwrap();
        store
            .append_audit(SyncLogEntry::success(run, AuditOperation::RunFinished))
            .unwrap();

        let entries = store.audit_entries(&run).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, AuditOperation::RunStarted);
        assert_eq!(entries[1].operation, AuditOperation::RunFinished);
    }
}
