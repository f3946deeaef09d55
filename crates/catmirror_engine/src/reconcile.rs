//! Mark-and-sweep reconciliation of fetched record sets.
//!
//! Each reconcile call covers exactly one fetch scope: the full directory
//! tree, or the children of one parent. A fresh generation is issued up
//! front, every row present in the fetch is stamped with it, and rows of
//! the scope still carrying an older stamp are swept afterwards. Sweeps
//! never cross scopes, so a failed unit elsewhere cannot cause deletions
//! here.

use crate::error::{SyncError, SyncResult};
use crate::parts;
use crate::staleness;
use crate::store::CatalogStore;
use catmirror_model::{
    Directory, Elevation, ParseState, Phase, Project, RemoteDirectory, RemoteElevation,
    RemoteId, RemotePhase, RemoteProject,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Row counts of one reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    /// Rows created.
    pub created: u64,
    /// Rows whose fields changed.
    pub updated: u64,
    /// Rows swept.
    pub removed: u64,
}

/// Row counts of one elevation reconcile, including parts processing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElevationOutcome {
    /// Row counts.
    pub reconcile: ReconcileOutcome,
    /// Elevations whose payload was (re-)parsed.
    pub parsed: u64,
    /// Elevations whose parse ended partial or rejected.
    pub failed_children: u64,
    /// Detail of the first parse failure.
    pub first_error: Option<String>,
}

fn check_duplicates<'a, I>(ids: I, scope: &str) -> SyncResult<()>
where
    I: Iterator<Item = &'a RemoteId>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SyncError::DataIntegrity(format!(
                "duplicate remote identifier '{id}' in {scope}"
            )));
        }
    }
    Ok(())
}

/// Reconciles the full directory tree against a root fetch.
pub fn reconcile_directories<S: CatalogStore>(
    store: &S,
    records: &[RemoteDirectory],
    now: DateTime<Utc>,
) -> SyncResult<ReconcileOutcome> {
    check_duplicates(records.iter().map(|r| &r.id), "directory tree")?;

    let generation = store.next_generation();
    let mut outcome = ReconcileOutcome::default();

    for record in records {
        match store.get_directory(&record.id)? {
            None => {
                store.put_directory(Directory {
                    remote_id: record.id.clone(),
                    name: record.name.clone(),
                    path: record.path.clone(),
                    parent_id: record.parent_id.clone(),
                    exclude_from_sync: false,
                    last_synced_at: Some(now),
                    remote_changed_at: record.changed_at,
                    children_synced_at: None,
                    generation,
                })?;
                outcome.created += 1;
            }
            Some(mut existing) => {
                let changed = existing.name != record.name
                    || existing.path != record.path
                    || existing.parent_id != record.parent_id
                    || staleness::is_stale(existing.last_synced_at, record.changed_at);
                if changed {
                    existing.name = record.name.clone();
                    existing.path = record.path.clone();
                    existing.parent_id = record.parent_id.clone();
                    existing.last_synced_at = Some(now);
                    existing.remote_changed_at = record.changed_at;
                    outcome.updated += 1;
                }
                // Exclusion flag and child bookkeeping survive the upsert.
                existing.generation = generation;
                store.put_directory(existing)?;
            }
        }
    }

    outcome.removed = store.sweep_directories(generation)?;
    debug!(
        created = outcome.created,
        updated = outcome.updated,
        removed = outcome.removed,
        "reconciled directory tree"
    );
    Ok(outcome)
}

/// Reconciles the projects of one directory.
pub fn reconcile_projects<S: CatalogStore>(
    store: &S,
    directory: &RemoteId,
    records: &[RemoteProject],
    now: DateTime<Utc>,
) -> SyncResult<ReconcileOutcome> {
    check_duplicates(
        records.iter().map(|r| &r.id),
        &format!("projects of directory '{directory}'"),
    )?;

    let generation = store.next_generation();
    let mut outcome = ReconcileOutcome::default();

    for record in records {
        match store.get_project(directory, &record.id)? {
            None => {
                store.put_project(Project {
                    remote_id: record.id.clone(),
                    directory_id: directory.clone(),
                    name: record.name.clone(),
                    status: record.status.clone(),
                    last_synced_at: Some(now),
                    remote_changed_at: record.changed_at,
                    children_synced_at: None,
                    generation,
                })?;
                outcome.created += 1;
            }
            Some(mut existing) => {
                let changed = existing.name != record.name
                    || existing.status != record.status
                    || staleness::is_stale(existing.last_synced_at, record.changed_at);
                if changed {
                    existing.name = record.name.clone();
                    existing.status = record.status.clone();
                    existing.last_synced_at = Some(now);
                    existing.remote_changed_at = record.changed_at;
                    outcome.updated += 1;
                }
                existing.generation = generation;
                store.put_project(existing)?;
            }
        }
    }

    outcome.removed = store.sweep_projects(directory, generation)?;
    Ok(outcome)
}

/// Reconciles the phases of one project.
///
/// Placeholder phase identifiers are legal here: identity is scoped to
/// the project, and duplicates are only rejected within this one fetch.
pub fn reconcile_phases<S: CatalogStore>(
    store: &S,
    project: &RemoteId,
    records: &[RemotePhase],
    now: DateTime<Utc>,
) -> SyncResult<ReconcileOutcome> {
    check_duplicates(
        records.iter().map(|r| &r.id),
        &format!("phases of project '{project}'"),
    )?;

    let generation = store.next_generation();
    let mut outcome = ReconcileOutcome::default();

    for record in records {
        match store.get_phase(project, &record.id)? {
            None => {
                store.put_phase(Phase {
                    remote_id: record.id.clone(),
                    project_id: project.clone(),
                    name: record.name.clone(),
                    status: record.status.clone(),
                    last_synced_at: Some(now),
                    remote_changed_at: record.changed_at,
                    children_synced_at: None,
                    generation,
                })?;
                outcome.created += 1;
            }
            Some(mut existing) => {
                let changed = existing.name != record.name
                    || existing.status != record.status
                    || staleness::is_stale(existing.last_synced_at, record.changed_at);
                if changed {
                    existing.name = record.name.clone();
                    existing.status = record.status.clone();
                    existing.last_synced_at = Some(now);
                    existing.remote_changed_at = record.changed_at;
                    outcome.updated += 1;
                }
                existing.generation = generation;
                store.put_phase(existing)?;
            }
        }
    }

    outcome.removed = store.sweep_phases(project, generation)?;
    Ok(outcome)
}

/// Reconciles the elevations of one phase, running the parts parse
/// lifecycle for every new or changed payload.
///
/// A changed payload hash resets the lifecycle to `Pending` before the
/// payload is re-parsed, so a previously terminal state never blocks a
/// fresh payload. A row found still `InProgress` comes from a run that
/// died mid-parse; it moves through `Failed` (counting the lost attempt)
/// and is parsed again.
///
/// Elevations are scoped by `(project, phase)`: phase identifiers may be
/// placeholders shared across projects, and neither lookups nor the sweep
/// may cross into a sibling project's rows.
pub fn reconcile_elevations<S: CatalogStore>(
    store: &S,
    phase: &RemoteId,
    project: &RemoteId,
    records: &[RemoteElevation],
    now: DateTime<Utc>,
) -> SyncResult<ElevationOutcome> {
    check_duplicates(
        records.iter().map(|r| &r.id),
        &format!("elevations of phase '{phase}'"),
    )?;

    let generation = store.next_generation();
    let mut outcome = ElevationOutcome::default();

    for record in records {
        let hash = parts::content_hash(record.parts.as_ref());
        let existing = store.get_elevation(project, phase, &record.id)?;

        let mut row = match existing {
            None => {
                outcome.reconcile.created += 1;
                Elevation {
                    remote_id: record.id.clone(),
                    phase_id: phase.clone(),
                    project_id: project.clone(),
                    name: record.name.clone(),
                    width_mm: record.width_mm,
                    height_mm: record.height_mm,
                    description: record.description.clone(),
                    parse_state: ParseState::Pending,
                    parts_hash: hash,
                    parse_retries: 0,
                    last_parse_error: None,
                    last_synced_at: Some(now),
                    remote_changed_at: record.changed_at,
                    generation,
                }
            }
            Some(mut existing) => {
                if !staleness::elevation_is_stale(&existing, record) {
                    existing.generation = generation;
                    if existing.parse_state.is_terminal() {
                        store.put_elevation(existing)?;
                        continue;
                    }
                    // A previous run fetched this payload but died before
                    // its parse finished. Record the lost attempt, then
                    // parse again below.
                    if existing.parse_state == ParseState::InProgress {
                        existing.parse_state = ParseState::Failed;
                        existing.parse_retries += 1;
                        store.put_elevation(existing.clone())?;
                    }
                    existing
                } else {
                    outcome.reconcile.updated += 1;
                    existing.name = record.name.clone();
                    existing.width_mm = record.width_mm;
                    existing.height_mm = record.height_mm;
                    existing.description = record.description.clone();
                    existing.last_synced_at = Some(now);
                    existing.remote_changed_at = record.changed_at;
                    existing.generation = generation;
                    if existing.parts_hash != hash {
                        existing.parts_hash = hash;
                        existing.parse_state = ParseState::Pending;
                        existing.parse_retries = 0;
                        existing.last_parse_error = None;
                    }
                    existing
                }
            }
        };

        if !row.parse_state.is_terminal() {
            // Persist the in-progress marker first, so a run dying
            // mid-parse is detectable on the next pass.
            let mut marker = row.clone();
            marker.parse_state = ParseState::InProgress;
            store.put_elevation(marker)?;

            let result = parts::apply(&mut row, record.parts.as_ref());
            outcome.parsed += 1;
            if row.parse_state != ParseState::Success {
                outcome.failed_children += 1;
                if outcome.first_error.is_none() {
                    outcome.first_error = result
                        .first_error
                        .map(|detail| format!("elevation '{}': {detail}", row.remote_id));
                }
            }
        }
        store.put_elevation(row)?;
    }

    outcome.reconcile.removed = store.sweep_elevations(project, phase, generation)?;
    Ok(outcome)
}
