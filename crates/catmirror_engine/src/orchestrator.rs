//! Cascading run orchestration.
//!
//! A run walks its scope's hierarchy levels in dependency order. Within a
//! level the planned units are independent, so they run as one wave of
//! concurrent workers bounded by a semaphore. Unit failures become
//! recorded outcomes and the run continues; run-level fatals
//! (configuration, authentication, cancellation) abort the wave and fail
//! the run.

use crate::error::{SyncError, SyncResult};
use crate::reconcile::{self, ElevationOutcome, ReconcileOutcome};
use crate::staleness::{Evaluator, PlanUnit};
use crate::store::CatalogStore;
use catmirror_client::{CatalogClient, CatalogTransport, ClientResult};
use catmirror_model::{
    AuditOperation, HierarchyLevel, RemoteRecordSet, RunDescriptor, RunId, RunState, SyncLogEntry,
    SyncRun, UnitOutcome, UnitStatus,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent units per wave.
    pub concurrency: usize,
    /// Reject a run whose scope overlaps an active run.
    pub no_parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            no_parallel: true,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.concurrency == 0 {
            return Err(SyncError::Configuration(
                "concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, checked between units.
///
/// Cancelling never interrupts a unit mid-flight; rows already committed
/// stay committed.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Creates a fresh, un-cancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives sync runs against a client and a store.
pub struct Orchestrator<T: CatalogTransport + 'static, S: CatalogStore + 'static> {
    client: Arc<CatalogClient<T>>,
    store: Arc<S>,
    config: EngineConfig,
}

impl<T: CatalogTransport + 'static, S: CatalogStore + 'static> Orchestrator<T, S> {
    /// Creates an orchestrator. Fails fast on invalid configuration.
    pub fn new(
        client: Arc<CatalogClient<T>>,
        store: Arc<S>,
        config: EngineConfig,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            client,
            store,
            config,
        })
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Creates and persists a draft run.
    pub fn prepare(&self, descriptor: RunDescriptor) -> SyncResult<SyncRun> {
        let run = SyncRun::new(descriptor);
        self.store.create_run(&run)?;
        Ok(run)
    }

    /// Prepares and executes a run in one call.
    pub async fn run(
        &self,
        descriptor: RunDescriptor,
        cancel: CancelHandle,
    ) -> SyncResult<SyncRun> {
        let run = self.prepare(descriptor)?;
        self.execute(run, cancel).await
    }

    /// Executes a prepared run to a terminal state.
    ///
    /// Returns `Ok` with the terminal run even when it failed; `Err` is
    /// reserved for bookkeeping failures that prevent recording the run
    /// itself.
    pub async fn execute(&self, mut run: SyncRun, cancel: CancelHandle) -> SyncResult<SyncRun> {
        transition(&mut run, RunState::Running)?;
        run.started_at = Some(Utc::now());
        self.store.update_run(&run)?;
        append_audit(
            &*self.store,
            SyncLogEntry::success(run.id, AuditOperation::RunStarted)
                .with_target(run.sync_type.as_str()),
        );
        info!(run = %run.id, sync_type = run.sync_type.as_str(), force = run.force, "sync run started");

        let result = self.drive(&mut run, &cancel).await;
        run.finished_at = Some(Utc::now());
        match result {
            Ok(()) => {
                transition(&mut run, RunState::Completed)?;
                self.store.update_run(&run)?;
                append_audit(
                    &*self.store,
                    SyncLogEntry::success(run.id, AuditOperation::RunFinished)
                        .with_processed(run.outcomes.len() as u64),
                );
                info!(
                    run = %run.id,
                    created = run.total_created(),
                    updated = run.total_updated(),
                    removed = run.total_removed(),
                    failures = run.has_failures(),
                    "sync run completed"
                );
            }
            Err(err) => {
                if matches!(err, SyncError::Cancelled) {
                    append_audit(
                        &*self.store,
                        SyncLogEntry::success(run.id, AuditOperation::Cancelled),
                    );
                }
                transition(&mut run, RunState::Failed)?;
                run.fatal_error = Some(err.to_string());
                self.store.update_run(&run)?;
                append_audit(
                    &*self.store,
                    SyncLogEntry::failure(run.id, AuditOperation::RunFinished, err.to_string()),
                );
                warn!(run = %run.id, error = %err, "sync run failed");
            }
        }
        Ok(run)
    }

    async fn drive(&self, run: &mut SyncRun, cancel: &CancelHandle) -> SyncResult<()> {
        let auth_started = Instant::now();
        match self.client.authenticate().await {
            Ok(()) => append_audit(
                &*self.store,
                SyncLogEntry::success(run.id, AuditOperation::Authenticate)
                    .with_duration_ms(elapsed_ms(auth_started)),
            ),
            Err(err) => {
                append_audit(
                    &*self.store,
                    SyncLogEntry::failure(run.id, AuditOperation::Authenticate, err.to_string())
                        .with_duration_ms(elapsed_ms(auth_started)),
                );
                return Err(err.into());
            }
        }

        for &level in run.sync_type.levels() {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let units = Evaluator::new(self.store.as_ref()).plan_level(level, run.force)?;
            if units.is_empty() {
                continue;
            }
            self.run_wave(run, units, cancel).await?;
        }
        Ok(())
    }

    /// Runs one level's units concurrently. Outcomes are recorded in
    /// completion order.
    async fn run_wave(
        &self,
        run: &mut SyncRun,
        units: Vec<PlanUnit>,
        cancel: &CancelHandle,
    ) -> SyncResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        for unit in units {
            let client = Arc::clone(&self.client);
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let run_id = run.id;
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| SyncError::Internal("worker semaphore closed".into()))?;
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                process_unit(&client, &*store, run_id, unit).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    run.outcomes.push(outcome);
                    self.store.update_run(run)?;
                }
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(SyncError::Internal(format!(
                        "sync worker panicked: {join_err}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Processes one unit end to end. Non-fatal errors are folded into the
/// outcome; only run-fatal errors propagate.
async fn process_unit<T: CatalogTransport, S: CatalogStore>(
    client: &CatalogClient<T>,
    store: &S,
    run_id: RunId,
    unit: PlanUnit,
) -> SyncResult<UnitOutcome> {
    let started = Instant::now();
    let result = fetch_and_reconcile(client, store, run_id, &unit).await;
    let duration_ms = elapsed_ms(started);
    let status = match result {
        Ok(status) => status,
        Err(err) if err.is_run_fatal() => return Err(err),
        Err(err) => {
            warn!(level = %unit.level(), unit = %unit.label(), error = %err, "unit failed");
            UnitStatus::Error {
                message: err.to_string(),
            }
        }
    };
    Ok(UnitOutcome {
        level: unit.level(),
        unit: unit.label(),
        status,
        duration_ms,
    })
}

async fn fetch_and_reconcile<T: CatalogTransport, S: CatalogStore>(
    client: &CatalogClient<T>,
    store: &S,
    run_id: RunId,
    unit: &PlanUnit,
) -> SyncResult<UnitStatus> {
    let now = Utc::now();
    let level = unit.level();
    let label = unit.label();

    let fetch_started = Instant::now();
    let fetched = fetch(client, unit).await;
    let fetch_ms = elapsed_ms(fetch_started);
    match &fetched {
        Ok(set) => append_audit(
            store,
            SyncLogEntry::success(run_id, AuditOperation::FetchLevel)
                .with_level(level)
                .with_target(&label)
                .with_duration_ms(fetch_ms)
                .with_processed(set.len() as u64),
        ),
        Err(err) => append_audit(
            store,
            SyncLogEntry::failure(run_id, AuditOperation::FetchLevel, err.to_string())
                .with_level(level)
                .with_target(&label)
                .with_duration_ms(fetch_ms),
        ),
    }
    let set = fetched?;

    let reconcile_started = Instant::now();
    let result = match (unit, &set) {
        (PlanUnit::DirectoryTree, RemoteRecordSet::Directories(records)) => {
            reconcile::reconcile_directories(store, records, now).map(plain_status)
        }
        (PlanUnit::ProjectsOf { directory }, RemoteRecordSet::Projects(records)) => {
            reconcile::reconcile_projects(store, directory, records, now).map(plain_status)
        }
        (PlanUnit::PhasesOf { project, .. }, RemoteRecordSet::Phases(records)) => {
            reconcile::reconcile_phases(store, project, records, now).map(plain_status)
        }
        (PlanUnit::ElevationsOf { phase, project }, RemoteRecordSet::Elevations(records)) => {
            reconcile::reconcile_elevations(store, phase, project, records, now).map(|outcome| {
                append_parse_audit(store, run_id, &label, &outcome);
                elevation_status(outcome)
            })
        }
        _ => Err(SyncError::DataIntegrity(format!(
            "remote returned {} records for a {} fetch",
            set.level(),
            level
        ))),
    };
    let reconcile_ms = elapsed_ms(reconcile_started);
    match &result {
        Ok(_) => append_audit(
            store,
            SyncLogEntry::success(run_id, AuditOperation::Reconcile)
                .with_level(level)
                .with_target(&label)
                .with_duration_ms(reconcile_ms)
                .with_processed(set.len() as u64),
        ),
        Err(err) => append_audit(
            store,
            SyncLogEntry::failure(run_id, AuditOperation::Reconcile, err.to_string())
                .with_level(level)
                .with_target(&label)
                .with_duration_ms(reconcile_ms),
        ),
    }

    if result.is_ok() {
        match unit {
            PlanUnit::DirectoryTree => {}
            PlanUnit::ProjectsOf { directory } => {
                store.mark_directory_children_synced(directory, now)?;
            }
            PlanUnit::PhasesOf { directory, project } => {
                store.mark_project_children_synced(directory, project, now)?;
            }
            PlanUnit::ElevationsOf { phase, project } => {
                store.mark_phase_children_synced(project, phase, now)?;
            }
        }
    }
    result
}

async fn fetch<T: CatalogTransport>(
    client: &CatalogClient<T>,
    unit: &PlanUnit,
) -> ClientResult<RemoteRecordSet> {
    match unit {
        PlanUnit::DirectoryTree => client
            .list_directories()
            .await
            .map(RemoteRecordSet::Directories),
        PlanUnit::ProjectsOf { directory } => client
            .list_projects(directory)
            .await
            .map(RemoteRecordSet::Projects),
        PlanUnit::PhasesOf { project, .. } => {
            client.list_phases(project).await.map(RemoteRecordSet::Phases)
        }
        PlanUnit::ElevationsOf { phase, .. } => client
            .list_elevations(phase)
            .await
            .map(RemoteRecordSet::Elevations),
    }
}

fn plain_status(outcome: ReconcileOutcome) -> UnitStatus {
    UnitStatus::Success {
        created: outcome.created,
        updated: outcome.updated,
        removed: outcome.removed,
    }
}

fn elevation_status(outcome: ElevationOutcome) -> UnitStatus {
    if outcome.failed_children == 0 {
        plain_status(outcome.reconcile)
    } else {
        UnitStatus::Partial {
            created: outcome.reconcile.created,
            updated: outcome.reconcile.updated,
            removed: outcome.reconcile.removed,
            failed_children: outcome.failed_children,
            message: outcome.first_error.unwrap_or_default(),
        }
    }
}

fn append_parse_audit<S: CatalogStore>(
    store: &S,
    run_id: RunId,
    label: &str,
    outcome: &ElevationOutcome,
) {
    if outcome.parsed == 0 && outcome.failed_children == 0 {
        return;
    }
    let entry = if outcome.failed_children == 0 {
        SyncLogEntry::success(run_id, AuditOperation::ParseParts)
    } else {
        SyncLogEntry::failure(
            run_id,
            AuditOperation::ParseParts,
            outcome.first_error.clone().unwrap_or_default(),
        )
    };
    append_audit(
        store,
        entry
            .with_level(HierarchyLevel::Elevation)
            .with_target(label)
            .with_processed(outcome.parsed),
    );
}

fn transition(run: &mut SyncRun, next: RunState) -> SyncResult<()> {
    if !run.state.can_transition_to(next) {
        return Err(SyncError::InvalidStateTransition {
            from: run.state,
            to: next,
        });
    }
    run.state = next;
    Ok(())
}

// Audit is best-effort bookkeeping; a failed append never fails the run.
fn append_audit<S: CatalogStore>(store: &S, entry: SyncLogEntry) {
    if let Err(err) = store.append_audit(entry) {
        warn!(error = %err, "failed to append audit entry");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
