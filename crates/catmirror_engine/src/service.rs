//! Run admission, tracking, and cancellation.
//!
//! The service is the front door: it admits runs (enforcing the
//! no-parallel guard under one lock, so two overlapping runs can never
//! both be admitted), hands out run identifiers for queued runs, and
//! routes cancellation to the right in-flight handle.

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::{CancelHandle, EngineConfig, Orchestrator};
use crate::store::CatalogStore;
use catmirror_client::{CatalogClient, CatalogTransport};
use catmirror_model::{RemoteId, RunDescriptor, RunHealth, RunId, SyncLogEntry, SyncRun};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Point-in-time view of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatus {
    /// The run record.
    pub run: SyncRun,
    /// Derived operator-facing health.
    pub health: RunHealth,
}

/// Owns the orchestrator and tracks in-flight runs.
pub struct SyncService<T: CatalogTransport + 'static, S: CatalogStore + 'static> {
    orchestrator: Orchestrator<T, S>,
    store: Arc<S>,
    no_parallel: bool,
    active: Mutex<HashMap<RunId, CancelHandle>>,
}

impl<T: CatalogTransport + 'static, S: CatalogStore + 'static> SyncService<T, S> {
    /// Creates a service. Fails fast on invalid configuration.
    pub fn new(
        client: Arc<CatalogClient<T>>,
        store: Arc<S>,
        config: EngineConfig,
    ) -> SyncResult<Self> {
        let no_parallel = config.no_parallel;
        let orchestrator = Orchestrator::new(client, Arc::clone(&store), config)?;
        Ok(Self {
            orchestrator,
            store,
            no_parallel,
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Admits a run: checks the overlap guard and persists the draft,
    /// both under the admission lock.
    fn admit(&self, descriptor: RunDescriptor) -> SyncResult<(SyncRun, CancelHandle)> {
        let mut active = self.active.lock();
        if self.no_parallel {
            if let Some(existing) = self.store.active_run(descriptor.sync_type)? {
                return Err(SyncError::AlreadyRunning {
                    scope: existing.sync_type.as_str().into(),
                });
            }
        }
        let run = self.orchestrator.prepare(descriptor)?;
        let cancel = CancelHandle::new();
        active.insert(run.id, cancel.clone());
        Ok((run, cancel))
    }

    fn release(&self, run_id: &RunId) {
        self.active.lock().remove(run_id);
    }

    /// Runs a sync to completion on the caller's task.
    pub async fn run_now(&self, descriptor: RunDescriptor) -> SyncResult<SyncRun> {
        let (run, cancel) = self.admit(descriptor)?;
        let run_id = run.id;
        let result = self.orchestrator.execute(run, cancel).await;
        self.release(&run_id);
        result
    }

    /// Starts a sync on a background task and returns its identifier
    /// immediately. Progress is observable through [`SyncService::status`].
    pub fn enqueue(self: &Arc<Self>, descriptor: RunDescriptor) -> SyncResult<RunId> {
        let (run, cancel) = self.admit(descriptor)?;
        let run_id = run.id;
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let result = service.orchestrator.execute(run, cancel).await;
            service.release(&run_id);
            match result {
                Ok(run) => info!(run = %run.id, state = ?run.state, "queued run finished"),
                Err(err) => error!(run = %run_id, error = %err, "queued run could not be recorded"),
            }
        });
        Ok(run_id)
    }

    /// Returns the current view of a run.
    pub fn status(&self, run_id: &RunId) -> SyncResult<RunStatus> {
        let run = self
            .store
            .get_run(run_id)?
            .ok_or(SyncError::RunNotFound(*run_id))?;
        let health = run.health();
        Ok(RunStatus { run, health })
    }

    /// Returns the audit trail of a run, in append order.
    pub fn audit(&self, run_id: &RunId) -> SyncResult<Vec<SyncLogEntry>> {
        if self.store.get_run(run_id)?.is_none() {
            return Err(SyncError::RunNotFound(*run_id));
        }
        Ok(self.store.audit_entries(run_id)?)
    }

    /// Requests cancellation of an in-flight run.
    ///
    /// Returns true if a cancellation was delivered, false if the run had
    /// already reached a terminal state.
    pub fn cancel(&self, run_id: &RunId) -> SyncResult<bool> {
        if let Some(handle) = self.active.lock().get(run_id) {
            handle.cancel();
            info!(run = %run_id, "cancellation requested");
            return Ok(true);
        }
        match self.store.get_run(run_id)? {
            Some(_) => Ok(false),
            None => Err(SyncError::RunNotFound(*run_id)),
        }
    }

    /// Toggles a directory's administrative exclusion flag.
    ///
    /// Takes effect at the next planning pass; a unit already in flight
    /// for the subtree finishes normally.
    pub fn set_directory_exclusion(&self, id: &RemoteId, excluded: bool) -> SyncResult<bool> {
        let found = self.store.set_directory_exclusion(id, excluded)?;
        if found {
            info!(directory = %id, excluded, "directory exclusion updated");
        }
        Ok(found)
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
