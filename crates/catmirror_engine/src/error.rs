//! Error types for the sync engine.

use catmirror_client::ClientError;
use catmirror_model::{RunId, RunState};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised during a sync run.
///
/// Unit-level errors are caught at the orchestrator boundary and recorded
/// as outcomes; run-level fatals ([`SyncError::is_run_fatal`]) unwind the
/// run immediately.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid configuration. Aborts the run before any remote call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Authentication failed after the one transparent re-login the
    /// client performs. Fatal for the run.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Transport failure surfaced by the client after its retry budget.
    /// Unit-level.
    #[error(transparent)]
    Client(ClientError),

    /// Duplicate or ambiguous remote identifier within one scope.
    /// Unit-level; the run continues.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Local store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Run state machine violation.
    #[error("invalid run state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: RunState,
        /// Attempted target state.
        to: RunState,
    },

    /// A non-terminal run already covers an overlapping scope
    /// (no-parallel mode).
    #[error("a run covering scope '{scope}' is already active")]
    AlreadyRunning {
        /// Scope of the conflicting run.
        scope: String,
    },

    /// The referenced run does not exist.
    #[error("run {0} not found")]
    RunNotFound(RunId),

    /// Cooperative cancellation was observed between units.
    #[error("sync cancelled")]
    Cancelled,

    /// Unexpected internal failure (e.g. a worker task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns true if this error aborts the whole run rather than a
    /// single unit.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration(_) | SyncError::Authentication(_) | SyncError::Cancelled
        )
    }
}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Configuration(msg) => SyncError::Configuration(msg),
            ClientError::AuthenticationFailed(msg) => SyncError::Authentication(msg),
            ClientError::AuthExpired => {
                SyncError::Authentication("session expired and re-login failed".into())
            }
            other => SyncError::Client(other),
        }
    }
}

/// Failure inside a store implementation.
#[derive(Error, Debug)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Creates a store error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
