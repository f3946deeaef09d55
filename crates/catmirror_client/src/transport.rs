//! Transport layer abstraction for the remote catalog.
//!
//! The remote API is stateful per session: listing children only makes
//! sense after selecting the parent scope. The transport exposes the raw
//! calls; serialization of `select` + `list` pairs is the
//! [`CatalogClient`](crate::CatalogClient)'s job.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use catmirror_model::{HierarchyLevel, RemoteRecordSet, Scope};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Credentials presented to the remote catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent calls.
    pub token: String,
    /// Token expiry, if the remote reports one.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A live session token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    /// Bearer token value.
    pub token: String,
    /// Expiry reported at login.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<LoginResponse> for SessionToken {
    fn from(response: LoginResponse) -> Self {
        Self {
            token: response.token,
            expires_at: response.expires_at,
        }
    }
}

/// Network communication with the remote catalog.
///
/// Implementations: [`HttpTransport`](crate::HttpTransport) for the real
/// API, [`MockTransport`] for tests.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// Authenticates and returns a session token.
    async fn login(&self, request: &LoginRequest) -> ClientResult<LoginResponse>;

    /// Sets the session's navigation context to the given scope.
    async fn select(&self, token: &SessionToken, scope: &Scope) -> ClientResult<()>;

    /// Lists the children of the currently selected scope.
    async fn list(&self, token: &SessionToken, level: HierarchyLevel)
        -> ClientResult<RemoteRecordSet>;
}

/// A scripted transport for tests.
///
/// Records every call in an ordered log, serves canned record sets per
/// scope, and supports failure injection and token expiry simulation.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    login_failures: VecDeque<ClientError>,
    issued_tokens: u32,
    expired_tokens: HashSet<String>,
    records: HashMap<Scope, RemoteRecordSet>,
    list_failures: HashMap<Scope, VecDeque<ClientError>>,
    selected: Option<Scope>,
    calls: Vec<String>,
}

impl MockTransport {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the records returned when listing the children of `scope`.
    pub fn set_records(&self, scope: Scope, records: RemoteRecordSet) {
        self.state.lock().records.insert(scope, records);
    }

    /// Removes the records for `scope`; listing it afterwards yields an
    /// empty set.
    pub fn clear_records(&self, scope: &Scope) {
        self.state.lock().records.remove(scope);
    }

    /// Queues an error for the next login attempt.
    pub fn fail_next_login(&self, error: ClientError) {
        self.state.lock().login_failures.push_back(error);
    }

    /// Queues an error for the next list of `scope`.
    pub fn fail_next_list(&self, scope: Scope, error: ClientError) {
        self.state
            .lock()
            .list_failures
            .entry(scope)
            .or_default()
            .push_back(error);
    }

    /// Marks every issued token as expired; the next call using one gets
    /// [`ClientError::AuthExpired`].
    pub fn expire_all_tokens(&self) {
        let mut state = self.state.lock();
        for n in 0..state.issued_tokens {
            state.expired_tokens.insert(format!("mock-token-{n}"));
        }
    }

    /// Returns the ordered call log (`login`, `select:<id>`,
    /// `list:<level>`).
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Returns how many logins were attempted.
    pub fn login_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| *c == "login")
            .count()
    }

    fn check_token(state: &MockState, token: &SessionToken) -> ClientResult<()> {
        if state.expired_tokens.contains(&token.token) {
            return Err(ClientError::AuthExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogTransport for MockTransport {
    async fn login(&self, _request: &LoginRequest) -> ClientResult<LoginResponse> {
        let mut state = self.state.lock();
        state.calls.push("login".into());
        if let Some(err) = state.login_failures.pop_front() {
            return Err(err);
        }
        let token = format!("mock-token-{}", state.issued_tokens);
        state.issued_tokens += 1;
        Ok(LoginResponse {
            token,
            expires_at: None,
        })
    }

    async fn select(&self, token: &SessionToken, scope: &Scope) -> ClientResult<()> {
        let mut state = self.state.lock();
        let label = scope
            .select_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "root".into());
        state.calls.push(format!("select:{label}"));
        Self::check_token(&state, token)?;
        state.selected = Some(scope.clone());
        Ok(())
    }

    async fn list(
        &self,
        token: &SessionToken,
        level: HierarchyLevel,
    ) -> ClientResult<RemoteRecordSet> {
        let mut state = self.state.lock();
        state.calls.push(format!("list:{level}"));
        Self::check_token(&state, token)?;

        let scope = match level {
            HierarchyLevel::Directory => Scope::Root,
            _ => state
                .selected
                .clone()
                .ok_or_else(|| ClientError::InvalidResponse("no scope selected".into()))?,
        };

        if let Some(queue) = state.list_failures.get_mut(&scope) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }

        match state.records.get(&scope) {
            Some(records) if records.level() == level => Ok(records.clone()),
            Some(records) => Err(ClientError::InvalidResponse(format!(
                "scope holds {} records, asked for {level}",
                records.level()
            ))),
            None => Ok(empty_set(level)),
        }
    }
}

fn empty_set(level: HierarchyLevel) -> RemoteRecordSet {
    match level {
        HierarchyLevel::Directory => RemoteRecordSet::Directories(Vec::new()),
        HierarchyLevel::Project => RemoteRecordSet::Projects(Vec::new()),
        HierarchyLevel::Phase => RemoteRecordSet::Phases(Vec::new()),
        HierarchyLevel::Elevation => RemoteRecordSet::Elevations(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catmirror_model::{RemoteId, RemoteProject};

    async fn login(transport: &MockTransport) -> SessionToken {
        transport
            .login(&LoginRequest {
                username: "u".into(),
                password: "p".into(),
            })
            .await
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn select_then_list_returns_scoped_records() {
        let transport = MockTransport::new();
        let dir = Scope::Directory(RemoteId::new("d1"));
        transport.set_records(
            dir.clone(),
            RemoteRecordSet::Projects(vec![RemoteProject {
                id: RemoteId::new("p1"),
                name: "Atrium".into(),
                status: "open".into(),
                changed_at: None,
            }]),
        );

        let token = login(&transport).await;
        transport.select(&token, &dir).await.unwrap();
        let records = transport
            .list(&token, HierarchyLevel::Project)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            transport.calls(),
            vec!["login", "select:d1", "list:project"]
        );
    }

    #[tokio::test]
    async fn expired_token_is_tagged() {
        let transport = MockTransport::new();
        let token = login(&transport).await;
        transport.expire_all_tokens();

        let result = transport
            .select(&token, &Scope::Directory(RemoteId::new("d1")))
            .await;
        assert!(matches!(result, Err(ClientError::AuthExpired)));
    }

    #[tokio::test]
    async fn injected_list_failure_is_served_once() {
        let transport = MockTransport::new();
        let token = login(&transport).await;
        transport.fail_next_list(Scope::Root, ClientError::status(503, "busy"));

        let first = transport.list(&token, HierarchyLevel::Directory).await;
        assert!(matches!(first, Err(ClientError::Status { code: 503, .. })));

        let second = transport.list(&token, HierarchyLevel::Directory).await;
        assert!(second.unwrap().is_empty());
    }
}
