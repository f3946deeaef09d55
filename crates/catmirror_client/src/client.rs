//! Stateful, authenticated catalog client.
//!
//! Every remote call is routed through the channel's rate limiter and
//! retry policy. `select` + `list` pairs hold a session lock so no other
//! call can interleave and invalidate the remote navigation context. A
//! call that surfaces an expired session triggers exactly one transparent
//! re-login and one retry of the original call.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::rate_limit::RateLimiter;
use crate::retry;
use crate::transport::{CatalogTransport, LoginRequest, SessionToken};
use catmirror_model::{
    RemoteDirectory, RemoteElevation, RemoteId, RemotePhase, RemoteProject, RemoteRecordSet, Scope,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Remote catalog client, generic over the transport.
pub struct CatalogClient<T: CatalogTransport> {
    config: ClientConfig,
    transport: T,
    auth_limiter: RateLimiter,
    data_limiter: RateLimiter,
    token: RwLock<Option<SessionToken>>,
    session: Mutex<()>,
}

impl<T: CatalogTransport> CatalogClient<T> {
    /// Creates a client. Fails fast on invalid configuration.
    pub fn new(config: ClientConfig, transport: T) -> ClientResult<Self> {
        config.validate()?;
        let auth_limiter = RateLimiter::per_second("authentication", config.auth_rate_per_sec);
        let data_limiter = RateLimiter::per_second("data", config.data_rate_per_sec);
        Ok(Self {
            config,
            transport,
            auth_limiter,
            data_limiter,
            token: RwLock::new(None),
            session: Mutex::new(()),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Logs in and stores the session token.
    pub async fn authenticate(&self) -> ClientResult<()> {
        let request = LoginRequest {
            username: self.config.username.clone(),
            password: self.config.password.clone(),
        };

        let response = retry::execute(&self.config.auth_retry, "login", || {
            let request = request.clone();
            async move {
                self.auth_limiter.acquire().await;
                self.transport.login(&request).await
            }
        })
        .await?;

        *self.token.write().await = Some(response.into());
        info!("authenticated against remote catalog");
        Ok(())
    }

    /// Lists the root directory tree.
    pub async fn list_directories(&self) -> ClientResult<Vec<RemoteDirectory>> {
        match self.fetch(&Scope::Root).await? {
            RemoteRecordSet::Directories(records) => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Lists the projects of a directory.
    pub async fn list_projects(&self, directory: &RemoteId) -> ClientResult<Vec<RemoteProject>> {
        match self.fetch(&Scope::Directory(directory.clone())).await? {
            RemoteRecordSet::Projects(records) => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Lists the phases of a project.
    pub async fn list_phases(&self, project: &RemoteId) -> ClientResult<Vec<RemotePhase>> {
        match self.fetch(&Scope::Project(project.clone())).await? {
            RemoteRecordSet::Phases(records) => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Lists the elevations of a phase.
    pub async fn list_elevations(&self, phase: &RemoteId) -> ClientResult<Vec<RemoteElevation>> {
        match self.fetch(&Scope::Phase(phase.clone())).await? {
            RemoteRecordSet::Elevations(records) => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Fetches the children of a scope, holding the session lock for the
    /// whole `select` + `list` pair.
    async fn fetch(&self, scope: &Scope) -> ClientResult<RemoteRecordSet> {
        let _session = self.session.lock().await;

        match self.fetch_inner(scope).await {
            Err(ClientError::AuthExpired) => {
                debug!("session expired, re-authenticating once");
                *self.token.write().await = None;
                self.authenticate().await?;
                self.fetch_inner(scope).await
            }
            other => other,
        }
    }

    async fn fetch_inner(&self, scope: &Scope) -> ClientResult<RemoteRecordSet> {
        let token = self.current_token().await?;
        let level = scope.child_level();

        if scope.select_id().is_some() {
            retry::execute(&self.config.data_retry, "select", || {
                let token = token.clone();
                async move {
                    self.data_limiter.acquire().await;
                    self.transport.select(&token, scope).await
                }
            })
            .await?;
        }

        retry::execute(&self.config.data_retry, "list", || {
            let token = token.clone();
            async move {
                self.data_limiter.acquire().await;
                self.transport.list(&token, level).await
            }
        })
        .await
    }

    async fn current_token(&self) -> ClientResult<SessionToken> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.authenticate().await?;
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| ClientError::AuthenticationFailed("no session token".into()))
    }
}

fn unexpected(set: RemoteRecordSet) -> ClientError {
    ClientError::InvalidResponse(format!("unexpected {} records", set.level()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::sync::Arc;

    fn config() -> ClientConfig {
        ClientConfig::new("https://catalog.example.com", "svc", "secret")
            .with_auth_rate(100.0)
            .with_data_rate(100.0)
    }

    fn remote_project(id: &str) -> RemoteProject {
        RemoteProject {
            id: RemoteId::new(id),
            name: format!("project {id}"),
            status: "open".into(),
            changed_at: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lists_after_implicit_login() {
        let transport = MockTransport::new();
        transport.set_records(
            Scope::Directory(RemoteId::new("d1")),
            RemoteRecordSet::Projects(vec![remote_project("p1")]),
        );
        let client = CatalogClient::new(config(), transport).unwrap();

        let projects = client.list_projects(&RemoteId::new("d1")).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(client.transport().login_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_triggers_one_relogin_and_retry() {
        let transport = MockTransport::new();
        transport.set_records(
            Scope::Directory(RemoteId::new("d1")),
            RemoteRecordSet::Projects(vec![remote_project("p1")]),
        );
        let client = CatalogClient::new(config(), transport).unwrap();
        client.authenticate().await.unwrap();
        client.transport().expire_all_tokens();

        let projects = client.list_projects(&RemoteId::new("d1")).await.unwrap();
        assert_eq!(projects.len(), 1);
        // Initial login plus exactly one transparent re-login.
        assert_eq!(client.transport().login_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_login_is_not_retried() {
        let transport = MockTransport::new();
        transport.fail_next_login(ClientError::AuthenticationFailed("bad password".into()));
        let client = CatalogClient::new(config(), transport).unwrap();

        let result = client.authenticate().await;
        assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
        assert_eq!(client.transport().login_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_list_failure_is_retried_through() {
        let transport = MockTransport::new();
        transport.set_records(
            Scope::Root,
            RemoteRecordSet::Directories(vec![RemoteDirectory {
                id: RemoteId::new("d1"),
                name: "Plant".into(),
                path: "/Plant".into(),
                parent_id: None,
                changed_at: None,
            }]),
        );
        transport.fail_next_list(Scope::Root, ClientError::status(503, "busy"));
        let client = CatalogClient::new(config(), transport).unwrap();

        let dirs = client.list_directories().await.unwrap();
        assert_eq!(dirs.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn select_list_pairs_never_interleave() {
        let transport = MockTransport::new();
        transport.set_records(
            Scope::Directory(RemoteId::new("d1")),
            RemoteRecordSet::Projects(vec![remote_project("p1")]),
        );
        transport.set_records(
            Scope::Directory(RemoteId::new("d2")),
            RemoteRecordSet::Projects(vec![remote_project("p2")]),
        );
        let client = Arc::new(CatalogClient::new(config(), transport).unwrap());
        client.authenticate().await.unwrap();

        let a = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.list_projects(&RemoteId::new("d1")).await })
        };
        let b = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.list_projects(&RemoteId::new("d2")).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let calls = client.transport().calls();
        for (i, call) in calls.iter().enumerate() {
            if let Some(id) = call.strip_prefix("select:") {
                assert_eq!(
                    calls.get(i + 1).map(String::as_str),
                    Some("list:project"),
                    "select:{id} must be followed by its list, got {calls:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_remote_call() {
        let transport = MockTransport::new();
        let result = CatalogClient::new(ClientConfig::new("", "", ""), transport);
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
