//! HTTP transport against the real remote catalog API.
//!
//! Endpoints:
//! - `POST /login` — credentials to bearer token + expiry
//! - `POST /select/{scope_id}` — sets the session navigation context
//! - `GET /directories|/projects|/phases|/elevations` — child records
//!
//! Errors are tagged at the point of production: 401 on a data call is
//! [`ClientError::AuthExpired`], 401/403 at login is
//! [`ClientError::AuthenticationFailed`], 429/502/503/504 are retryable
//! statuses, everything else 4xx/5xx is a fatal [`ClientError::Status`].

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{CatalogTransport, LoginRequest, LoginResponse, SessionToken};
use async_trait::async_trait;
use catmirror_model::{
    HierarchyLevel, RemoteDirectory, RemoteElevation, RemotePhase, RemoteProject, RemoteRecordSet,
    Scope,
};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 256;

/// Reqwest-backed transport.
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport for the given base URL with a per-call timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Creates a transport from a client configuration, taking its base
    /// URL and per-call request timeout.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(config.base_url.as_str(), config.request_timeout)
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthExpired);
        }
        let mut body = response.text().await.unwrap_or_default();
        body.truncate(ERROR_BODY_LIMIT);
        Err(ClientError::status(status.as_u16(), body))
    }

    fn level_path(level: HierarchyLevel) -> &'static str {
        match level {
            HierarchyLevel::Directory => "directories",
            HierarchyLevel::Project => "projects",
            HierarchyLevel::Phase => "phases",
            HierarchyLevel::Elevation => "elevations",
        }
    }
}

#[async_trait]
impl CatalogTransport for HttpTransport {
    async fn login(&self, request: &LoginRequest) -> ClientResult<LoginResponse> {
        let response = self
            .client
            .post(self.url("login"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(ERROR_BODY_LIMIT);
            return Err(ClientError::AuthenticationFailed(body));
        }
        let response = Self::check(response).await?;
        response
            .json::<LoginResponse>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn select(&self, token: &SessionToken, scope: &Scope) -> ClientResult<()> {
        let Some(scope_id) = scope.select_id() else {
            // The root needs no navigation context.
            return Ok(());
        };
        let response = self
            .client
            .post(self.url(&format!("select/{scope_id}")))
            .bearer_auth(&token.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list(
        &self,
        token: &SessionToken,
        level: HierarchyLevel,
    ) -> ClientResult<RemoteRecordSet> {
        let response = self
            .client
            .get(self.url(Self::level_path(level)))
            .bearer_auth(&token.token)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let set = match level {
            HierarchyLevel::Directory => RemoteRecordSet::Directories(
                response
                    .json::<Vec<RemoteDirectory>>()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?,
            ),
            HierarchyLevel::Project => RemoteRecordSet::Projects(
                response
                    .json::<Vec<RemoteProject>>()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?,
            ),
            HierarchyLevel::Phase => RemoteRecordSet::Phases(
                response
                    .json::<Vec<RemotePhase>>()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?,
            ),
            HierarchyLevel::Elevation => RemoteRecordSet::Elevations(
                response
                    .json::<Vec<RemoteElevation>>()
                    .await
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?,
            ),
        };
        Ok(set)
    }
}
