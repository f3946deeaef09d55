//! Client configuration.

use crate::error::{ClientError, ClientResult};
use crate::retry::RetryPolicy;
use std::time::Duration;

/// Configuration for the remote catalog client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote catalog API.
    pub base_url: String,
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Per-call timeout for remote requests.
    pub request_timeout: Duration,
    /// Allowed login calls per second.
    pub auth_rate_per_sec: f64,
    /// Allowed data calls per second.
    pub data_rate_per_sec: f64,
    /// Retry policy for the authentication channel.
    pub auth_retry: RetryPolicy,
    /// Retry policy for the data channel.
    pub data_retry: RetryPolicy,
}

impl ClientConfig {
    /// Creates a configuration with the default channel rates (1 login/s,
    /// 2 data calls/s) and retry policies.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            request_timeout: Duration::from_secs(30),
            auth_rate_per_sec: 1.0,
            data_rate_per_sec: 2.0,
            auth_retry: RetryPolicy::new(3),
            data_retry: RetryPolicy::new(3),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the data channel rate.
    pub fn with_data_rate(mut self, per_second: f64) -> Self {
        self.data_rate_per_sec = per_second;
        self
    }

    /// Sets the authentication channel rate.
    pub fn with_auth_rate(mut self, per_second: f64) -> Self {
        self.auth_rate_per_sec = per_second;
        self
    }

    /// Sets the data channel retry policy.
    pub fn with_data_retry(mut self, policy: RetryPolicy) -> Self {
        self.data_retry = policy;
        self
    }

    /// Sets the authentication channel retry policy.
    pub fn with_auth_retry(mut self, policy: RetryPolicy) -> Self {
        self.auth_retry = policy;
        self
    }

    /// Validates the configuration before any remote call is made.
    pub fn validate(&self) -> ClientResult<()> {
        if self.base_url.is_empty() {
            return Err(ClientError::Configuration(
                "remote catalog URL is not configured".into(),
            ));
        }
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ClientError::Configuration(
                "remote catalog credentials are not configured".into(),
            ));
        }
        if self.auth_rate_per_sec <= 0.0 || self.data_rate_per_sec <= 0.0 {
            return Err(ClientError::Configuration(
                "channel rates must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes() {
        let config = ClientConfig::new("https://catalog.example.com", "svc", "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_credentials_are_a_configuration_error() {
        let config = ClientConfig::new("https://catalog.example.com", "", "");
        assert!(matches!(
            config.validate(),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn missing_url_is_a_configuration_error() {
        let config = ClientConfig::new("", "svc", "secret");
        assert!(config.validate().is_err());
    }
}
