//! # catmirror client
//!
//! Rate-limited, retrying client for the remote catalog API.
//!
//! This crate provides:
//! - A tagged error taxonomy with retryability decided at the point the
//!   error is produced
//! - Retry with exponential backoff and jitter
//! - Per-channel rate limiting (authentication vs. data calls)
//! - A transport abstraction with a reqwest implementation and a
//!   scripted mock
//! - A stateful client that serializes `select` + `list` pairs and
//!   transparently re-authenticates once on session expiry
//!
//! ## Key invariants
//!
//! - No remote call bypasses its channel's rate limiter
//! - Retryability is a property of the error variant, never of its message
//! - A `select` + `list` pair is never interleaved with another call on
//!   the same session
//! - Session expiry triggers at most one re-login per call

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod http;
mod rate_limit;
mod retry;
mod transport;

pub use client::CatalogClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpTransport;
pub use rate_limit::RateLimiter;
pub use retry::{execute as execute_with_retry, RetryPolicy};
pub use transport::{CatalogTransport, LoginRequest, LoginResponse, MockTransport, SessionToken};
