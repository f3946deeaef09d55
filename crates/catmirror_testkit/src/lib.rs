//! # catmirror testkit
//!
//! Test utilities for catmirror.
//!
//! This crate provides:
//! - Catalog fixtures that script a whole remote hierarchy into a
//!   [`MockTransport`](catmirror_client::MockTransport)
//! - A fast-clock client constructor for engine tests
//! - Property-based generators for remote records and parts payloads

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
