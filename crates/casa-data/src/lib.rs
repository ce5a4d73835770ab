//! Backend access with classified retries and timeouts.
//!
//! This crate provides:
//! - `Backend` - The query interface of the hosted backend
//! - `InMemoryBackend` - Table-of-rows backend for development and tests
//! - `QueryError` / `classify` - Connection, timeout and fatal error classes
//! - `ResilientQuery` - Bounded retry loop with per-attempt timeouts
//! - `BackendClient` - Per-resource policies and metrics around a backend
//! - `KeepAlive` - Background health checks and session refresh

mod backend;
mod client;
mod dependency;
mod error;
mod keepalive;
mod memory;
mod resilient;
mod retry;
mod timeout;

pub use backend::*;
pub use client::*;
pub use dependency::*;
pub use error::*;
pub use keepalive::*;
pub use memory::*;
pub use resilient::*;
pub use retry::*;
pub use timeout::*;
