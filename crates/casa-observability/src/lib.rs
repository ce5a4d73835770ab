//! Observability for the casa storefront data layer.
//!
//! This crate provides:
//! - `init_logging` - Global `tracing` subscriber setup
//! - `MetricsCollector` - Per-request backend query and cache metrics

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

// Re-export RequestId from casa-core for convenience
pub use casa_core::{LogFormat, RequestId};
