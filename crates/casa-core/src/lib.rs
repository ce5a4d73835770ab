//! Core types for the casa storefront data layer.
//!
//! This crate provides the leaf abstractions shared by every other crate:
//! - `RequestId` / `RequestContext` - Request correlation
//! - `Clock` - Injectable time source (`SystemClock`, `ManualClock`)
//! - `CasaConfig` - Layered configuration (file + environment)

mod clock;
mod config;
mod context;

pub use clock::*;
pub use config::*;
pub use context::*;
