//! Fallback execution for storefront reads.
//!
//! This crate keeps reads answering when the backend misbehaves:
//! - `FallbackCascade` - Ordered strategies, first success wins
//! - `first_success` - The bare combinator behind it
//! - `Degrade` - What a failed read serves instead

mod degrade;
mod fallback;

pub use degrade::*;
pub use fallback::*;
