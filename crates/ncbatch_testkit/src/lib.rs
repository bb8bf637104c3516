//! # ncbatch testkit
//!
//! Test utilities for ncbatch.
//!
//! This crate provides:
//! - Fixtures for group fragments, device snapshots and device replies
//! - Property-based test generators using proptest

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
