//! # ncbatch engine
//!
//! Grouped accumulation and validate-before-commit engine for NETCONF
//! configuration batches.
//!
//! This crate provides:
//! - A concurrency-safe accumulator of pending reads, writes and deletes
//!   keyed by apply-group name
//! - A coordinator that turns the accumulated state into one device commit
//! - A transport abstraction with a scripted mock for testing
//! - A codec trait for typed configuration objects
//!
//! ## Commit sequence
//!
//! 1. Send every staged group deletion in one edit-config request
//! 2. Load every staged group definition in one merge request
//! 3. Validate the candidate configuration
//! 4. Commit
//!
//! ## Key Invariants
//!
//! - Deletes are always sent before writes
//! - Nothing is committed unless validation reported success
//! - Commits and read-cache hydration never interleave their round trips
//! - The read cache is hydrated from the device at most once
//! - A failed commit keeps everything that was staged

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accumulator;
mod codec;
mod config;
mod coordinator;
mod error;
mod transport;

pub use accumulator::{GroupAccumulator, PendingBatch, RawGroup};
pub use codec::{GroupDocument, RawDocument};
pub use config::{BatchConfig, ConfigError, Credentials, DeviceConfig, DEFAULT_NETCONF_PORT};
pub use coordinator::{BatchCoordinator, CommitPhase, CommitStats};
pub use error::{BatchError, BatchResult};
pub use transport::{MockTransport, Transport, TransportError, MOCK_OK_REPLY};

pub use ncbatch_protocol::{RequestKind, RpcReply};
