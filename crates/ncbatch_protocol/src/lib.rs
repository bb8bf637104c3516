//! # ncbatch protocol
//!
//! Wire-level pieces of the NETCONF batch engine.
//!
//! This crate provides:
//! - Request envelopes (load, delete, validate, commit, group listing)
//! - Reply markers and request classification
//! - XML document parsing for apply-group name extraction
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod document;
pub mod envelope;
mod error;
mod reply;

pub use document::{find_apply_group_name, Document, GroupDefinition};
pub use error::{ParseError, ParseResult};
pub use reply::{RequestKind, RpcReply, COMMIT_CHECK_SUCCESS, OPERATION_FAILED};
