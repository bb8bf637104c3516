//! Error types for the batch engine.

use ncbatch_protocol::{ParseError, RequestKind};
use thiserror::Error;

use crate::transport::TransportError;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while staging or committing a batch.
#[derive(Error, Debug)]
pub enum BatchError {
    /// A document could not be parsed or lacks its group identifier.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A transport failure reported as is, with no follow-up close.
    #[error(transparent)]
    Driver(TransportError),

    /// Dial or send failed mid-sequence.
    ///
    /// The transport is then closed on a best-effort basis and any failure
    /// of that close is carried alongside the primary cause.
    #[error("driver error: {source}, driver close error: {}", fmt_close(.close))]
    Transport {
        /// The failure that aborted the operation.
        source: TransportError,
        /// Failure of the follow-up close, if any.
        close: Option<TransportError>,
    },

    /// The device rejected a request, or a required success marker was
    /// absent from its reply.
    #[error("{stage} rejected by device: {reply}")]
    Rejected {
        /// The request that was rejected.
        stage: RequestKind,
        /// Full reply body.
        reply: String,
    },

    /// A typed configuration object could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The transport handle was released with `close()`.
    #[error("transport handle has been closed")]
    Closed,
}

fn fmt_close(close: &Option<TransportError>) -> String {
    match close {
        Some(err) => err.to_string(),
        None => "none".into(),
    }
}

impl BatchError {
    /// Creates a transport error carrying the outcome of a best-effort close.
    pub fn transport_with_close(source: TransportError, close: Result<(), TransportError>) -> Self {
        Self::Transport {
            source,
            close: close.err(),
        }
    }

    /// Returns true if the device may hold a modified, uncommitted candidate.
    ///
    /// Only a failed validation leaves the candidate loaded; earlier
    /// rejections stop before the candidate is fully populated and a commit
    /// rejection reports the device's own state.
    pub fn candidate_modified(&self) -> bool {
        matches!(
            self,
            BatchError::Rejected {
                stage: RequestKind::Validate,
                ..
            }
        )
    }
}

impl From<TransportError> for BatchError {
    fn from(err: TransportError) -> Self {
        Self::Driver(err)
    }
}
