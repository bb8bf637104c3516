//! Device replies and request classification.
//!
//! The device reports failures inside free-form reply text rather than as a
//! structured status, so replies are classified by searching for known
//! marker substrings.

use std::fmt;

use crate::envelope::{COMMIT, GET_GROUPS, VALIDATE_CANDIDATE};

/// Marker present in a reply body when an operation was rejected.
pub const OPERATION_FAILED: &str = "operation-failed";

/// Marker a successful candidate validation must contain.
pub const COMMIT_CHECK_SUCCESS: &str = "commit-check-success";

/// Raw reply returned by the transport for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcReply {
    /// Reply body as received.
    pub data: String,
}

impl RpcReply {
    /// Creates a reply carrying the given body.
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Returns true if the body carries the failure marker.
    pub fn is_operation_failed(&self) -> bool {
        self.data.contains(OPERATION_FAILED)
    }

    /// Returns true if the body confirms a successful commit check.
    pub fn is_commit_check_success(&self) -> bool {
        self.data.contains(COMMIT_CHECK_SUCCESS)
    }
}

impl From<&str> for RpcReply {
    fn from(data: &str) -> Self {
        Self::new(data)
    }
}

impl From<String> for RpcReply {
    fn from(data: String) -> Self {
        Self { data }
    }
}

/// The kind of request an outgoing document represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Full apply-group listing.
    GetGroups,
    /// Edit-config carrying group deletions.
    Delete,
    /// Merge load of group definitions.
    Load,
    /// Candidate validation.
    Validate,
    /// Commit of the candidate.
    Commit,
    /// Anything this crate did not build.
    Other,
}

impl RequestKind {
    /// Classifies an outgoing document by its leading element.
    pub fn classify(document: &str) -> Self {
        let document = document.trim_start();
        if document.starts_with(GET_GROUPS) {
            RequestKind::GetGroups
        } else if document.starts_with("<edit-config>") {
            RequestKind::Delete
        } else if document.starts_with("<load-configuration") {
            RequestKind::Load
        } else if document.starts_with(VALIDATE_CANDIDATE) {
            RequestKind::Validate
        } else if document.starts_with(COMMIT) {
            RequestKind::Commit
        } else {
            RequestKind::Other
        }
    }

    /// Short label used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::GetGroups => "get-groups",
            RequestKind::Delete => "delete",
            RequestKind::Load => "load",
            RequestKind::Validate => "validate",
            RequestKind::Commit => "commit",
            RequestKind::Other => "other",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
