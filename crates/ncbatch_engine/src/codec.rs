//! Conversion between typed configuration objects and group documents.

use crate::error::{BatchError, BatchResult};

/// A configuration object that can be written as, and read back from, a
/// group document.
///
/// `to_document` must produce a fragment carrying an `apply-groups`
/// reference, since that is how the engine files it. `from_document`
/// receives the `<configuration>`-wrapped document returned by a group
/// read.
pub trait GroupDocument: Sized {
    /// Encodes the object as a configuration fragment.
    fn to_document(&self) -> BatchResult<String>;

    /// Decodes the object from a group document.
    fn from_document(document: &str) -> BatchResult<Self>;
}

/// A pre-rendered fragment passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument(pub String);

impl GroupDocument for RawDocument {
    fn to_document(&self) -> BatchResult<String> {
        Ok(self.0.clone())
    }

    fn from_document(document: &str) -> BatchResult<Self> {
        if document.is_empty() {
            return Err(BatchError::Codec("empty document".into()));
        }
        Ok(Self(document.to_string()))
    }
}

impl From<String> for RawDocument {
    fn from(document: String) -> Self {
        Self(document)
    }
}
