//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for document parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors raised while reading a configuration document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The text is not a well-formed XML document.
    #[error("malformed document: {message}")]
    Malformed {
        /// Description reported by the XML reader.
        message: String,
    },

    /// A node the operation depends on is absent.
    #[error("missing <{element}> element")]
    MissingElement {
        /// Local name of the expected element.
        element: &'static str,
    },

    /// The identifier node exists but carries no text.
    #[error("empty <{element}> element")]
    EmptyElement {
        /// Local name of the element.
        element: &'static str,
    },
}

impl ParseError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ParseError::MissingElement {
            element: "apply-groups",
        };
        assert_eq!(err.to_string(), "missing <apply-groups> element");

        let err = ParseError::malformed("unexpected end of stream");
        assert!(err.to_string().contains("unexpected end of stream"));
    }
}
