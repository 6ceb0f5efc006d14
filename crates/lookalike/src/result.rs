//! Result and error types for Lookalike.

use thiserror::Error;

/// Result type for Lookalike operations
pub type LookalikeResult<T> = Result<T, LookalikeError>;

/// Errors that can occur in Lookalike
#[derive(Debug, Error)]
pub enum LookalikeError {
    /// A locator or option was blank or otherwise unusable
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// A locator could not be reached or read
    #[error("Problem encountered retrieving {locator}.")]
    Retrieval {
        /// Locator that failed
        locator: String,
        /// Underlying cause
        message: String,
    },

    /// Retrieved bytes could not be decoded as an image
    #[error("Image at {locator} could not be decoded.")]
    MalformedImage {
        /// Locator the bytes came from
        locator: String,
        /// Decoder message
        message: String,
    },

    /// A case failed in a way the executor does not recover from
    #[error("Unexpected failure: {message}")]
    Unexpected {
        /// Error message
        message: String,
    },

    /// An artifact or the report could not be written
    #[error("Failed to persist {path}: {message}")]
    Persistence {
        /// Destination path
        path: String,
        /// Error message
        message: String,
    },

    /// Template could not be read or rendered
    #[error("Template error: {message}")]
    Template {
        /// Error message
        message: String,
    },

    /// Configuration or manifest is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl LookalikeError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a retrieval error
    #[must_use]
    pub fn retrieval(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retrieval {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create a malformed image error
    #[must_use]
    pub fn malformed_image(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedImage {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected error
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Create a persistence error
    #[must_use]
    pub fn persistence(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a template error
    #[must_use]
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether a case executor records this error as a failed test
    /// instead of propagating it.
    ///
    /// Bad arguments, retrieval failures, undecodable images and raw I/O
    /// errors are recoverable. Everything else aborts the case's task.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::Retrieval { .. }
                | Self::MalformedImage { .. }
                | Self::Io(_)
        )
    }

    /// Message of the underlying cause, when the error wraps one
    #[must_use]
    pub fn cause_message(&self) -> Option<&str> {
        match self {
            Self::Retrieval { message, .. } | Self::MalformedImage { message, .. } => {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classes() {
        assert!(LookalikeError::invalid_argument("blank").is_recoverable());
        assert!(LookalikeError::retrieval("a.png", "404").is_recoverable());
        assert!(LookalikeError::malformed_image("a.png", "bad magic").is_recoverable());
        assert!(LookalikeError::Io(std::io::Error::other("disk")).is_recoverable());
    }

    #[test]
    fn test_unrecoverable_classes() {
        assert!(!LookalikeError::unexpected("bug").is_recoverable());
        assert!(!LookalikeError::template("unclosed").is_recoverable());
        assert!(!LookalikeError::persistence("x", "y").is_recoverable());
        assert!(!LookalikeError::config("z").is_recoverable());
    }

    #[test]
    fn test_retrieval_message_names_locator() {
        let err = LookalikeError::retrieval("http://host/a.png", "status 404");
        let text = err.to_string();
        assert!(text.contains("http://host/a.png"));
        assert!(!text.contains("status 404"));
        assert_eq!(err.cause_message(), Some("status 404"));
    }

    #[test]
    fn test_cause_message_absent_for_plain_errors() {
        assert!(LookalikeError::invalid_argument("blank")
            .cause_message()
            .is_none());
    }
}
