//! Error types for Artifactory operations.
//!
//! Errors are categorized to enable retry logic and appropriate user
//! feedback. Responses with a status of 400 or above become
//! [`Error::Http`], which keeps the status, method, URL and body the server
//! returned.

use crate::transport::Method;
use thiserror::Error;

/// Categories of Artifactory errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS or timeout failures (retryable)
    Network,
    /// Server-side hiccups such as 502/503/504 (retryable)
    Transient,
    /// The object does not exist
    NotFound,
    /// The server or the local schema rejected a value
    Validation,
    /// Provider configuration is incomplete or invalid
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Transient => "Server temporarily unavailable",
            Self::NotFound => "Object not found",
            Self::Validation => "Invalid value",
            Self::Config => "Invalid provider configuration",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the server URL and your connection, then try again",
            Self::Transient => "Wait a moment and try again",
            Self::NotFound => "Verify the key or name, or remove the object from state",
            Self::Validation => "Fix the reported attribute and try again",
            Self::Config => "Set the URL and one of access_token, api_key or username/password",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to Artifactory or Xray.
#[derive(Debug, Error)]
pub enum Error {
    /// The server answered with a status of 400 or above
    #[error("\n{status} {method} {url}\n{body}")]
    Http {
        status: u16,
        method: Method,
        url: String,
        body: String,
    },

    /// The request never got a response
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed network operation
        message: String,
    },

    /// Provider configuration problem
    #[error("{0}")]
    Config(String),

    /// The response body was not what the payload type expects
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Usage reporting failed during configuration
    #[error("unable to report usage {0}")]
    Usage(Box<Error>),

    /// Writing a payload into resource state failed
    #[error(transparent)]
    State(#[from] declarative::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation was cancelled before the request was sent
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status: 404, .. } => ErrorCategory::NotFound,
            Error::Http {
                status: 502..=504, ..
            } => ErrorCategory::Transient,
            Error::Http {
                status: 400 | 409 | 422,
                ..
            } => ErrorCategory::Validation,
            Error::Network { .. } => ErrorCategory::Network,
            Error::Config(_) => ErrorCategory::Config,
            Error::State(_) => ErrorCategory::Validation,
            Error::Usage(inner) => inner.category(),
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the server reported 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for Artifactory operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> Error {
        Error::Http {
            status,
            method: Method::Get,
            url: "https://example.jfrog.io/artifactory/api/repositories/x".into(),
            body: "{\"errors\":[]}".into(),
        }
    }

    #[test]
    fn test_http_display() {
        assert_eq!(
            http(404).to_string(),
            "\n404 GET https://example.jfrog.io/artifactory/api/repositories/x\n{\"errors\":[]}"
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(http(404).category(), ErrorCategory::NotFound);
        assert!(http(404).is_not_found());
        assert_eq!(http(503).category(), ErrorCategory::Transient);
        assert!(http(503).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(
            Error::Network {
                message: "connection refused".into()
            }
            .is_retryable()
        );
        assert_eq!(
            Error::Config("you must supply a URL".into()).category(),
            ErrorCategory::Config
        );
    }

    #[test]
    fn test_usage_error_wraps_cause() {
        let err = Error::Usage(Box::new(http(500)));
        assert!(err.to_string().starts_with("unable to report usage \n500 GET"));
        assert_eq!(err.status(), None);
    }
}
