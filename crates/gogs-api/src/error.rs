//! Error types for the Gogs API client.

use thiserror::Error;

/// Errors returned by [`crate::GogsClient`].
#[derive(Debug, Error)]
pub enum GogsError {
    /// The server answered with a status the call does not accept.
    #[error("HTTP request error. Status: {status}\n{body}")]
    Request { status: u16, body: String },

    /// Network failure before any status was received.
    #[error("Communication error: {0}")]
    Communication(#[from] reqwest::Error),

    /// A request body could not be serialized or a response could not be read.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client was built without a repository but the call needs one.
    #[error("No repository bound to client for owner {owner}")]
    RepositoryNotBound { owner: String },

    /// Invalid client configuration (bad URL, missing hook id, ...).
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GogsError {
    /// HTTP status carried by the error, `0` when no response was received.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Request { status, .. } => *status,
            Self::Communication(e) => e.status().map_or(0, |s| s.as_u16()),
            _ => 0,
        }
    }

    /// Raw response body for request errors.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Request { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether the server reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}

pub type Result<T> = std::result::Result<T, GogsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_exposes_status_and_body() {
        let err = GogsError::Request {
            status: 404,
            body: "{\"message\":\"Not Found\"}".to_string(),
        };
        assert_eq!(err.status(), 404);
        assert!(err.is_not_found());
        assert_eq!(err.body(), Some("{\"message\":\"Not Found\"}"));
        assert!(err.to_string().starts_with("HTTP request error. Status: 404"));
    }

    #[test]
    fn test_non_request_errors_have_zero_status() {
        let err = GogsError::RepositoryNotBound {
            owner: "alice".to_string(),
        };
        assert_eq!(err.status(), 0);
        assert!(err.body().is_none());
        assert!(!err.is_not_found());
    }
}
