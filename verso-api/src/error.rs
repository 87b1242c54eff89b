//! Error type for the REST client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure or undecodable response body.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status; `message` carries the server's own wording
    /// when the body provided one.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Whether this error came back with the given HTTP status.
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicate() {
        let err = ApiError::Status {
            status: 404,
            message: "not found".to_string(),
        };
        assert!(err.is_status(404));
        assert!(!err.is_status(500));
        assert_eq!(err.to_string(), "server returned 404: not found");
    }
}
