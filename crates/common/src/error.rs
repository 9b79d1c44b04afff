use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("token exchange failed (status {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("API error (status code: {status_code}): {body}")]
    Api { status_code: u16, body: String },

    #[error("validation error: {reason} (field: {field}, value: {value})")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// The primary write for `guid` committed, the follow-up adjustment of
    /// `related` did not.
    #[error("device {guid} saved but relationship with {related} is inconsistent: {source}")]
    PartialConsistency {
        guid: String,
        related: String,
        #[source]
        source: Box<Error>,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Transport faults, rate limiting and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let rate_limited = Error::Api { status_code: 429, body: String::new() };
        let server = Error::Api { status_code: 503, body: String::new() };
        let client = Error::Api { status_code: 404, body: String::new() };

        assert!(rate_limited.is_retryable());
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(Error::Http("connection reset".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_partial_consistency_message() {
        let err = Error::PartialConsistency {
            guid: "child-1".into(),
            related: "parent-1".into(),
            source: Box::new(Error::Storage("disk full".into())),
        };

        let msg = err.to_string();
        assert!(msg.contains("child-1"));
        assert!(msg.contains("parent-1"));
        assert!(msg.contains("disk full"));
    }
}
