//! Error taxonomy for the assistant core.
//!
//! Input errors and retrieval misses never become errors; they are normalised
//! or served from the fallback cascade. Collaborator failures are produced by
//! the HTTP clients and swallowed by the resilient gateways. Router faults are
//! converted to apology replies at the router boundary.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Corpus load failed: {0}")]
    Corpus(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("External call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed payload from {source_name}: {detail}")]
    Payload { source_name: String, detail: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Handler failed: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, AssistantError>;

impl AssistantError {
    pub fn payload(source_name: &str, detail: impl Into<String>) -> Self {
        AssistantError::Payload {
            source_name: source_name.to_string(),
            detail: detail.into(),
        }
    }

    /// Collaborator failures are recoverable with static data.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            AssistantError::Http(_) | AssistantError::Timeout(_) | AssistantError::Payload { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_failures_are_external() {
        assert!(AssistantError::Timeout(Duration::from_secs(4)).is_external());
        assert!(AssistantError::payload("coingecko", "missing usd").is_external());
        assert!(!AssistantError::Handler("bad price".into()).is_external());
        assert!(!AssistantError::Corpus("empty".into()).is_external());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!AssistantError::from(io).is_external());
    }
}
