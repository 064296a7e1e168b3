//! Error types for Brandpilot Core

use thiserror::Error;

/// Result type alias using Brandpilot Error
pub type Result<T> = std::result::Result<T, Error>;

/// Brandpilot error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tool call depth limit of {0} exceeded")]
    ToolDepthExceeded(usize),
}

/// Which timeout budget of an upstream call ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Sending the request and waiting for response headers
    Request,
    /// Reading and decoding the response body
    Read,
}

/// Upstream API errors, classified by cause
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("DeepSeek API rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("DeepSeek API authentication error. Please check your API key.")]
    Authentication,

    #[error("DeepSeek API server error ({status})")]
    Server { status: u16 },

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("{}", timeout_message(.phase, .seconds))]
    Timeout { phase: TimeoutPhase, seconds: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Request cancelled")]
    Cancelled,
}

fn timeout_message(phase: &TimeoutPhase, seconds: &u64) -> String {
    match phase {
        TimeoutPhase::Request => format!("request timed out after {} seconds", seconds),
        TimeoutPhase::Read => format!("response reading timed out after {} seconds", seconds),
    }
}

impl ProviderError {
    /// Map a non-success HTTP status to its error condition
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            429 => ProviderError::RateLimited,
            401 | 403 => ProviderError::Authentication,
            500..=599 => ProviderError::Server { status },
            _ => ProviderError::Api {
                status,
                body: body.into(),
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }
}

/// Tool-specific errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),
}

/// Session cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(ProviderError::from_status(429, ""), ProviderError::RateLimited));
        assert!(matches!(ProviderError::from_status(401, ""), ProviderError::Authentication));
        assert!(matches!(ProviderError::from_status(403, ""), ProviderError::Authentication));
        assert!(matches!(
            ProviderError::from_status(503, ""),
            ProviderError::Server { status: 503 }
        ));
        match ProviderError::from_status(404, "missing") {
            ProviderError::Api { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "missing");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_timeout_message_includes_budget() {
        let err = ProviderError::Timeout {
            phase: TimeoutPhase::Read,
            seconds: 30,
        };
        assert_eq!(err.to_string(), "response reading timed out after 30 seconds");
        assert!(err.is_timeout());

        let err = ProviderError::Timeout {
            phase: TimeoutPhase::Request,
            seconds: 60,
        };
        assert_eq!(err.to_string(), "request timed out after 60 seconds");
    }

    #[test]
    fn test_api_error_display() {
        let err = ProviderError::from_status(418, "teapot");
        assert_eq!(err.to_string(), "API error: 418 - teapot");
        assert_eq!(
            ProviderError::Server { status: 502 }.to_string(),
            "DeepSeek API server error (502)"
        );
    }
}
