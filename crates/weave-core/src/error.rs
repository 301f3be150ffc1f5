//! Error types for Weave

use thiserror::Error;

/// Result type alias using Weave's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Weave error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}. Check your API key with `weave config get llm.api_key`.")]
    LLMError(String),

    #[error("Rate limited. Retry after {0} seconds.")]
    RateLimited(u64),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Pipeline errors (E900-E999)
    #[error("Knowledge extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Model output was not a valid extraction envelope: {0}")]
    MalformedOutput(String),

    #[error("Graph traversal failed: {0}")]
    TraversalFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::ExtractionFailed(_) => "E900",
            Self::MalformedOutput(_) => "E901",
            Self::TraversalFailed(_) => "E902",
            Self::Serialization(_) => "E903",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => Some("weave config get llm.api_key".to_string()),
            Self::RateLimited(secs) => Some(format!("Wait {} seconds and retry", secs)),
            Self::DatabaseError(_) => Some("weave doctor".to_string()),
            Self::ConfigError(_) => Some("weave config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error originates from the graph store.
    ///
    /// Storage failures abort the enclosing operation. Everything on the
    /// model side is absorbed by the extractor instead.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::DatabaseError(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidInput("x".into()).code(), "E800");
        assert_eq!(Error::ConfigError("x".into()).code(), "E600");
        assert_eq!(Error::LLMError("boom".into()).code(), "E101");
        assert_eq!(Error::RateLimited(3).code(), "E102");
        assert_eq!(Error::MalformedOutput("nope".into()).code(), "E901");
        assert_eq!(Error::Other("misc".into()).code(), "E9999");
    }

    #[test]
    fn test_suggestions() {
        assert_eq!(
            Error::RateLimited(30).suggestion().as_deref(),
            Some("Wait 30 seconds and retry")
        );
        assert!(Error::InvalidInput("bad".into()).suggestion().is_none());
    }

    #[test]
    fn test_storage_classification() {
        let io = Error::Io(std::io::Error::other("disk full"));
        assert!(io.is_storage());
        assert!(!Error::LLMError("quota".into()).is_storage());
        assert!(!Error::MalformedOutput("trailing garbage".into()).is_storage());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::InvalidInput("calendar event id is empty".into());
        assert_eq!(err.to_string(), "Invalid input: calendar event id is empty");

        let err = Error::TraversalFailed("cycle guard tripped".into());
        assert_eq!(err.to_string(), "Graph traversal failed: cycle guard tripped");
    }
}
