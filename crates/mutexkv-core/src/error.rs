//! Error types for the MutexKV registry
//!
//! Plain `lock`/`unlock` cannot fail. Everything here comes from the
//! resolved-name variant, configuration loading, or embedding code.

use thiserror::Error;

/// Result type alias for MutexKV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the MutexKV registry
#[derive(Error, Debug)]
pub enum Error {
    /// Name resolution returned no candidate
    #[error("not found: {0}")]
    NotFound(String),

    /// Name resolution returned more than one candidate
    #[error("ambiguous name '{name}': {} matches ({})", .matches.len(), .matches.join(", "))]
    Ambiguous {
        /// The human-assigned name that was resolved
        name: String,
        /// Every canonical key the resolver returned
        matches: Vec<String>,
    },

    /// The resolver lookup itself failed
    #[error("resolver error ({resolver}): {message}")]
    Resolver {
        /// Resolver name
        resolver: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (config file loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an "ambiguous" error
    pub fn ambiguous(name: impl Into<String>, matches: Vec<String>) -> Self {
        Self::Ambiguous {
            name: name.into(),
            matches,
        }
    }

    /// Create a resolver error
    pub fn resolver(resolver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolver {
            resolver: resolver.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came out of name resolution (not found or ambiguous)
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Ambiguous { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
