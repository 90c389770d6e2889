//! Error types for the query engine.
//!
//! Provider failures never cross a fan-out task boundary; they are logged
//! and turned into empty contributions. The variants here surface to
//! callers of registry construction, activation and history persistence.

use thiserror::Error;

/// Errors produced by the engine and its collaborators.
#[derive(Debug, Error)]
pub enum SiftError {
    /// A provider's setup or entries operation failed.
    #[error("provider '{provider}' failed: {reason}")]
    ProviderFailure { provider: String, reason: String },

    /// A required external setting is missing (no terminal, no exec target, ...).
    #[error("configuration gap: {0}")]
    ConfigurationGap(String),

    /// A blacklist pattern did not compile.
    #[error("invalid blacklist pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// No registered provider carries the requested name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// History could not be loaded or saved.
    #[error("history error: {0}")]
    History(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SiftError {
    /// Shorthand for a provider failure.
    pub fn provider(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        SiftError::ProviderFailure {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, SiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_failure_message() {
        let err = SiftError::provider("runner", "exit status 1");
        assert_eq!(err.to_string(), "provider 'runner' failed: exit status 1");
    }

    #[test]
    fn test_invalid_pattern_keeps_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = SiftError::InvalidPattern {
            pattern: "(".to_string(),
            source,
        };
        assert!(err.to_string().contains("'('"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
