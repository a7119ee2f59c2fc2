//! Memory Error Types
//!
//! Absence (unknown id, expired node, empty result) is never an error in this
//! crate. Errors only surface while building or loading configuration.

use thiserror::Error;

/// Memory result type alias
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Configuration rejected by validation
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Configuration file could not be parsed
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    /// Create a configuration error for a single field
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config(crate::config::ConfigValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        })
    }

    /// Check if this error came from configuration (validation or parsing)
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ConfigParse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MemoryError::invalid_config("capacity.short_term", "must be greater than 0");
        assert!(err.is_config());
        assert!(err.to_string().contains("capacity.short_term"));
        assert!(err.to_string().contains("greater than 0"));

        let err = MemoryError::from(std::io::Error::other("disk gone"));
        assert!(!err.is_config());
        assert!(err.to_string().contains("disk gone"));
    }
}
