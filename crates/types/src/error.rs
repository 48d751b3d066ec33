//! Error types for the kTBS configuration toolkit

use thiserror::Error;

/// Configuration specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// File could not be read or written
    #[error("Cannot access configuration file {path}: {message}")]
    Io { path: String, message: String },

    /// Line that is neither a comment, a section header nor an option
    #[error("Syntax error at line {line}: {content:?}")]
    Syntax { line: usize, content: String },

    /// Section header seen twice
    #[error("Duplicate section [{section}] at line {line}")]
    DuplicateSection { line: usize, section: String },

    /// Option seen twice in the same section
    #[error("Duplicate option {key:?} in section [{section}] at line {line}")]
    DuplicateOption {
        line: usize,
        section: String,
        key: String,
    },

    /// Option before the first section header
    #[error("Option {key:?} at line {line} is not inside a section")]
    OptionOutsideSection { line: usize, key: String },

    /// Parse error
    #[error("Configuration parse error: {0}")]
    ParseError(String),

    /// Validation error
    #[error("Configuration validation error: {field}: {message}")]
    ValidationError { field: String, message: String },

    /// Invalid value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl ConfigError {
    /// Line number the error points at, for document errors
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Syntax { line, .. }
            | ConfigError::DuplicateSection { line, .. }
            | ConfigError::DuplicateOption { line, .. }
            | ConfigError::OptionOutsideSection { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_errors_carry_line() {
        let err = ConfigError::DuplicateSection {
            line: 12,
            section: "server".to_string(),
        };
        assert_eq!(err.line(), Some(12));
        assert_eq!(err.to_string(), "Duplicate section [server] at line 12");

        let err = ConfigError::InvalidValue {
            field: "server.port".to_string(),
            value: "http".to_string(),
        };
        assert_eq!(err.line(), None);
    }
}
