//! Shared types for the kTBS configuration toolkit
//!
//! This crate holds the error types and the lenient value parsing used by
//! the configuration schema and the command-line tool.

pub mod error;
pub mod value;

// Re-export commonly used types
pub use error::ConfigError;
pub use value::{Flag, LogFormat, LogLevel};
