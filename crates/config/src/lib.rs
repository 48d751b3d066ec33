//! Configuration management for kTBS servers
//!
//! This crate parses `ktbs.conf` files, layers them with environment
//! variables and command-line overrides, and validates the result.

pub mod document;
pub mod loader;
pub mod provider;
pub mod schema;
pub mod template;
pub mod validation;

pub use document::IniDocument;
pub use loader::ConfigLoader;
pub use provider::IniProvider;
pub use schema::*;
pub use template::{uncommented_template, write_template, TEMPLATE};
pub use validation::*;
