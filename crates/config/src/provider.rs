//! Figment provider over INI configuration files

use crate::document::{IniDocument, CASE_SENSITIVE_SECTION};
use figment::value::{Dict, Map, Tag, Value};
use figment::{Error, Metadata, Profile, Provider, Source};
use std::path::{Path, PathBuf};
use tracing::debug;
use types::ConfigError;

#[derive(Debug, Clone)]
enum Input {
    File(PathBuf),
    Text(String),
    Document(IniDocument, &'static str),
}

/// INI file or string as a figment provider
///
/// Every section becomes a nested dictionary of string values. Option names
/// are lower-cased, except prefixes in `[ns_prefix]`.
#[derive(Debug, Clone)]
pub struct IniProvider {
    input: Input,
    required: bool,
}

impl IniProvider {
    /// Provider reading `path`; a missing file is an error
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            input: Input::File(path.as_ref().to_path_buf()),
            required: true,
        }
    }

    /// Provider over INI text
    pub fn string(text: &str) -> Self {
        Self {
            input: Input::Text(text.to_string()),
            required: true,
        }
    }

    /// Provider over an already built document, named for error messages
    pub fn from_document(doc: IniDocument, name: &'static str) -> Self {
        Self {
            input: Input::Document(doc, name),
            required: true,
        }
    }

    /// Treat a missing file as empty
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Parse the underlying document; `None` for a missing optional file
    pub fn document(&self) -> Result<Option<IniDocument>, ConfigError> {
        match &self.input {
            Input::Text(text) => IniDocument::parse(text).map(Some),
            Input::Document(doc, _) => Ok(Some(doc.clone())),
            Input::File(path) => {
                if !path.exists() {
                    if self.required {
                        return Err(ConfigError::FileNotFound {
                            path: path.display().to_string(),
                        });
                    }
                    debug!("Optional configuration file {} not found", path.display());
                    return Ok(None);
                }
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                IniDocument::parse(&text).map(Some)
            }
        }
    }
}

/// Convert a document to a figment dictionary
pub fn document_to_dict(doc: &IniDocument) -> Dict {
    let mut dict = Dict::new();
    for section in doc.sections() {
        let mut entries = Dict::new();
        for (key, value) in section.entries() {
            let key = if section.name() == CASE_SENSITIVE_SECTION {
                key.to_string()
            } else {
                key.to_ascii_lowercase()
            };
            entries.insert(key, Value::String(Tag::Default, value.to_string()));
        }
        dict.insert(section.name().to_string(), Value::Dict(Tag::Default, entries));
    }
    dict
}

impl Provider for IniProvider {
    fn metadata(&self) -> Metadata {
        match &self.input {
            Input::File(path) => Metadata::from("INI file", Source::File(path.clone())),
            Input::Text(_) => Metadata::named("INI string"),
            Input::Document(_, name) => Metadata::named(*name),
        }
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let dict = match self.document().map_err(|e| Error::from(e.to_string()))? {
            Some(doc) => document_to_dict(&doc),
            None => Dict::new(),
        };
        Ok(Profile::Default.collect(dict))
    }
}
