//! The commented `ktbs.conf` template shipped with the library

use crate::document::{commented_options, IniDocument};
use std::path::Path;
use types::ConfigError;

/// Section headers of a complete configuration file, in template order
pub const SECTIONS: [&str; 7] = [
    "server",
    "ns_prefix",
    "plugins",
    "sparql",
    "cors",
    "rdf_database",
    "logging",
];

/// The commented configuration template
pub const TEMPLATE: &str = include_str!("../templates/ktbs.conf");

/// The template with every commented option switched on
pub fn uncommented_template() -> String {
    let options = commented_options(TEMPLATE);
    let mut out = String::with_capacity(TEMPLATE.len());
    for (idx, line) in TEMPLATE.lines().enumerate() {
        if options.iter().any(|o| o.line == idx + 1) {
            let body = line.trim_start().trim_start_matches('#').trim_start();
            out.push_str(body);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Parse the template as-is (only empty sections remain)
pub fn template_document() -> Result<IniDocument, ConfigError> {
    IniDocument::parse(TEMPLATE)
}

/// Write the template to `path`
pub fn write_template<P: AsRef<Path>>(path: P, uncommented: bool) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let content = if uncommented {
        uncommented_template()
    } else {
        TEMPLATE.to_string()
    };
    std::fs::write(path, content).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
