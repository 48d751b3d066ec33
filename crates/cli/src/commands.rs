//! Subcommand implementations

use crate::cli::{OutputFormat, Sources};
use anyhow::{Context, Result};
use config::{
    uncommented_template, write_template, Config, ConfigLoader, ConfigValidator, IniDocument,
    IniProvider, ValidationReport, TEMPLATE,
};
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the default configuration file
pub const CONFIG_ENV: &str = "KTBS_CONFIG";

/// File read when neither `-c` nor `KTBS_CONFIG` is given, if it exists
pub const DEFAULT_CONFIG_FILE: &str = "ktbs.conf";

/// Files to read, in order
pub fn resolve_paths(explicit: &[PathBuf]) -> Vec<PathBuf> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    if let Ok(path) = env::var(CONFIG_ENV) {
        return vec![PathBuf::from(path)];
    }
    let default = Path::new(DEFAULT_CONFIG_FILE);
    if default.exists() {
        vec![default.to_path_buf()]
    } else {
        Vec::new()
    }
}

/// Load the effective configuration for `sources`
pub fn load(sources: &Sources) -> Result<Config> {
    let paths = resolve_paths(&sources.config);
    if paths.is_empty() {
        info!("No configuration file, using built-in defaults");
    }
    ConfigLoader::load_with_overrides(&paths, &sources.overrides.to_document())
}

/// Validate every file, then the merged configuration
pub fn check(sources: &Sources) -> ValidationReport {
    let paths = resolve_paths(&sources.config);
    let mut report = ValidationReport::new();

    for path in &paths {
        match IniProvider::file(path).document() {
            Ok(Some(doc)) => report.merge(ConfigValidator::validate_document(&doc)),
            Ok(None) => {}
            Err(e) => {
                let field = match e.line() {
                    Some(line) => format!("{}:{}", path.display(), line),
                    None => path.display().to_string(),
                };
                report.add_error(&field, &e.to_string());
            }
        }
    }
    if !report.is_valid() {
        return report;
    }

    match ConfigLoader::load_unvalidated(&paths, &sources.overrides.to_document()) {
        Ok(config) => {
            let typed = ConfigValidator::validate(&config);
            report.errors.extend(typed.errors);
            // a file-level warning already covers the same option
            for issue in typed.warnings {
                if !report.warnings.iter().any(|w| w.field == issue.field) {
                    report.warnings.push(issue);
                }
            }
        }
        Err(e) => report.add_error("configuration", &format!("{:#}", e)),
    }

    report
}

/// Human-readable report, one issue per line and a summary
pub fn render_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    for issue in &report.errors {
        out.push_str(&format!("error: {}\n", issue));
    }
    for issue in &report.warnings {
        out.push_str(&format!("warning: {}\n", issue));
    }
    out.push_str(&report.summary());
    out.push('\n');
    out
}

/// Render a configuration in the requested format
pub fn render_config(config: &Config, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Ini => Ok(config.to_document()?.to_ini_string()),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration as JSON")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(config).context("Failed to serialize configuration as YAML")
        }
    }
}

/// Root URI line for `root-uri`
pub fn root_uri(config: &Config) -> Result<String> {
    Ok(format!("{}\n", config.root_uri()?))
}

/// Print or write the template
pub fn template(output: Option<&Path>, uncommented: bool) -> Result<Option<String>> {
    match output {
        Some(path) => {
            write_template(path, uncommented)
                .with_context(|| format!("Failed to write template to {}", path.display()))?;
            info!("Template written to {}", path.display());
            Ok(None)
        }
        None if uncommented => Ok(Some(uncommented_template())),
        None => Ok(Some(TEMPLATE.to_string())),
    }
}

/// Parse a file and print it back without comments
pub fn normalize(file: &Path) -> Result<String> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let doc = IniDocument::parse(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    Ok(doc.to_ini_string())
}
