//! Configuration validation utilities

use crate::document::IniDocument;
use crate::provider::IniProvider;
use crate::schema::{is_known_option, option_spec, Config, OptionKind, RepositoryLocation, SKOS_NS};
use crate::template::SECTIONS;
use figment::Figment;
use types::value::{parse_bool, parse_limit};
use types::LogLevel;
use url::Url;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate complete configuration
    pub fn validate(config: &Config) -> ValidationReport {
        let mut report = ValidationReport::new();

        Self::validate_server(config, &mut report);
        Self::validate_namespaces(config, &mut report);
        Self::validate_cors(config, &mut report);
        Self::validate_rdf_database(config, &mut report);
        Self::validate_logging(config, &mut report);

        // Cross-section checks
        Self::validate_cross_dependencies(config, &mut report);

        report
    }

    /// Check a parsed file for unknown names and values that will not convert
    pub fn validate_document(doc: &IniDocument) -> ValidationReport {
        let mut report = ValidationReport::new();

        for section in doc.sections() {
            let name = section.name();
            if !SECTIONS.contains(&name) {
                report.add_warning(name, &format!("Unknown section [{}]", name));
                continue;
            }
            for (key, value) in section.entries() {
                let field = format!("{}.{}", name, key);
                // any other key in [plugins] names an extra plugin
                if name == "plugins" && option_spec(name, key).is_none() {
                    if parse_bool(value).is_none() {
                        report.add_error(&field, &format!("Invalid boolean: {:?}", value));
                    }
                    continue;
                }
                if !is_known_option(name, &key.to_ascii_lowercase()) {
                    report.add_warning(&field, &format!("Unknown option {:?}", key));
                    continue;
                }
                Self::validate_raw_value(&field, name, key, value, &mut report);
            }
        }

        if report.is_valid() {
            // whatever the table misses, the typed schema still catches
            let figment = Figment::from(IniProvider::from_document(doc.clone(), "INI document"));
            if let Err(e) = figment.extract::<Config>() {
                report.add_error("document", &e.to_string());
            }
        }

        report
    }

    fn validate_raw_value(
        field: &str,
        section: &str,
        key: &str,
        value: &str,
        report: &mut ValidationReport,
    ) {
        let Some(spec) = option_spec(section, &key.to_ascii_lowercase()) else {
            return;
        };
        if spec.deprecated {
            report.add_warning(field, &format!("{} is deprecated", key));
        }
        match spec.kind {
            OptionKind::Boolean if parse_bool(value).is_none() => {
                report.add_error(field, &format!("Invalid boolean: {:?}", value));
            }
            OptionKind::Integer if value.trim().parse::<u64>().is_err() => {
                report.add_error(field, &format!("Invalid integer: {:?}", value));
            }
            OptionKind::Limit => {
                if let Err(e) = parse_limit(value) {
                    report.add_error(field, &e);
                }
            }
            OptionKind::Level if value.parse::<LogLevel>().is_err() => {
                report.add_error(field, &format!("Invalid log level: {:?}", value));
            }
            OptionKind::Format if value.parse::<types::LogFormat>().is_err() => {
                report.add_error(field, &format!("Invalid log format: {:?}", value));
            }
            _ => {}
        }
    }

    fn validate_server(config: &Config, report: &mut ValidationReport) {
        let server = &config.server;

        let valid_schemes = ["http", "https"];
        if !valid_schemes.contains(&server.scheme.as_str()) {
            report.add_error(
                "server.scheme",
                &format!("Invalid scheme: {}. Valid schemes: {:?}", server.scheme, valid_schemes),
            );
        }

        if server.host_name.trim().is_empty() {
            report.add_error("server.host-name", "Host name cannot be empty");
        }

        if server.port == 0 {
            report.add_error("server.port", "Server port cannot be 0");
        } else if server.port < 1024 {
            report.add_warning(
                "server.port",
                "Server port is below 1024, may require elevated privileges",
            );
        }

        if !server.base_path.is_empty() {
            if !server.base_path.starts_with('/') {
                report.add_error("server.base-path", "Base path must start with /");
            }
            if server.base_path.ends_with('/') {
                report.add_error("server.base-path", "Base path must not end with /");
            }
        }

        match &server.fixed_root_uri {
            Some(uri) => {
                if let Err(message) = absolute_uri(uri) {
                    report.add_error("server.fixed-root-uri", &message);
                } else if !uri.ends_with('/') {
                    report.add_warning("server.fixed-root-uri", "Root URI should end with /");
                }
            }
            None => {
                if let Err(e) = server.root_uri() {
                    report.add_error("server", &e.to_string());
                }
            }
        }

        if server.max_bytes == Some(0) {
            report.add_warning(
                "server.max-bytes",
                "Max bytes is 0, every request with a payload will be rejected",
            );
        }

        if server.max_triples == Some(0) {
            report.add_warning(
                "server.max-triples",
                "Max triples is 0, every non-empty graph will be rejected",
            );
        }

        if server.no_cache {
            if server.cache_control.is_some() {
                report.add_warning(
                    "server.no-cache",
                    "no-cache is ignored because cache-control is set",
                );
            } else {
                report.add_warning(
                    "server.no-cache",
                    "no-cache is deprecated, use cache-control = no-cache",
                );
            }
        }

        if server.send_traceback {
            report.add_warning(
                "server.send-traceback",
                "Tracebacks in responses may leak internal details",
            );
        }
    }

    fn validate_namespaces(config: &Config, report: &mut ValidationReport) {
        for (prefix, uri) in &config.ns_prefix {
            let field = if prefix.is_empty() {
                "ns_prefix._".to_string()
            } else {
                format!("ns_prefix.{}", prefix)
            };
            if let Err(message) = absolute_uri(uri) {
                report.add_error(&field, &message);
            } else if !uri.ends_with(['#', '/']) {
                report.add_warning(&field, "Namespace URI usually ends with # or /");
            }
            if prefix.contains(':') || prefix.contains(char::is_whitespace) {
                report.add_error(&field, &format!("Invalid prefix name: {:?}", prefix));
            }
        }

        if config.ns_prefix.get("skos").map(String::as_str) != Some(SKOS_NS) {
            report.add_warning(
                "ns_prefix.skos",
                "The skos prefix does not point to the SKOS namespace",
            );
        }
    }

    fn validate_cors(config: &Config, report: &mut ValidationReport) {
        for origin in &config.cors.allow_origin {
            if origin != "*" && !is_origin(origin) {
                report.add_error(
                    "cors.allow-origin",
                    &format!("Invalid origin {:?}, expected scheme://host[:port] or *", origin),
                );
            }
        }
    }

    fn validate_rdf_database(config: &Config, report: &mut ValidationReport) {
        match config.rdf_database.location() {
            Ok(RepositoryLocation::Memory) => {
                if config.rdf_database.force_init {
                    report.add_warning(
                        "rdf_database.force-init",
                        "force-init has no effect on an in-memory repository",
                    );
                }
            }
            Ok(RepositoryLocation::Remote(url)) => {
                if url.host_str().is_none() {
                    report.add_error(
                        "rdf_database.repository",
                        "Remote repository URL has no host",
                    );
                }
            }
            Ok(RepositoryLocation::Path(path)) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    if !parent.exists() {
                        report.add_warning(
                            "rdf_database.repository",
                            "Repository directory does not exist",
                        );
                    }
                }
            }
            Err(e) => report.add_error("rdf_database.repository", &e.to_string()),
        }
    }

    fn validate_logging(config: &Config, report: &mut ValidationReport) {
        let logging = &config.logging;

        if logging.loggers.is_empty() {
            report.add_warning("logging.loggers", "No loggers configured, nothing will be logged");
        }

        if logging.console_level == LogLevel::Debug {
            report.add_warning(
                "logging.console-level",
                "Debug logging may impact performance in production",
            );
        }

        if let Some(ref filename) = logging.filename {
            if logging.file_level == LogLevel::Debug {
                report.add_warning(
                    "logging.file-level",
                    "Debug logging to file may grow it quickly",
                );
            }
            if let Some(parent) = std::path::Path::new(filename)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
            {
                if !parent.exists() {
                    report.add_warning("logging.filename", "Log file directory does not exist");
                }
            }
        }

        if let Some(ref url) = logging.ktbs_logurl {
            if let Err(message) = absolute_uri(url) {
                report.add_error("logging.ktbs-logurl", &message);
            }
        }

        if let Some(ref json) = logging.json_configuration_filename {
            if !std::path::Path::new(json).exists() {
                report.add_warning(
                    "logging.json-configuration-filename",
                    "JSON logging configuration file does not exist",
                );
            }
        }
    }

    fn validate_cross_dependencies(config: &Config, report: &mut ValidationReport) {
        if config.sparql.allow_scope_store && !config.plugins.sparql_endpoints {
            report.add_warning(
                "sparql.allow-scope-store",
                "allow-scope-store has no effect without the sparql_endpoints plugin",
            );
        }

        if !config.cors.allow_origin.is_empty() && !config.plugins.cors {
            report.add_warning(
                "cors.allow-origin",
                "allow-origin has no effect without the cors plugin",
            );
        }

        if config.plugins.cors && config.cors.allow_origin.is_empty() {
            report.add_warning(
                "plugins.cors",
                "The cors plugin is enabled but no origin is allowed",
            );
        }
    }
}

fn absolute_uri(text: &str) -> Result<Url, String> {
    let url = Url::parse(text).map_err(|e| format!("Invalid URI {:?}: {}", text, e))?;
    if url.cannot_be_a_base() {
        return Err(format!("URI {:?} is not hierarchical", text));
    }
    Ok(url)
}

fn is_origin(text: &str) -> bool {
    match Url::parse(text) {
        Ok(url) => {
            url.host_str().is_some()
                && (url.path() == "/" || url.path().is_empty())
                && !text.ends_with('/')
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}

/// Validation report containing errors and warnings
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// A validation issue (error or warning)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Append the issues of another report
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn summary(&self) -> String {
        format!("Validation: {} errors, {} warnings", self.errors.len(), self.warnings.len())
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
