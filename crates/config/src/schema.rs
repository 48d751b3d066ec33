//! Configuration schema definitions

use crate::document::IniDocument;
use crate::template::SECTIONS;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use types::value::{self, Flag, LogFormat, LogLevel};
use types::ConfigError;
use url::Url;

/// Namespace of the kTBS vocabulary
pub const KTBS_NS: &str = "http://liris.cnrs.fr/silex/2009/ktbs#";

/// Namespace of the SKOS vocabulary
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";

/// Key standing for the empty prefix in `[ns_prefix]`
pub const EMPTY_PREFIX_KEY: &str = "_";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Namespace prefixes, the empty prefix stored under `""`
    #[serde(
        default = "default_ns_prefix",
        deserialize_with = "namespace_prefixes",
        serialize_with = "serialize_namespace_prefixes"
    )]
    pub ns_prefix: BTreeMap<String, String>,
    /// Plugin toggles
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// SPARQL endpoint restrictions
    #[serde(default)]
    pub sparql: SparqlConfig,
    /// Cross-origin resource sharing
    #[serde(default)]
    pub cors: CorsConfig,
    /// RDF store backing the server
    #[serde(default)]
    pub rdf_database: RdfDatabaseConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// URI scheme (http or https)
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Host name to bind and advertise
    #[serde(default = "default_host_name")]
    pub host_name: String,
    /// Listening port
    #[serde(default = "default_port", deserialize_with = "value::parsed")]
    pub port: u16,
    /// Path prefix of the root URI
    #[serde(default)]
    pub base_path: String,
    /// Root URI overriding the derived one
    #[serde(default, deserialize_with = "value::optional_text")]
    pub fixed_root_uri: Option<String>,
    /// Listen on IPv4 only
    #[serde(default, deserialize_with = "value::flag")]
    pub force_ipv4: bool,
    /// Maximum payload size in bytes
    #[serde(
        default,
        deserialize_with = "value::limit",
        serialize_with = "value::serialize_limit"
    )]
    pub max_bytes: Option<u64>,
    /// Cache-Control header value
    #[serde(default, deserialize_with = "value::optional_text")]
    pub cache_control: Option<String>,
    /// Deprecated, superseded by `cache_control`
    #[serde(default, deserialize_with = "value::flag")]
    pub no_cache: bool,
    /// Serve a crossdomain.xml policy
    #[serde(default, deserialize_with = "value::flag")]
    pub flash_allow: bool,
    /// Maximum number of triples in a payload
    #[serde(
        default,
        deserialize_with = "value::limit",
        serialize_with = "value::serialize_limit"
    )]
    pub max_triples: Option<u64>,
    /// Close the connection after each request
    #[serde(default, deserialize_with = "value::flag")]
    pub reset_connection: bool,
    /// Include tracebacks in error responses
    #[serde(default, deserialize_with = "value::flag")]
    pub send_traceback: bool,
}

/// Plugin toggles
///
/// Keys keep the underscores plugins are named with. Any other key enables
/// or disables an extra plugin of that name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default, deserialize_with = "value::flag")]
    pub post_via_get: bool,
    #[serde(default, deserialize_with = "value::flag")]
    pub sparql_endpoints: bool,
    #[serde(default, deserialize_with = "value::flag")]
    pub cors: bool,
    #[serde(default, deserialize_with = "value::flag")]
    pub stats_per_type: bool,
    /// Plugins not known to this toolkit
    #[serde(flatten)]
    pub extra: BTreeMap<String, Flag>,
}

/// SPARQL endpoint restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SparqlConfig {
    /// Allow queries over the whole store
    #[serde(default, deserialize_with = "value::flag")]
    pub allow_scope_store: bool,
}

/// Cross-origin resource sharing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CorsConfig {
    /// Allowed origins, `*` for any
    #[serde(default, deserialize_with = "value::words")]
    pub allow_origin: Vec<String>,
}

/// RDF store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RdfDatabaseConfig {
    /// Path or URL of the store, in-memory when absent
    #[serde(default, deserialize_with = "value::optional_text")]
    pub repository: Option<String>,
    /// Wipe the store on startup
    #[serde(default, deserialize_with = "value::flag")]
    pub force_init: bool,
}

/// Where the RDF store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryLocation {
    Memory,
    Remote(Url),
    Path(PathBuf),
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Modules whose events are logged
    #[serde(default = "default_loggers", deserialize_with = "value::words")]
    pub loggers: Vec<String>,
    /// Console level
    #[serde(default)]
    pub console_level: LogLevel,
    /// Console output style
    #[serde(default)]
    pub console_format: LogFormat,
    /// Log file path (optional)
    #[serde(default, deserialize_with = "value::optional_text")]
    pub filename: Option<String>,
    /// Log file level
    #[serde(default)]
    pub file_level: LogLevel,
    /// kTBS trace receiving log events (optional)
    #[serde(default, deserialize_with = "value::optional_text")]
    pub ktbs_logurl: Option<String>,
    /// Level of events sent to the kTBS trace
    #[serde(default)]
    pub ktbs_level: LogLevel,
    /// JSON file overriding this section (optional)
    #[serde(default, deserialize_with = "value::optional_text")]
    pub json_configuration_filename: Option<String>,
}

/// Kind of value an option holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Text,
    Uri,
    Boolean,
    Integer,
    Limit,
    Words,
    Level,
    Format,
}

/// A recognized option
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub section: &'static str,
    pub key: &'static str,
    pub kind: OptionKind,
    pub default: &'static str,
    pub description: &'static str,
    pub deprecated: bool,
}

macro_rules! option {
    ($section:literal, $key:literal, $kind:ident, $default:literal, $description:literal) => {
        OptionSpec {
            section: $section,
            key: $key,
            kind: OptionKind::$kind,
            default: $default,
            description: $description,
            deprecated: false,
        }
    };
}

/// Every option with a fixed name, in template order
pub static KNOWN_OPTIONS: &[OptionSpec] = &[
    option!("server", "scheme", Text, "http", "URI scheme"),
    option!("server", "host-name", Text, "localhost", "Host name"),
    option!("server", "port", Integer, "8001", "Listening port"),
    option!("server", "base-path", Text, "", "Path prefix of the root URI"),
    option!("server", "fixed-root-uri", Uri, "", "Root URI overriding the derived one"),
    option!("server", "force-ipv4", Boolean, "false", "Listen on IPv4 only"),
    option!("server", "max-bytes", Limit, "-1", "Maximum payload size in bytes"),
    option!("server", "cache-control", Text, "", "Cache-Control header value"),
    OptionSpec {
        section: "server",
        key: "no-cache",
        kind: OptionKind::Boolean,
        default: "false",
        description: "Send Cache-Control: no-cache (use cache-control instead)",
        deprecated: true,
    },
    option!("server", "flash-allow", Boolean, "false", "Serve a crossdomain.xml policy"),
    option!("server", "max-triples", Limit, "-1", "Maximum number of triples in a payload"),
    option!(
        "server",
        "reset-connection",
        Boolean,
        "false",
        "Close the connection after each request"
    ),
    option!("server", "send-traceback", Boolean, "false", "Include tracebacks in error responses"),
    option!("plugins", "post_via_get", Boolean, "false", "POST tunnelled through GET"),
    option!("plugins", "sparql_endpoints", Boolean, "false", "SPARQL endpoint on every resource"),
    option!("plugins", "cors", Boolean, "false", "Send CORS headers"),
    option!("plugins", "stats_per_type", Boolean, "false", "Statistics per obsel type"),
    option!("sparql", "allow-scope-store", Boolean, "false", "Allow queries over the whole store"),
    option!("cors", "allow-origin", Words, "", "Allowed origins"),
    option!("rdf_database", "repository", Text, "", "Path or URL of the store"),
    option!("rdf_database", "force-init", Boolean, "false", "Wipe the store on startup"),
    option!("logging", "loggers", Words, "ktbs rdfrest", "Modules whose events are logged"),
    option!("logging", "console-level", Level, "INFO", "Console level"),
    option!("logging", "console-format", Format, "full", "Console output style"),
    option!("logging", "filename", Text, "", "Log file path"),
    option!("logging", "file-level", Level, "INFO", "Log file level"),
    option!("logging", "ktbs-logurl", Uri, "", "kTBS trace receiving log events"),
    option!("logging", "ktbs-level", Level, "INFO", "Level of events sent to the kTBS trace"),
    option!(
        "logging",
        "json-configuration-filename",
        Text,
        "",
        "JSON file overriding the logging section"
    ),
];

/// Look up a fixed-name option
pub fn option_spec(section: &str, key: &str) -> Option<&'static OptionSpec> {
    KNOWN_OPTIONS
        .iter()
        .find(|o| o.section == section && o.key == key)
}

/// Whether `section` accepts `key`
///
/// `[ns_prefix]` accepts any prefix.
pub fn is_known_option(section: &str, key: &str) -> bool {
    section == "ns_prefix" || option_spec(section, key).is_some()
}

// Default value functions
fn default_scheme() -> String {
    "http".to_string()
}

fn default_host_name() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_loggers() -> Vec<String> {
    vec!["ktbs".to_string(), "rdfrest".to_string()]
}

fn default_ns_prefix() -> BTreeMap<String, String> {
    BTreeMap::from([
        (String::new(), KTBS_NS.to_string()),
        ("skos".to_string(), SKOS_NS.to_string()),
    ])
}

/// Declared prefixes on top of the default ones, `_` read as the empty prefix
fn namespace_prefixes<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let declared = BTreeMap::<String, String>::deserialize(deserializer)?;
    let mut prefixes = default_ns_prefix();
    for (prefix, uri) in declared {
        let prefix = if prefix == EMPTY_PREFIX_KEY {
            String::new()
        } else {
            prefix
        };
        prefixes.insert(prefix, uri.trim().to_string());
    }
    Ok(prefixes)
}

fn serialize_namespace_prefixes<S>(
    prefixes: &BTreeMap<String, String>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(prefixes.iter().map(|(prefix, uri)| {
        let key = if prefix.is_empty() {
            EMPTY_PREFIX_KEY
        } else {
            prefix.as_str()
        };
        (key, uri)
    }))
}

impl Config {
    /// Render the configuration as an INI document
    ///
    /// Sections come in template order, known options in table order, then
    /// any other key. Unset optional values are left out.
    pub fn to_document(&self) -> Result<IniDocument, ConfigError> {
        let value = serde_json::to_value(self).map_err(|e| {
            ConfigError::ParseError(format!("Failed to serialize configuration: {}", e))
        })?;
        let mut doc = IniDocument::new();

        for section in SECTIONS {
            doc.add_section(section);
            let Some(Value::Object(entries)) = value.get(section) else {
                continue;
            };
            let mut keys: Vec<&str> = KNOWN_OPTIONS
                .iter()
                .filter(|o| o.section == section)
                .map(|o| o.key)
                .collect();
            keys.extend(
                entries
                    .keys()
                    .map(String::as_str)
                    .filter(|k| option_spec(section, k).is_none()),
            );
            for key in keys {
                if let Some(text) = entries.get(key).and_then(ini_value) {
                    doc.set(section, key, text);
                }
            }
        }

        Ok(doc)
    }

    /// The root URI of the server
    pub fn root_uri(&self) -> Result<Url, ConfigError> {
        self.server.root_uri()
    }

    /// Namespace bound to the empty prefix
    pub fn default_namespace(&self) -> Option<&str> {
        self.ns_prefix.get("").map(String::as_str)
    }
}

/// Text form of a serialized value, `None` for nulls and nested objects
pub fn ini_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(ini_value)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Object(_) => None,
    }
}

impl ServerConfig {
    /// Root URI, either fixed or built from scheme, host, port and base path
    pub fn root_uri(&self) -> Result<Url, ConfigError> {
        let (field, text) = match &self.fixed_root_uri {
            Some(uri) => ("server.fixed-root-uri", uri.clone()),
            None => (
                "server",
                format!(
                    "{}://{}:{}{}/",
                    self.scheme,
                    self.host_name,
                    self.port,
                    self.base_path.trim_end_matches('/')
                ),
            ),
        };
        Url::parse(&text).map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            value: format!("{} ({})", text, e),
        })
    }

    /// Cache-Control value to send, honouring the deprecated `no-cache`
    pub fn effective_cache_control(&self) -> Option<&str> {
        match &self.cache_control {
            Some(value) => Some(value.as_str()),
            None if self.no_cache => Some("no-cache"),
            None => None,
        }
    }
}

impl PluginsConfig {
    /// Names of the enabled plugins, sorted
    pub fn enabled(&self) -> Vec<String> {
        let known = [
            ("cors", self.cors),
            ("post_via_get", self.post_via_get),
            ("sparql_endpoints", self.sparql_endpoints),
            ("stats_per_type", self.stats_per_type),
        ];
        let mut names: Vec<String> = known
            .into_iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| name.to_string())
            .chain(
                self.extra
                    .iter()
                    .filter(|(_, flag)| flag.0)
                    .map(|(name, _)| name.clone()),
            )
            .collect();
        names.sort();
        names
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled().iter().any(|n| n == name)
    }
}

impl RdfDatabaseConfig {
    /// Classify the repository setting
    pub fn location(&self) -> Result<RepositoryLocation, ConfigError> {
        match self.repository.as_deref() {
            None => Ok(RepositoryLocation::Memory),
            Some(repo) if repo.starts_with("http://") || repo.starts_with("https://") => {
                Url::parse(repo)
                    .map(RepositoryLocation::Remote)
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "rdf_database.repository".to_string(),
                        value: format!("{} ({})", repo, e),
                    })
            }
            Some(repo) => Ok(RepositoryLocation::Path(PathBuf::from(repo))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ns_prefix: default_ns_prefix(),
            plugins: PluginsConfig::default(),
            sparql: SparqlConfig::default(),
            cors: CorsConfig::default(),
            rdf_database: RdfDatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host_name: default_host_name(),
            port: default_port(),
            base_path: String::new(),
            fixed_root_uri: None,
            force_ipv4: false,
            max_bytes: None,
            cache_control: None,
            no_cache: false,
            flash_allow: false,
            max_triples: None,
            reset_connection: false,
            send_traceback: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            loggers: default_loggers(),
            console_level: LogLevel::Info,
            console_format: LogFormat::Full,
            filename: None,
            file_level: LogLevel::Info,
            ktbs_logurl: None,
            ktbs_level: LogLevel::Info,
            json_configuration_filename: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.server.host_name, "localhost");
        assert_eq!(config.default_namespace(), Some(KTBS_NS));
        assert_eq!(config.logging.loggers, vec!["ktbs", "rdfrest"]);
        assert!(config.plugins.enabled().is_empty());
    }

    #[test]
    fn test_derived_root_uri() {
        let mut server = ServerConfig::default();
        assert_eq!(server.root_uri().unwrap().as_str(), "http://localhost:8001/");

        server.scheme = "https".to_string();
        server.host_name = "traces.example.org".to_string();
        server.port = 8443;
        server.base_path = "/ktbs/".to_string();
        assert_eq!(
            server.root_uri().unwrap().as_str(),
            "https://traces.example.org:8443/ktbs/"
        );

        server.fixed_root_uri = Some("http://proxy.example.org/k/".to_string());
        assert_eq!(server.root_uri().unwrap().as_str(), "http://proxy.example.org/k/");

        server.fixed_root_uri = Some("not a uri".to_string());
        assert!(matches!(
            server.root_uri(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_effective_cache_control() {
        let mut server = ServerConfig::default();
        assert_eq!(server.effective_cache_control(), None);

        server.no_cache = true;
        assert_eq!(server.effective_cache_control(), Some("no-cache"));

        server.cache_control = Some("max-age=60".to_string());
        assert_eq!(server.effective_cache_control(), Some("max-age=60"));
    }

    #[test]
    fn test_enabled_plugins() {
        let mut plugins = PluginsConfig {
            sparql_endpoints: true,
            cors: true,
            ..Default::default()
        };
        plugins.extra.insert("visualization".to_string(), Flag(true));
        plugins.extra.insert("legacy".to_string(), Flag(false));
        assert_eq!(
            plugins.enabled(),
            vec!["cors", "sparql_endpoints", "visualization"]
        );
        assert!(plugins.is_enabled("visualization"));
        assert!(!plugins.is_enabled("legacy"));
    }

    #[test]
    fn test_repository_location() {
        let mut db = RdfDatabaseConfig::default();
        assert_eq!(db.location().unwrap(), RepositoryLocation::Memory);

        db.repository = Some("/var/lib/ktbs/store".to_string());
        assert_eq!(
            db.location().unwrap(),
            RepositoryLocation::Path(PathBuf::from("/var/lib/ktbs/store"))
        );

        db.repository = Some("http://store.example.org/sparql".to_string());
        assert!(matches!(db.location().unwrap(), RepositoryLocation::Remote(_)));
    }

    #[test]
    fn test_known_options() {
        assert!(is_known_option("server", "host-name"));
        assert!(is_known_option("ns_prefix", "foaf"));
        assert!(!is_known_option("server", "hostname"));
        assert!(option_spec("server", "no-cache").unwrap().deprecated);
        assert!(!option_spec("server", "cache-control").unwrap().deprecated);
    }

    #[test]
    fn test_to_document() {
        let mut config = Config::default();
        config.cors.allow_origin = vec![
            "http://a.example".to_string(),
            "http://b.example".to_string(),
        ];
        config.plugins.extra.insert("visualization".to_string(), Flag(true));
        config.server.max_bytes = Some(1024);

        let doc = config.to_document().unwrap();
        let names: Vec<_> = doc.sections().map(|s| s.name()).collect();
        assert_eq!(names, SECTIONS.to_vec());
        assert_eq!(doc.get("server", "port"), Some("8001"));
        assert_eq!(doc.get("server", "max-bytes"), Some("1024"));
        assert_eq!(doc.get("server", "max-triples"), Some("-1"));
        assert_eq!(doc.get("server", "fixed-root-uri"), None);
        assert_eq!(doc.get("ns_prefix", "_"), Some(KTBS_NS));
        assert_eq!(doc.get("cors", "allow-origin"), Some("http://a.example http://b.example"));
        assert_eq!(doc.get("plugins", "visualization"), Some("true"));
        assert_eq!(doc.get("logging", "console-level"), Some("INFO"));
        assert_eq!(doc.get("logging", "loggers"), Some("ktbs rdfrest"));
    }
}
