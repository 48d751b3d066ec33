//! Configuration loader implementation

use crate::document::IniDocument;
use crate::provider::IniProvider;
use crate::schema::{ini_value, option_spec, Config};
use crate::template;
use crate::validation::{ConfigValidator, ValidationReport};
use anyhow::{Context, Result};
use figment::{providers::Env, Figment};
use std::path::Path;
use tracing::{debug, info, warn};
use types::ConfigError;

/// Prefix of environment variables overriding options
pub const ENV_PREFIX: &str = "KTBS_";

/// Configuration loader layering defaults, INI files, environment and overrides
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file and environment variables
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Config> {
        Self::load_all(&[config_path])
    }

    /// Load configuration from several files, later ones winning
    pub fn load_all<P: AsRef<Path>>(config_paths: &[P]) -> Result<Config> {
        Self::load_with_overrides(config_paths, &IniDocument::new())
    }

    /// Load configuration from files, environment variables and explicit overrides
    pub fn load_with_overrides<P: AsRef<Path>>(
        config_paths: &[P],
        overrides: &IniDocument,
    ) -> Result<Config> {
        let files = Self::open(config_paths)?;
        Self::extract(&files, overrides, true, true)
    }

    /// Same layering as [`ConfigLoader::load_with_overrides`], without validation
    pub fn load_unvalidated<P: AsRef<Path>>(
        config_paths: &[P],
        overrides: &IniDocument,
    ) -> Result<Config> {
        let files = Self::open(config_paths)?;
        Self::extract(&files, overrides, true, false)
    }

    fn open<P: AsRef<Path>>(config_paths: &[P]) -> Result<Vec<IniProvider>> {
        let mut files = Vec::with_capacity(config_paths.len());
        for path in config_paths {
            let path = path.as_ref();

            // Check if config file exists
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }

            let provider = IniProvider::file(path);
            if let Some(doc) = provider.document()? {
                Self::log_report(&ConfigValidator::validate_document(&doc));
            }
            info!("Reading configuration from {}", path.display());
            files.push(provider);
        }
        Ok(files)
    }

    /// Load configuration from string (for testing), ignoring the environment
    pub fn load_from_str(ini_content: &str) -> Result<Config> {
        Self::extract(&[IniProvider::string(ini_content)], &IniDocument::new(), false, true)
    }

    /// The layered figment: INI files, then logging JSON, environment and overrides
    pub fn figment(
        files: &[IniProvider],
        logging_json: Option<IniProvider>,
        overrides: &IniDocument,
        with_env: bool,
    ) -> Figment {
        let mut figment = Figment::new();
        for file in files {
            figment = figment.merge(file.clone());
        }
        if let Some(json) = logging_json {
            figment = figment.merge(json);
        }
        if with_env {
            figment = figment.merge(env_provider());
        }
        figment.merge(IniProvider::from_document(
            overrides.clone(),
            "command-line overrides",
        ))
    }

    fn extract(
        files: &[IniProvider],
        overrides: &IniDocument,
        with_env: bool,
        validate: bool,
    ) -> Result<Config> {
        let mut config: Config = Self::figment(files, None, overrides, with_env)
            .extract()
            .context("Failed to parse configuration")?;

        // The JSON file may only be named once the INI layers are merged
        if let Some(json) = Self::logging_json(&config)? {
            config = Self::figment(files, Some(json), overrides, with_env)
                .extract()
                .context("Failed to apply JSON logging configuration")?;
        }

        // Validate the configuration
        if validate {
            Self::validate(&config)?;
        }

        Ok(config)
    }

    /// Read the JSON logging configuration as a `[logging]` overlay
    fn logging_json(config: &Config) -> Result<Option<IniProvider>> {
        let Some(ref filename) = config.logging.json_configuration_filename else {
            return Ok(None);
        };
        let path = Path::new(filename);
        if !path.exists() {
            warn!("JSON logging configuration {} not found, ignoring it", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a JSON object", path.display()))?;

        let (doc, skipped) = logging_overlay(&entries);
        for key in &skipped {
            warn!(
                "Ignoring {:?} in {}: not a [logging] option with a scalar or list value",
                key,
                path.display()
            );
        }
        debug!(
            "Loaded {} logging options from {}",
            entries.len() - skipped.len(),
            path.display()
        );

        Ok(Some(IniProvider::from_document(doc, "JSON logging configuration")))
    }

    /// Validate configuration, failing on the first error
    pub fn validate(config: &Config) -> Result<ValidationReport> {
        let report = ConfigValidator::validate(config);
        Self::log_report(&report);

        if let Some(issue) = report.errors.first() {
            return Err(ConfigError::ValidationError {
                field: issue.field.clone(),
                message: issue.message.clone(),
            }
            .into());
        }

        Ok(report)
    }

    fn log_report(report: &ValidationReport) {
        for issue in &report.warnings {
            warn!(field = %issue.field, "{}", issue.message);
        }
    }

    /// Get default configuration
    pub fn default() -> Config {
        Config::default()
    }

    /// Create example configuration file
    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        template::write_template(path.as_ref(), false)
            .context("Failed to write example configuration file")?;
        Ok(())
    }
}

/// `[logging]` document from a JSON object, with the keys left out
///
/// Keys that are not `[logging]` options, and values that have no INI
/// spelling (nested objects), are skipped. `null` leaves the option unset.
fn logging_overlay(
    entries: &serde_json::Map<String, serde_json::Value>,
) -> (IniDocument, Vec<String>) {
    let mut doc = IniDocument::new();
    let mut skipped = Vec::new();
    for (key, value) in entries {
        if option_spec("logging", &key.to_ascii_lowercase()).is_none() {
            skipped.push(key.clone());
            continue;
        }
        match ini_value(value) {
            Some(text) => {
                doc.set("logging", key.as_str(), text);
            }
            None if value.is_null() => {}
            None => skipped.push(key.clone()),
        }
    }
    (doc, skipped)
}

/// Environment provider mapping `KTBS_SERVER__HOST_NAME` to `server.host-name`
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
        .split("__")
        .map(|key| env_key(key.as_str()).into())
}

fn env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    match key.split_once('.') {
        // plugin names and prefixes keep their underscores
        Some((section, option)) if section != "plugins" && section != "ns_prefix" => {
            format!("{}.{}", section, option.replace('_', "-"))
        }
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KTBS_NS;
    use figment::Jail;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use types::{LogFormat, LogLevel};

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_default_config() {
        let config = ConfigLoader::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.server.scheme, "http");
        assert_eq!(config.ns_prefix.get(""), Some(&KTBS_NS.to_string()));
    }

    #[test]
    fn test_load_from_string() {
        let ini_content = r#"
[server]
host-name = traces.example.org
port = 8080
base-path = /ktbs
max-bytes = 1048576
force-ipv4 = yes

[ns_prefix]
foaf = http://xmlns.com/foaf/0.1/

[plugins]
sparql_endpoints = true
cors = on

[cors]
allow-origin = http://localhost:8000 https://example.org

[rdf_database]
repository = /tmp/ktbs-store
force-init = 1

[logging]
loggers = ktbs
console-level = debug
console-format = json
"#;

        let config = ConfigLoader::load_from_str(ini_content).unwrap();
        assert_eq!(config.server.host_name, "traces.example.org");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_bytes, Some(1_048_576));
        assert_eq!(config.server.max_triples, None);
        assert!(config.server.force_ipv4);
        assert_eq!(
            config.root_uri().unwrap().as_str(),
            "http://traces.example.org:8080/ktbs/"
        );
        assert_eq!(config.ns_prefix.len(), 3);
        assert_eq!(config.plugins.enabled(), vec!["cors", "sparql_endpoints"]);
        assert_eq!(config.cors.allow_origin.len(), 2);
        assert!(config.rdf_database.force_init);
        assert_eq!(config.logging.loggers, vec!["ktbs"]);
        assert_eq!(config.logging.console_level, LogLevel::Debug);
        assert_eq!(config.logging.console_format, LogFormat::Json);
    }

    #[test]
    fn test_option_names_are_case_insensitive() {
        let config = ConfigLoader::load_from_str("[server]\nHOST-NAME = example.org\n").unwrap();
        assert_eq!(config.server.host_name, "example.org");
    }

    #[test]
    fn test_validation_errors() {
        // Port 0
        let result = ConfigLoader::load_from_str("[server]\nport = 0\n");
        assert!(result.is_err());

        // Malformed boolean
        let result = ConfigLoader::load_from_str("[server]\nforce-ipv4 = maybe\n");
        assert!(result.is_err());

        // Invalid origin
        let result = ConfigLoader::load_from_str("[cors]\nallow-origin = not-an-origin\n");
        let err = result.unwrap_err();
        let err = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(
            err,
            ConfigError::ValidationError { field, .. } if field == "cors.allow-origin"
        ));

        // Same option twice, spelled with different case
        let result = ConfigLoader::load_from_str("[server]\nport = 8080\nPORT = 9090\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_later_files_win() {
        let first = write_config("[server]\nhost-name = first.example\nport = 9001\n");
        let second = write_config("[server]\nhost-name = second.example\n");

        Jail::expect_with(|_| {
            let config = ConfigLoader::load_all(&[first.path(), second.path()]).unwrap();
            assert_eq!(config.server.host_name, "second.example");
            assert_eq!(config.server.port, 9001);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load("/nonexistent/ktbs.conf").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[server]\nhost-name = file.example\n[plugins]\ncors = false\n");

        Jail::expect_with(|jail| {
            jail.set_env("KTBS_SERVER__HOST_NAME", "env.example");
            jail.set_env("KTBS_SERVER__PORT", "9100");
            jail.set_env("KTBS_PLUGINS__STATS_PER_TYPE", "yes");
            jail.set_env("KTBS_RDF_DATABASE__FORCE_INIT", "true");
            jail.set_env("KTBS_RDF_DATABASE__REPOSITORY", "/tmp/store");

            let config = ConfigLoader::load(file.path()).unwrap();
            assert_eq!(config.server.host_name, "env.example");
            assert_eq!(config.server.port, 9100);
            assert!(config.plugins.stats_per_type);
            assert!(config.rdf_database.force_init);
            Ok(())
        });
    }

    #[test]
    fn test_numeric_environment_values_for_text_options() {
        let file = write_config("[server]\nport = 9000\n");

        Jail::expect_with(|jail| {
            jail.set_env("KTBS_RDF_DATABASE__REPOSITORY", "2024");
            jail.set_env("KTBS_SERVER__CACHE_CONTROL", "60");
            jail.set_env("KTBS_LOGGING__FILENAME", "42");

            let config = ConfigLoader::load(file.path()).unwrap();
            assert_eq!(config.rdf_database.repository.as_deref(), Some("2024"));
            assert_eq!(config.server.cache_control.as_deref(), Some("60"));
            assert_eq!(config.logging.filename.as_deref(), Some("42"));
            Ok(())
        });
    }

    #[test]
    fn test_overrides_win_over_environment() {
        let file = write_config("[server]\nport = 9000\n");
        let mut overrides = IniDocument::new();
        overrides.set("server", "port", "9200");

        Jail::expect_with(|jail| {
            jail.set_env("KTBS_SERVER__PORT", "9100");
            let config = ConfigLoader::load_with_overrides(&[file.path()], &overrides).unwrap();
            assert_eq!(config.server.port, 9200);
            Ok(())
        });
    }

    #[test]
    fn test_json_logging_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("logging.json");
        std::fs::write(
            &json_path,
            r#"{
                "console-level": "WARNING",
                "loggers": ["ktbs", "rdfrest", "plugins"],
                "filename": null
            }"#,
        )
        .unwrap();

        let ini = format!(
            "[logging]\nconsole-level = DEBUG\njson-configuration-filename = {}\n",
            json_path.display()
        );
        let config = ConfigLoader::load_from_str(&ini).unwrap();
        assert_eq!(config.logging.console_level, LogLevel::Warning);
        assert_eq!(config.logging.loggers, vec!["ktbs", "rdfrest", "plugins"]);
        assert_eq!(config.logging.filename, None);
    }

    #[test]
    fn test_logging_overlay_skips_unknown_and_nested_keys() {
        let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(
            r#"{
                "version": 1,
                "handlers": {"console": {"class": "logging.StreamHandler"}},
                "console-level": "ERROR",
                "loggers": {"ktbs": {"level": "DEBUG"}},
                "filename": null
            }"#,
        )
        .unwrap();

        let (doc, mut skipped) = logging_overlay(&entries);
        skipped.sort();
        assert_eq!(skipped, vec!["handlers", "loggers", "version"]);
        assert_eq!(doc.get("logging", "console-level"), Some("ERROR"));
        assert_eq!(doc.get("logging", "filename"), None);
        assert_eq!(doc.effective_pairs().len(), 1);
    }

    #[test]
    fn test_env_key_mapping() {
        assert_eq!(env_key("server.host_name"), "server.host-name");
        assert_eq!(env_key("rdf_database.force_init"), "rdf_database.force-init");
        assert_eq!(env_key("plugins.post_via_get"), "plugins.post_via_get");
        assert_eq!(env_key("ns_prefix.my_ns"), "ns_prefix.my_ns");
        assert_eq!(env_key("config"), "config");
        assert_eq!(env_key("PLUGINS.STATS_PER_TYPE"), "plugins.stats_per_type");
        assert_eq!(env_key("SERVER.HOST_NAME"), "server.host-name");
    }

    #[test]
    fn test_create_example() {
        let temp_file = NamedTempFile::new().unwrap();
        let result = ConfigLoader::create_example(temp_file.path());
        assert!(result.is_ok());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("[logging]"));

        // The template alone yields the defaults
        let config = ConfigLoader::load_from_str(&content).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_typed_round_trip() {
        let mut config = Config::default();
        config.server.port = 8080;
        config.server.max_triples = Some(10_000);
        config.server.max_bytes = Some(9_223_372_036_854_775_808);
        config.plugins.cors = true;
        config.cors.allow_origin = vec!["*".to_string()];
        config.logging.console_format = LogFormat::Compact;
        config
            .ns_prefix
            .insert("foaf".to_string(), "http://xmlns.com/foaf/0.1/".to_string());

        let text = config.to_document().unwrap().to_ini_string();
        let reloaded = ConfigLoader::load_from_str(&text).unwrap();
        assert_eq!(reloaded, config);
    }
}
