use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use config::IniDocument;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "ktbs-config")]
/// Inspect, validate and generate kTBS configuration files
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate configuration files and report errors and warnings
    Check {
        #[command(flatten)]
        sources: Sources,
    },
    /// Print the effective configuration after defaults, environment and overrides
    Show {
        #[command(flatten)]
        sources: Sources,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Ini)]
        format: OutputFormat,
    },
    /// Print the root URI the server will use
    RootUri {
        #[command(flatten)]
        sources: Sources,
    },
    /// Print or write the commented configuration template
    Template {
        /// File to write the template to
        ///
        /// If no file is given, stdout is written.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        /// Activate every documented option with its default value
        #[arg(long)]
        uncommented: bool,
    },
    /// Print a configuration file without comments, one option per line
    Normalize {
        /// File to normalize
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
}

/// Configuration files and command-line overrides
#[derive(Args, Debug, Default)]
pub struct Sources {
    /// Configuration file, can be repeated; later files win
    ///
    /// Defaults to $KTBS_CONFIG, then to ./ktbs.conf when it exists.
    #[arg(short = 'c', long = "config", value_hint = ValueHint::FilePath)]
    pub config: Vec<PathBuf>,
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Options overriding files and environment
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Host name to bind and advertise
    #[arg(long, value_hint = ValueHint::Hostname)]
    pub host_name: Option<String>,
    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,
    /// Path prefix of the root URI
    #[arg(long)]
    pub base_path: Option<String>,
    /// Path or URL of the RDF store
    #[arg(short, long)]
    pub repository: Option<String>,
    /// Reinitialize the RDF store on startup
    #[arg(long)]
    pub force_init: bool,
    /// Minimum console log level
    #[arg(long)]
    pub console_level: Option<String>,
}

impl OverrideArgs {
    /// The overrides as an INI document
    pub fn to_document(&self) -> IniDocument {
        let mut doc = IniDocument::new();
        if let Some(ref host_name) = self.host_name {
            doc.set("server", "host-name", host_name.as_str());
        }
        if let Some(port) = self.port {
            doc.set("server", "port", port.to_string());
        }
        if let Some(ref base_path) = self.base_path {
            doc.set("server", "base-path", base_path.as_str());
        }
        if let Some(ref repository) = self.repository {
            doc.set("rdf_database", "repository", repository.as_str());
        }
        if self.force_init {
            doc.set("rdf_database", "force-init", "true");
        }
        if let Some(ref level) = self.console_level {
            doc.set("logging", "console-level", level.as_str());
        }
        doc
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Ini,
    Json,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show_with_overrides() {
        let cli = Cli::try_parse_from([
            "ktbs-config",
            "show",
            "-c",
            "a.conf",
            "--config",
            "b.conf",
            "--port",
            "9000",
            "--force-init",
            "--format",
            "json",
        ])
        .unwrap();
        let Command::Show { sources, format } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(format, OutputFormat::Json);
        assert_eq!(sources.config, vec![PathBuf::from("a.conf"), PathBuf::from("b.conf")]);

        let doc = sources.overrides.to_document();
        assert_eq!(doc.get("server", "port"), Some("9000"));
        assert_eq!(doc.get("rdf_database", "force-init"), Some("true"));
        assert_eq!(doc.get("server", "host-name"), None);
    }

    #[test]
    fn test_no_overrides_is_empty_document() {
        let doc = OverrideArgs::default().to_document();
        assert_eq!(doc.sections().count(), 0);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["ktbs-config", "root-uri", "--port", "99999"]).is_err());
    }

    #[test]
    fn test_parse_template() {
        let cli = Cli::try_parse_from([
            "ktbs-config",
            "template",
            "-o",
            "out.conf",
            "--uncommented",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Template { output: Some(_), uncommented: true }
        ));
    }
}
