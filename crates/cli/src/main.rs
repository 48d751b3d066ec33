//! kTBS configuration toolkit - command-line entry point

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::Config;
use std::io::Write;
use tracing::{info, warn};

mod cli;
mod commands;
mod logging;

use cli::{Cli, Command};

fn main() -> Result<()> {
    // Load .env file if it exists; logging is not up yet
    let dotenv = dotenv::dotenv();

    let cli = Cli::parse();

    let config = match &cli.command {
        Command::Show { sources, .. } | Command::RootUri { sources } => {
            Some(commands::load(sources).context("Failed to load configuration")?)
        }
        _ => None,
    };

    // Commands that do not load a configuration log with the defaults
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|| Config::default().logging);
    logging::init_logging(&logging)?;

    match dotenv {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        // Only warn if the error is not "file not found"
        Err(e) if !e.not_found() => warn!("Could not load .env file: {}", e),
        Err(_) => {}
    }
    info!("kTBS configuration toolkit v{}", env!("CARGO_PKG_VERSION"));

    let output = match cli.command {
        Command::Check { sources } => {
            let report = commands::check(&sources);
            print(&commands::render_report(&report))?;
            if report.has_errors() {
                bail!("{} configuration errors", report.errors.len());
            }
            return Ok(());
        }
        Command::Show { format, .. } => {
            let config = config.context("Configuration not loaded")?;
            info!("Root URI: {}", config.root_uri()?);
            let plugins = config.plugins.enabled();
            if !plugins.is_empty() {
                info!("Enabled plugins: {}", plugins.join(", "));
            }
            commands::render_config(&config, format)?
        }
        Command::RootUri { .. } => {
            let config = config.context("Configuration not loaded")?;
            commands::root_uri(&config)?
        }
        Command::Template { output, uncommented } => {
            match commands::template(output.as_deref(), uncommented)? {
                Some(text) => text,
                None => return Ok(()),
            }
        }
        Command::Normalize { file } => commands::normalize(&file)?,
    };

    print(&output)
}

fn print(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    stdout.flush().context("Failed to write to stdout")
}
