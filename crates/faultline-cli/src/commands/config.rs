//! Config command - View and manage Faultline configuration
//!
//! Provides the `faultline config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON) with the token masked
//! 2. Validates the configuration file and reports every problem
//! 3. Writes a starter configuration file

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use faultline_core::config::{Config, ConfigBuilder};
use tracing::info;

use crate::output::OutputFormat;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Create a configuration file
    Init {
        /// Collection endpoint URL
        #[arg(long)]
        host: Option<String>,
        /// Submission token
        #[arg(long)]
        token: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Copy of `config` safe to print
fn masked(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.endpoint.token.is_some() {
        shown.endpoint.token = Some("***".to_string());
    }
    shown
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => show(config_path, format),
            ConfigCommand::Validate => validate(config_path, format),
            ConfigCommand::Init { host, token, force } => {
                init(config_path, host.as_deref(), token.as_deref(), *force, format)
            }
        }
    }
}

fn show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = format.formatter();
    let config = masked(&Config::load_or_default(config_path));

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json = serde_json::to_value(&config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        if !config_path.exists() {
            formatter.info("(file not found, showing defaults)");
        }
        formatter.info("");
        let yaml = serde_yaml::to_string(&config)
            .context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = format.formatter();

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {e}")
            } else {
                "Configuration file not found".to_string()
            };
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
                formatter.info("Run 'faultline config init' to create one.");
            }
            bail!("configuration is not usable");
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
        if config.endpoint.host.is_none() {
            formatter.warn("No endpoint configured; reports cannot be sent");
        }
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("configuration has {} error(s)", errors.len())
    }
}

fn init(
    config_path: &Path,
    host: Option<&str>,
    token: Option<&str>,
    force: bool,
    format: OutputFormat,
) -> Result<()> {
    let formatter = format.formatter();

    if config_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        );
    }

    let mut builder = ConfigBuilder::new();
    if let Some(host) = host {
        builder = builder.endpoint_host(host);
    }
    if let Some(token) = token {
        builder = builder.endpoint_token(token);
    }
    let config = builder.build_validated().map_err(|errors| {
        let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("invalid configuration: {}", joined.join("; "))
    })?;

    config
        .save(config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!(config_path = %config_path.display(), "Configuration written");

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Wrote {}", config_path.display()));
    }
    Ok(())
}
