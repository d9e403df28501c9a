//! Config command - View and manage SourceBridge configuration
//!
//! Provides the `sourcebridge config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual values via dot-notation keys
//! 3. Validates the configuration file and reports errors per field
//! 4. Writes a default configuration file

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use sourcebridge_core::{
    config::{Config, ProviderConfig},
    domain::ProviderKind,
};
use tracing::info;

use crate::{
    context::AppContext,
    output::{get_formatter, OutputFormat, OutputFormatter},
};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "dropbox.client_id")
        key: String,
        /// New value
        value: String,
    },
    /// Validate the configuration file
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format.is_json());
        let path = ctx.config_path.as_path();
        match self {
            ConfigCommand::Show => execute_show(&ctx.config, path, &*fmt, format),
            ConfigCommand::Set { key, value } => execute_set(path, key, value, &*fmt, format),
            ConfigCommand::Validate => execute_validate(path, &*fmt, format),
            ConfigCommand::Init { force } => execute_init(path, *force, &*fmt, format),
            ConfigCommand::Path => {
                if format.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "config_path": path.display().to_string(),
                        "exists": path.exists(),
                    }));
                } else {
                    println!("{}", path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(
    config: &Config,
    path: &Path,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
) -> Result<()> {
    info!(config_path = %path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(config).context("Failed to serialize configuration to JSON")?;
        fmt.print_json(&json);
        return Ok(());
    }

    let source = if path.exists() { "" } else { ", defaults" };
    fmt.success(&format!("Configuration ({}{source})", path.display()));
    fmt.info("");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;
    for line in yaml.lines() {
        fmt.info(line);
    }
    Ok(())
}

fn execute_set(
    path: &Path,
    key: &str,
    value: &str,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
) -> Result<()> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };

    info!(key = %key, "Setting configuration value");
    apply_config_value(&mut config, key, value)?;

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid value for '{key}': {}", messages.join("; "));
    }

    config.save(path)?;

    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "config_path": path.display().to_string(),
        }));
    } else {
        fmt.success(&format!("Set {key}"));
        fmt.info(&format!("Saved to {}", path.display()));
    }
    Ok(())
}

fn execute_validate(path: &Path, fmt: &dyn OutputFormatter, format: OutputFormat) -> Result<()> {
    if !path.exists() {
        bail!(
            "Configuration file not found at {} (run `sourcebridge config init`)",
            path.display()
        );
    }
    let config = Config::load(path)?;

    info!(config_path = %path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        fmt.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        fmt.success("Configuration is valid");
        fmt.info(&format!("File: {}", path.display()));
    } else {
        fmt.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        for error in &errors {
            fmt.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if !errors.is_empty() {
        bail!("Configuration is invalid");
    }
    Ok(())
}

fn execute_init(
    path: &Path,
    force: bool,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
    }
    Config::default().save(path)?;
    info!(config_path = %path.display(), "Wrote default configuration");

    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "success": true,
            "config_path": path.display().to_string(),
        }));
    } else {
        fmt.success(&format!("Wrote {}", path.display()));
        fmt.info("Set dropbox.client_id and google_drive.client_id before connecting.");
    }
    Ok(())
}

/// Applies a dot-notation key/value pair to `config`
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let Some((section, field)) = key.split_once('.') else {
        bail!("Expected a key like 'section.field', got '{key}'");
    };

    match section {
        "backend" => match field {
            "base_url" => config.backend.base_url = value.to_string(),
            "storage_path" => config.backend.storage_path = value.to_string(),
            "indexing_path" => config.backend.indexing_path = value.to_string(),
            "timeout_secs" => config.backend.timeout_secs = parse_number(key, value)?,
            _ => bail!("Unknown configuration key '{key}'"),
        },
        "dropbox" => apply_provider_value(&mut config.dropbox, key, field, value)?,
        "google_drive" => apply_provider_value(&mut config.google_drive, key, field, value)?,
        "auth" => match field {
            "callback_port" => config.auth.callback_port = parse_number(key, value)?,
            "callback_timeout_secs" => {
                config.auth.callback_timeout_secs = parse_number(key, value)?
            }
            "profile" => config.auth.profile = value.to_string(),
            "open_browser" => {
                config.auth.open_browser = value
                    .parse()
                    .with_context(|| format!("Expected true or false for {key}"))?
            }
            _ => bail!("Unknown configuration key '{key}'"),
        },
        "listing" => match field {
            "max_files" => config.listing.max_files = parse_number(key, value)?,
            _ => bail!("Unknown configuration key '{key}'"),
        },
        "logging" => match field {
            "level" => config.logging.level = value.to_string(),
            "format" => config.logging.format = value.to_string(),
            _ => bail!("Unknown configuration key '{key}'"),
        },
        other => match other.parse::<ProviderKind>() {
            // Provider aliases such as `gdrive.client_id`
            Ok(ProviderKind::Dropbox) => {
                apply_provider_value(&mut config.dropbox, key, field, value)?
            }
            Ok(ProviderKind::GoogleDrive) => {
                apply_provider_value(&mut config.google_drive, key, field, value)?
            }
            Err(_) => bail!("Unknown configuration section '{other}'"),
        },
    }
    Ok(())
}

fn apply_provider_value(
    provider: &mut ProviderConfig,
    key: &str,
    field: &str,
    value: &str,
) -> Result<()> {
    let optional = |v: &str| (!v.trim().is_empty()).then(|| v.to_string());
    match field {
        "client_id" => provider.client_id = optional(value),
        "client_secret" => provider.client_secret = optional(value),
        "auth_url" => provider.auth_url = value.to_string(),
        "token_url" => provider.token_url = value.to_string(),
        "api_base_url" => provider.api_base_url = value.to_string(),
        "content_base_url" => provider.content_base_url = value.to_string(),
        "page_size" => provider.page_size = parse_number(key, value)?,
        "scopes" => {
            provider.scopes = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        }
        _ => bail!("Unknown configuration key '{key}'"),
    }
    Ok(())
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Expected a positive integer for {key}"))
}
