//! Configuration module for SourceBridge.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::ProviderKind;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for SourceBridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(deserialize_with = "deserialize_dropbox")]
    pub dropbox: ProviderConfig,
    #[serde(deserialize_with = "deserialize_google_drive")]
    pub google_drive: ProviderConfig,
    pub auth: AuthConfig,
    pub listing: ListingConfig,
    pub logging: LoggingConfig,
}

/// Ingestion backend (intermediate storage + indexing endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, e.g. `https://chat.example.com`.
    pub base_url: String,
    /// Path of the multipart storage upload endpoint.
    pub storage_path: String,
    /// Path of the JSON indexing endpoint.
    pub indexing_path: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// OAuth application and API endpoints for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderConfig {
    /// OAuth client ID. `None` until the user registers an application.
    pub client_id: Option<String>,
    /// OAuth client secret, for applications registered as confidential.
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// Metadata API base URL.
    pub api_base_url: String,
    /// Content API base URL (Dropbox serves downloads from a separate host).
    pub content_base_url: String,
    pub scopes: Vec<String>,
    /// Entries requested per listing page.
    pub page_size: u32,
}

/// Authentication / OAuth settings shared by all providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Loopback port for the OAuth redirect. `0` picks a free port.
    pub callback_port: u16,
    /// Seconds to wait for the user to finish the consent page.
    pub callback_timeout_secs: u64,
    /// Credential namespace; independent profiles never share tokens.
    pub profile: String,
    /// Open the consent page in the system browser.
    pub open_browser: bool,
}

/// Remote listing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Pagination stops once this many files have been collected.
    pub max_files: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/sourcebridge/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("sourcebridge")
            .join("config.yaml")
    }

    /// Section for `provider`.
    pub fn provider(&self, provider: ProviderKind) -> &ProviderConfig {
        match provider {
            ProviderKind::Dropbox => &self.dropbox,
            ProviderKind::GoogleDrive => &self.google_drive,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            storage_path: "/api/upload-to-gcs".to_string(),
            indexing_path: "/api/upload-gcs-to-rag".to_string(),
            timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    /// Defaults for the Dropbox API v2.
    pub fn dropbox() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: "https://www.dropbox.com/oauth2/authorize".to_string(),
            token_url: "https://api.dropboxapi.com/oauth2/token".to_string(),
            api_base_url: "https://api.dropboxapi.com/2".to_string(),
            content_base_url: "https://content.dropboxapi.com/2".to_string(),
            scopes: vec![
                "files.metadata.read".to_string(),
                "files.content.read".to_string(),
            ],
            page_size: 500,
        }
    }

    /// Defaults for the Google Drive API v3.
    pub fn google_drive() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            content_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
            page_size: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            dropbox: ProviderConfig::dropbox(),
            google_drive: ProviderConfig::google_drive(),
            auth: AuthConfig::default(),
            listing: ListingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Provider section as written in the file; absent keys keep the
/// provider's own defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderConfigOverrides {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_url: Option<String>,
    token_url: Option<String>,
    api_base_url: Option<String>,
    content_base_url: Option<String>,
    scopes: Option<Vec<String>>,
    page_size: Option<u32>,
}

impl ProviderConfigOverrides {
    fn apply(self, mut base: ProviderConfig) -> ProviderConfig {
        if self.client_id.is_some() {
            base.client_id = self.client_id;
        }
        if self.client_secret.is_some() {
            base.client_secret = self.client_secret;
        }
        if let Some(v) = self.auth_url {
            base.auth_url = v;
        }
        if let Some(v) = self.token_url {
            base.token_url = v;
        }
        if let Some(v) = self.api_base_url {
            base.api_base_url = v;
        }
        if let Some(v) = self.content_base_url {
            base.content_base_url = v;
        }
        if let Some(v) = self.scopes {
            base.scopes = v;
        }
        if let Some(v) = self.page_size {
            base.page_size = v;
        }
        base
    }
}

fn deserialize_dropbox<'de, D>(deserializer: D) -> Result<ProviderConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(ProviderConfigOverrides::deserialize(deserializer)?.apply(ProviderConfig::dropbox()))
}

fn deserialize_google_drive<'de, D>(deserializer: D) -> Result<ProviderConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(ProviderConfigOverrides::deserialize(deserializer)?.apply(ProviderConfig::google_drive()))
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            callback_port: 53682,
            callback_timeout_secs: 300,
            profile: "default".to_string(),
            open_browser: true,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self { max_files: 1000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"listing.max_files"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn is_http_url(value: &str) -> bool {
    (value.starts_with("http://") || value.starts_with("https://"))
        && value.split("://").nth(1).is_some_and(|rest| !rest.is_empty())
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Missing client IDs
    /// are not errors here; they are reported when a connection is attempted.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- backend ---
        if !is_http_url(&self.backend.base_url) {
            push(
                "backend.base_url",
                format!("must be an http(s) URL, got '{}'", self.backend.base_url),
            );
        }
        if !self.backend.storage_path.starts_with('/') {
            push("backend.storage_path", "must start with '/'".into());
        }
        if !self.backend.indexing_path.starts_with('/') {
            push("backend.indexing_path", "must start with '/'".into());
        }
        if self.backend.timeout_secs == 0 {
            push("backend.timeout_secs", "must be greater than 0".into());
        }

        // --- providers ---
        for (section, provider) in [("dropbox", &self.dropbox), ("google_drive", &self.google_drive)]
        {
            for (name, value) in [
                ("auth_url", &provider.auth_url),
                ("token_url", &provider.token_url),
                ("api_base_url", &provider.api_base_url),
                ("content_base_url", &provider.content_base_url),
            ] {
                if !is_http_url(value) {
                    push(
                        &format!("{section}.{name}"),
                        format!("must be an http(s) URL, got '{value}'"),
                    );
                }
            }
            if provider.client_id.as_deref() == Some("") {
                push(
                    &format!("{section}.client_id"),
                    "must not be empty when set".into(),
                );
            }
            if provider.page_size == 0 || provider.page_size > 1000 {
                push(
                    &format!("{section}.page_size"),
                    "must be in range 1..=1000".into(),
                );
            }
        }

        // --- auth ---
        if self.auth.callback_timeout_secs == 0 {
            push("auth.callback_timeout_secs", "must be greater than 0".into());
        }
        if self.auth.profile.trim().is_empty() {
            push("auth.profile", "must not be empty".into());
        } else if self.auth.profile.contains(':') {
            push("auth.profile", "must not contain ':'".into());
        }

        // --- listing ---
        if self.listing.max_files == 0 {
            push("listing.max_files", "must be greater than 0".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use sourcebridge_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .backend_base_url("https://chat.example.com")
///     .dropbox_client_id("abc123")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- backend ---

    pub fn backend_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.base_url = url.into();
        self
    }

    pub fn backend_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.backend.timeout_secs = seconds;
        self
    }

    // --- providers ---

    pub fn dropbox_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.dropbox.client_id = Some(client_id.into());
        self
    }

    pub fn google_drive_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.google_drive.client_id = Some(client_id.into());
        self
    }

    pub fn google_drive_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.google_drive.client_secret = Some(secret.into());
        self
    }

    /// Points one provider's API hosts at `base_url` (used against mock servers).
    pub fn provider_api_base_url(mut self, provider: ProviderKind, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let section = match provider {
            ProviderKind::Dropbox => &mut self.config.dropbox,
            ProviderKind::GoogleDrive => &mut self.config.google_drive,
        };
        section.api_base_url = base_url.clone();
        section.content_base_url = base_url;
        self
    }

    // --- auth ---

    pub fn auth_callback_port(mut self, port: u16) -> Self {
        self.config.auth.callback_port = port;
        self
    }

    pub fn auth_callback_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.auth.callback_timeout_secs = seconds;
        self
    }

    pub fn auth_profile(mut self, profile: impl Into<String>) -> Self {
        self.config.auth.profile = profile.into();
        self
    }

    // --- listing ---

    pub fn listing_max_files(mut self, max_files: usize) -> Self {
        self.config.listing.max_files = max_files;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or the
    /// list of validation errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
