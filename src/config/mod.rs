use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub mod validator;

use crate::cli::Cli;
use crate::domain::output::ViewMode;

/// Default configuration file, looked up next to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "prompt-tuner.toml";

/// Longest schema cache lifetime accepted (30 days)
pub const MAX_CACHE_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub schema: SchemaSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// The backend that serves workflow schemas and executes workflows
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Endpoint templates; `{name}` is replaced by the workflow name
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
    #[serde(default = "default_execute_path")]
    pub execute_path: String,
    #[serde(default = "default_workflows_path")]
    pub workflows_path: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            schema_path: default_schema_path(),
            execute_path: default_execute_path(),
            workflows_path: default_workflows_path(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:80".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_schema_path() -> String {
    "/api/v1/workflows/{name}/schema".to_string()
}

fn default_execute_path() -> String {
    "/api/v1/workflows/{name}/execute".to_string()
}

fn default_workflows_path() -> String {
    "/api/v1/workflows".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaSettings {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Read schemas from `<directory>/<name>.{json,yaml,yml}` instead of the
    /// backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Explicit root type per schema name
    #[serde(default)]
    pub root_overrides: HashMap<String, String>,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl(),
            directory: None,
            root_overrides: HashMap::new(),
        }
    }
}

impl SchemaSettings {
    /// Cache lifetime, clamped to [`MAX_CACHE_TTL_SECONDS`]
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_seconds.min(MAX_CACHE_TTL_SECONDS) as i64)
    }
}

fn default_cache_ttl() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationSettings {
    /// Quiet period before a coalesced validation pass
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
        }
    }
}

fn default_debounce() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub default_view: ViewMode,
    #[serde(default = "default_export_basename")]
    pub export_basename: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            default_view: ViewMode::Auto,
            export_basename: default_export_basename(),
        }
    }
}

fn default_export_basename() -> String {
    "workflow-results".to_string()
}

impl BackendSettings {
    /// Absolute URL of an endpoint template for one workflow
    pub fn endpoint(&self, template: &str, name: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            template.replace("{name}", name)
        )
    }
}

impl Settings {
    /// Create settings from CLI arguments (config file first, then CLI and
    /// environment overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::load(&cli.config)?;
        settings.apply_cli_overrides(cli);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(url) = &cli.backend_url {
            self.backend.base_url = url.clone();
        }
        if let Some(dir) = &cli.schema_dir {
            self.schema.directory = Some(dir.clone());
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            backend: BackendSettings::default(),
            schema: SchemaSettings::default(),
            validation: ValidationSettings::default(),
            output: OutputSettings::default(),
        }
    }
}
