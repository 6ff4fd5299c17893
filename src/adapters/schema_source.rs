//! Where workflow schemas come from
//!
//! The backend serves one JSON Schema document per workflow. For offline use
//! the same documents can be read from a directory, and tests use the
//! in-memory source.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::BackendSettings;
use crate::domain::schema::SchemaError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {location}: {reason}")]
    Parse { location: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Load of '{0}' was superseded by a newer request")]
    Superseded(String),
}

#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Fetch the raw schema document for a workflow
    async fn fetch(&self, name: &str) -> Result<Value, LoadError>;
}

/// Fetches `GET {base_url}{schema_path}` from the workflow backend
pub struct HttpSchemaSource {
    client: reqwest::Client,
    settings: BackendSettings,
}

impl HttpSchemaSource {
    pub fn new(settings: BackendSettings) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn fetch(&self, name: &str) -> Result<Value, LoadError> {
        let url = self.settings.endpoint(&self.settings.schema_path, name);
        debug!(url = %url, "Fetching schema");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(LoadError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| LoadError::Parse {
            location: url,
            reason: e.to_string(),
        })
    }
}

/// Reads `<directory>/<name>.json`, `.yaml` or `.yml`
pub struct FileSchemaSource {
    directory: PathBuf,
}

impl FileSchemaSource {
    const EXTENSIONS: [&'static str; 3] = ["json", "yaml", "yml"];

    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl SchemaSource for FileSchemaSource {
    async fn fetch(&self, name: &str) -> Result<Value, LoadError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(LoadError::NotFound(name.to_string()));
        }

        for ext in Self::EXTENSIONS {
            let path = self.directory.join(format!("{}.{}", name, ext));
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!(path = %path.display(), "Reading schema file");
                return parse_schema_file(&path).await;
            }
        }
        Err(LoadError::NotFound(name.to_string()))
    }
}

/// Parse a JSON or YAML file into a JSON value, by extension
pub async fn parse_schema_file(path: &Path) -> Result<Value, LoadError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let location = path.display().to_string();

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| LoadError::Parse {
            location,
            reason: e.to_string(),
        }),
        _ => serde_json::from_str(&content).map_err(|e| LoadError::Parse {
            location,
            reason: e.to_string(),
        }),
    }
}

#[derive(Default)]
pub struct InMemorySchemaSource {
    schemas: RwLock<HashMap<String, Value>>,
}

impl InMemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: impl Into<String>, schema: Value) {
        self.schemas.write().await.insert(name.into(), schema);
    }
}

#[async_trait]
impl SchemaSource for InMemorySchemaSource {
    async fn fetch(&self, name: &str) -> Result<Value, LoadError> {
        self.schemas
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}
