//! Schema loading with caching, last-load-wins and last-known-good fallback
//!
//! A form panel shows one workflow at a time. When the user switches
//! workflows while a fetch is still in flight, the fetch is not cancelled;
//! its result is discarded when it settles because the active ticket has
//! moved on.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::schema_cache::SchemaCache;
use super::schema_source::{LoadError, SchemaSource};
use crate::domain::form::{FieldModel, FieldModelBuilder};
use crate::domain::schema::{SchemaDocument, SchemaError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOrigin {
    Source,
    Cache,
    /// The load failed and the previous good schema was returned instead
    LastKnownGood,
}

#[derive(Clone, Debug)]
pub struct LoadedSchema {
    pub name: String,
    pub document: Arc<SchemaDocument>,
    pub model: Arc<FieldModel>,
    pub origin: LoadOrigin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LoadTicket {
    name: String,
    generation: u64,
}

pub struct SchemaLoader {
    source: Arc<dyn SchemaSource>,
    cache: SchemaCache,
    root_overrides: HashMap<String, String>,
    generation: AtomicU64,
    active: Mutex<Option<LoadTicket>>,
    last_good: RwLock<HashMap<String, LoadedSchema>>,
}

impl SchemaLoader {
    pub fn new(source: Arc<dyn SchemaSource>, cache: SchemaCache) -> Self {
        Self {
            source,
            cache,
            root_overrides: HashMap::new(),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
            last_good: RwLock::new(HashMap::new()),
        }
    }

    /// Root type names to use per schema when the caller does not pass one
    pub fn with_root_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.root_overrides = overrides;
        self
    }

    /// Load `name` as the panel's active schema.
    ///
    /// Returns [`LoadError::Superseded`] when another `load` started after
    /// this one before its fetch settled.
    pub async fn load(&self, name: &str, root: Option<&str>) -> Result<LoadedSchema, LoadError> {
        let ticket = LoadTicket {
            name: name.to_string(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.set_active(Some(ticket.clone()));
        info!(schema = %name, generation = ticket.generation, "Loading schema");

        let result = self.fetch_document(name).await;

        if !self.is_active(&ticket) {
            info!(schema = %name, generation = ticket.generation, "Discarding superseded schema fetch");
            return Err(LoadError::Superseded(name.to_string()));
        }

        self.finish(name, root, result).await
    }

    /// Load `name` without taking part in last-load-wins; used by callers
    /// that serve several schemas side by side
    pub async fn load_shared(&self, name: &str, root: Option<&str>) -> Result<LoadedSchema, LoadError> {
        let result = self.fetch_document(name).await;
        self.finish(name, root, result).await
    }

    /// Most recent successfully built schema for `name`
    pub async fn last_good(&self, name: &str) -> Option<LoadedSchema> {
        self.last_good.read().await.get(name).cloned()
    }

    /// Drop the cached document so the next load fetches again
    pub async fn invalidate(&self, name: &str) {
        self.cache.invalidate(name).await;
    }

    async fn fetch_document(&self, name: &str) -> Result<(Arc<SchemaDocument>, LoadOrigin), LoadError> {
        if let Some(document) = self.cache.get(name).await {
            info!(schema = %name, "Schema cache hit");
            return Ok((document, LoadOrigin::Cache));
        }

        let raw = self.source.fetch(name).await?;
        let document = Arc::new(SchemaDocument::from_value(&raw)?);
        Ok((document, LoadOrigin::Source))
    }

    async fn finish(
        &self,
        name: &str,
        root: Option<&str>,
        fetched: Result<(Arc<SchemaDocument>, LoadOrigin), LoadError>,
    ) -> Result<LoadedSchema, LoadError> {
        let root = root.or_else(|| self.root_overrides.get(name).map(String::as_str));
        let built = fetched.and_then(|(document, origin)| {
            let model = FieldModelBuilder::new(&document).build_model(root)?;
            Ok((document, model, origin))
        });

        match built {
            Ok((document, model, origin)) => {
                if origin == LoadOrigin::Source {
                    self.cache.insert(name, document.clone()).await;
                }
                let loaded = LoadedSchema {
                    name: name.to_string(),
                    document,
                    model: Arc::new(model),
                    origin,
                };
                self.last_good
                    .write()
                    .await
                    .insert(name.to_string(), loaded.clone());
                Ok(loaded)
            }
            // An unknown root is the caller's mistake, not a broken schema
            Err(error @ LoadError::Schema(SchemaError::UnknownRoot { .. })) => Err(error),
            Err(error) => match self.last_good(name).await {
                Some(previous) => {
                    warn!(schema = %name, error = %error, "Schema load failed, using last known good schema");
                    Ok(LoadedSchema {
                        origin: LoadOrigin::LastKnownGood,
                        ..previous
                    })
                }
                None => {
                    warn!(schema = %name, error = %error, "Schema load failed");
                    Err(error)
                }
            },
        }
    }

    fn set_active(&self, ticket: Option<LoadTicket>) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        *active = ticket;
    }

    fn is_active(&self, ticket: &LoadTicket) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.as_ref() == Some(ticket)
    }
}
