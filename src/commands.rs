//! Runners for the command line subcommands

use anyhow::{anyhow, Context};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::api_handler::ApiState;
use crate::adapters::execution_client::{BackendClient, WorkflowBackend};
use crate::adapters::schema_cache::SchemaCache;
use crate::adapters::schema_loader::SchemaLoader;
use crate::adapters::schema_source::{
    parse_schema_file, FileSchemaSource, HttpSchemaSource, SchemaSource,
};
use crate::cli::Command;
use crate::config::Settings;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::form::{FormSession, Validator};
use crate::domain::output::{ExportFormat, Exporter, OutputRenderer, ViewMode};

pub async fn run(command: Command, settings: Settings) -> anyhow::Result<()> {
    match command {
        Command::Serve => serve(settings).await,
        Command::Form {
            schema,
            root,
            values,
            html,
        } => form(&settings, &schema, root.as_deref(), values.as_deref(), html).await,
        Command::Validate { schema, data, root } => {
            validate(&settings, &schema, &data, root.as_deref()).await
        }
        Command::Render { payload, view } => render(&settings, &payload, view.as_deref()).await,
        Command::Export {
            payload,
            format,
            out,
        } => export(&settings, &payload, &format, out).await,
        Command::Workflows => workflows(&settings).await,
    }
}

/// Schema source chosen by settings: a directory when configured, otherwise
/// the backend
pub fn schema_loader(settings: &Settings, clock: Arc<dyn Clock>) -> anyhow::Result<SchemaLoader> {
    let source: Arc<dyn SchemaSource> = match &settings.schema.directory {
        Some(dir) => {
            info!(directory = %dir.display(), "Reading schemas from directory");
            Arc::new(FileSchemaSource::new(dir))
        }
        None => {
            info!(backend = %settings.backend.base_url, "Fetching schemas from backend");
            Arc::new(HttpSchemaSource::new(settings.backend.clone())?)
        }
    };
    Ok(SchemaLoader::new(source, SchemaCache::new(settings.schema.cache_ttl(), clock))
        .with_root_overrides(settings.schema.root_overrides.clone()))
}

pub fn api_state(settings: Settings) -> anyhow::Result<ApiState> {
    let loader = schema_loader(&settings, Arc::new(SystemClock))?;
    let backend = BackendClient::new(settings.backend.clone())?;
    Ok(ApiState {
        settings: Arc::new(settings),
        loader: Arc::new(loader),
        backend: Arc::new(backend),
    })
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let app = crate::create_app(api_state(settings)?);

    info!("Starting Prompt Tuner on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn form(
    settings: &Settings,
    schema: &str,
    root: Option<&str>,
    values: Option<&Path>,
    html: bool,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let loaded = schema_loader(settings, clock.clone())?.load(schema, root).await?;
    if loaded.model.selection.is_ambiguous() {
        warn!(
            candidates = ?loaded.model.selection.candidates,
            "Several types could be the root; pass --root to choose"
        );
    }

    let debounce = chrono::Duration::milliseconds(settings.validation.debounce_ms as i64);
    let mut session = FormSession::new(loaded.model.clone(), clock, debounce);
    if let Some(path) = values {
        session.load_revision(&read_json(path).await?);
        let submission = session.submit()?;
        for error in &submission.errors {
            warn!(path = %error.path, "{}", error.message);
        }
    }

    let view = session.view();
    if html {
        println!("{}", view.to_html());
    } else {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }
    Ok(())
}

async fn validate(
    settings: &Settings,
    schema: &str,
    data: &Path,
    root: Option<&str>,
) -> anyhow::Result<()> {
    let loaded = schema_loader(settings, Arc::new(SystemClock))?
        .load(schema, root)
        .await?;
    let data = read_json(data).await?;

    let errors = Validator::validate(&loaded.model, &data);
    if errors.is_empty() {
        println!("valid");
        return Ok(());
    }
    for error in &errors {
        println!("{}: {}", error.path, error.message);
    }
    Err(anyhow!("{} validation error(s)", errors.len()))
}

async fn render(settings: &Settings, payload: &Path, view: Option<&str>) -> anyhow::Result<()> {
    let mode = match view {
        Some(v) => v.parse::<ViewMode>().map_err(|e| anyhow!(e))?,
        None => settings.output.default_view,
    };
    let payload = read_json(payload).await?;

    let rendered = OutputRenderer::render(&payload, mode);
    if let Some(fallback) = &rendered.fallback {
        warn!(requested = %fallback.requested, rendered = fallback.rendered, "{}", fallback.reason);
    }
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

async fn export(
    settings: &Settings,
    payload: &Path,
    format: &str,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let format: ExportFormat = format.parse()?;
    let payload = read_json(payload).await?;

    let file = Exporter::new(&settings.output.export_basename).export(&payload, format)?;
    let target = out.unwrap_or_else(|| PathBuf::from(&file.filename));
    tokio::fs::write(&target, &file.content)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;
    info!(path = %target.display(), media_type = %file.media_type, "Exported results");
    Ok(())
}

async fn workflows(settings: &Settings) -> anyhow::Result<()> {
    let backend = BackendClient::new(settings.backend.clone())?;
    for workflow in backend.list_workflows().await? {
        match workflow.description {
            Some(description) => println!("{}\t{}", workflow.name, description),
            None => println!("{}", workflow.name),
        }
    }
    Ok(())
}

/// JSON or YAML data file, chosen by extension
async fn read_json(path: &Path) -> anyhow::Result<Value> {
    Ok(parse_schema_file(path).await?)
}
