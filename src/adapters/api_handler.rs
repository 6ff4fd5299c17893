//! REST API handlers for workflow forms and result views
//!
//! A thin JSON layer over the engine: schemas are loaded through the shared
//! [`SchemaLoader`], submissions are validated before they reach the
//! backend, and result payloads are rendered or exported on request.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

use crate::adapters::execution_client::{ExecutionError, WorkflowBackend, WorkflowSummary};
use crate::adapters::schema_loader::{LoadOrigin, SchemaLoader};
use crate::adapters::schema_source::LoadError;
use crate::config::Settings;
use crate::domain::form::{
    collect, flatten, state_from_fields, CollectionMismatchError, FieldDescriptor, FormRenderer,
    FormView, ValidationError, Validator,
};
use crate::domain::output::{ExportError, ExportFormat, Exporter, OutputRenderer, RenderedOutput, ViewMode};
use crate::domain::schema::{RootSelection, SchemaError};

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<Settings>,
    pub loader: Arc<SchemaLoader>,
    pub backend: Arc<dyn WorkflowBackend>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed request that still carries details, e.g. validation errors
    pub fn failure(data: T, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(message.into()),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Collection(#[from] CollectionMismatchError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Load(LoadError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Load(LoadError::Schema(SchemaError::UnknownRoot { .. })) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Load(LoadError::Schema(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Load(LoadError::Superseded(_)) => StatusCode::CONFLICT,
            ApiError::Load(_) => StatusCode::BAD_GATEWAY,
            ApiError::Collection(_) => StatusCode::BAD_REQUEST,
            ApiError::Execution(_) => StatusCode::BAD_GATEWAY,
            ApiError::Export(ExportError::UnsupportedFormat(_)) => StatusCode::BAD_REQUEST,
            ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    pub root: Option<String>,
}

#[derive(Serialize)]
pub struct FormPayload {
    pub workflow: String,
    pub origin: LoadOrigin,
    pub selection: RootSelection,
    pub fields: FieldDescriptor,
    pub form: FormView,
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct CollectRequest {
    /// Control address to raw control value
    pub fields: IndexMap<String, String>,
    /// Union address to selected branch index
    #[serde(default)]
    pub selections: IndexMap<String, usize>,
    #[serde(default)]
    pub root: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollectResult {
    pub data: Value,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub data: Value,
    #[serde(default)]
    pub root: Option<String>,
}

#[derive(Serialize)]
pub struct ValidateResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub data: Value,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub view: Option<ViewMode>,
}

#[derive(Serialize)]
pub struct SubmitResult {
    pub result: Value,
    pub rendered: RenderedOutput,
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub payload: Value,
    #[serde(default)]
    pub view: Option<ViewMode>,
}

#[derive(Serialize)]
pub struct RenderResult {
    pub rendered: RenderedOutput,
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub payload: Value,
    pub format: String,
}

// ============================================================================
// Workflow Handlers
// ============================================================================

/// GET /api/workflows - List workflows known to the backend
pub async fn list_workflows(State(state): State<ApiState>) -> ApiResult<Vec<WorkflowSummary>> {
    ok(state.backend.list_workflows().await?)
}

/// GET /api/workflows/:name/form - Field model and form for a workflow
pub async fn get_form(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<FormQuery>,
) -> ApiResult<FormPayload> {
    let loaded = state.loader.load_shared(&name, query.root.as_deref()).await?;
    let model = &loaded.model;
    let form_state = flatten(model, &model.default_data());
    let form = FormRenderer::render(model, &form_state);

    ok(FormPayload {
        workflow: name,
        origin: loaded.origin,
        selection: model.selection.clone(),
        fields: model.root.clone(),
        html: form.to_html(),
        form,
    })
}

/// POST /api/workflows/:name/collect - Build the data tree from control values
pub async fn collect_form(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<CollectRequest>,
) -> ApiResult<CollectResult> {
    let loaded = state.loader.load_shared(&name, req.root.as_deref()).await?;

    let selections: Vec<(String, String)> = req
        .selections
        .iter()
        .map(|(address, branch)| (address.clone(), branch.to_string()))
        .collect();
    let form_state = state_from_fields(
        req.fields
            .iter()
            .chain(selections.iter().map(|(a, b)| (a, b))),
    )?;

    let data = collect(&loaded.model, &form_state)?;
    let errors = Validator::validate_with(&loaded.model, &data, &form_state);
    ok(CollectResult { data, errors })
}

/// POST /api/workflows/:name/validate - Validate a data tree
pub async fn validate_data(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<ValidateResult> {
    let loaded = state.loader.load_shared(&name, req.root.as_deref()).await?;
    let errors = Validator::validate(&loaded.model, &req.data);
    ok(ValidateResult {
        valid: errors.is_empty(),
        errors,
    })
}

/// POST /api/workflows/:name/submit - Validate, execute and render the result
pub async fn submit(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Response, ApiError> {
    let loaded = state.loader.load_shared(&name, req.root.as_deref()).await?;
    let errors = Validator::validate(&loaded.model, &req.data);
    if !errors.is_empty() {
        let body = ApiResponse::failure(
            ValidateResult {
                valid: false,
                errors,
            },
            "Validation failed",
        );
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
    }

    let result = state.backend.execute(&name, &req.data).await?;
    let mode = req.view.unwrap_or(state.settings.output.default_view);
    let rendered = OutputRenderer::render(&result, mode);
    let html = rendered.view.to_html();

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(SubmitResult {
            result,
            rendered,
            html,
        })),
    )
        .into_response())
}

// ============================================================================
// Output Handlers
// ============================================================================

/// POST /api/output/render - Render a result payload
pub async fn render_output(
    State(state): State<ApiState>,
    Json(req): Json<RenderRequest>,
) -> ApiResult<RenderResult> {
    let mode = req.view.unwrap_or(state.settings.output.default_view);
    let rendered = OutputRenderer::render(&req.payload, mode);
    let html = rendered.view.to_html();
    ok(RenderResult { rendered, html })
}

/// POST /api/output/export - Download a result payload as a file
pub async fn export_output(
    State(state): State<ApiState>,
    Json(req): Json<ExportRequest>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = req.format.parse()?;
    let file = Exporter::new(&state.settings.output.export_basename).export(&req.payload, format)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.media_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.content,
    )
        .into_response())
}
