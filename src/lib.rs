//! # Prompt Tuner
//!
//! Schema-driven input forms and result views for backend workflows.
//!
//! Each workflow publishes a JSON Schema describing its input. Prompt Tuner
//! turns that schema into a form, collects and validates what the user
//! enters, forwards the data to the workflow backend, and renders whatever
//! comes back as tables, cards or raw JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prompt_tuner::domain::form::{FieldModelBuilder, Validator};
//! use prompt_tuner::domain::schema::SchemaDocument;
//! use serde_json::json;
//!
//! fn main() -> anyhow::Result<()> {
//!     let document = SchemaDocument::from_value(&json!({
//!         "$defs": { "Root": {
//!             "type": "object",
//!             "properties": { "topic": { "type": "string" } },
//!             "required": ["topic"]
//!         } }
//!     }))?;
//!     let model = FieldModelBuilder::new(&document).build_model(None)?;
//!     let errors = Validator::validate(&model, &json!({}));
//!     assert_eq!(errors.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: schema parsing, field model, forms, validation, output views
//! - **Adapters**: schema sources and cache, backend client, HTTP handlers
//! - **Config**: layered settings

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;

use crate::adapters::api_handler::{self, ApiState};
use crate::adapters::health_handler::HealthHandler;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `state` - Settings, schema loader and workflow backend shared by handlers
///
/// # Returns
///
/// Configured Axum Router
pub fn create_app(state: ApiState) -> Router {
    let health_handler = Arc::new(HealthHandler::new(state.settings.clone()));

    let health_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }));

    let api_router = Router::new()
        .route("/workflows", get(api_handler::list_workflows))
        .route("/workflows/:name/form", get(api_handler::get_form))
        .route("/workflows/:name/collect", post(api_handler::collect_form))
        .route("/workflows/:name/validate", post(api_handler::validate_data))
        .route("/workflows/:name/submit", post(api_handler::submit))
        .route("/output/render", post(api_handler::render_output))
        .route("/output/export", post(api_handler::export_output))
        .with_state(state);

    health_router.nest("/api", api_router).layer(
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
