use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Settings;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    /// `backend` or `directory`
    pub schema_source: String,
    pub backend_url: String,
}

pub struct HealthHandler {
    settings: Arc<Settings>,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            start_time: std::time::Instant::now(),
        }
    }

    /// Basic health check - returns 200 if server is running
    pub async fn health(&self) -> impl IntoResponse {
        let schema_source = match self.settings.schema.directory {
            Some(_) => "directory",
            None => "backend",
        };
        let status = HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            checks: HealthChecks {
                schema_source: schema_source.to_string(),
                backend_url: self.settings.backend.base_url.clone(),
            },
        };

        (StatusCode::OK, Json(status))
    }

    /// Readiness check - a configured schema directory must exist
    pub async fn ready(&self) -> impl IntoResponse {
        let ready = match &self.settings.schema.directory {
            Some(dir) => tokio::fs::metadata(dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false),
            None => true,
        };

        if ready {
            (StatusCode::OK, Json(serde_json::json!({
                "status": "ready",
                "message": "Server is ready to accept requests"
            })))
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({
                "status": "not_ready",
                "message": "Schema directory is not available"
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let handler = HealthHandler::new(Arc::new(Settings::default()));

        let response = handler.health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_without_schema_directory() {
        let mut settings = Settings::default();
        settings.schema.directory = Some("/definitely/not/here".into());
        let handler = HealthHandler::new(Arc::new(settings));

        let response = handler.ready().await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let handler = HealthHandler::new(Arc::new(Settings::default()));
        let response = handler.ready().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
