//! Client for the workflow backend's execution and listing endpoints

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BackendSettings;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// Run a workflow on a collected data tree and return its result payload
    async fn execute(&self, name: &str, data: &Value) -> Result<Value, ExecutionError>;

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, ExecutionError>;
}

pub struct BackendClient {
    client: reqwest::Client,
    settings: BackendSettings,
}

impl BackendClient {
    pub fn new(settings: BackendSettings) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl WorkflowBackend for BackendClient {
    /// POST the collected data tree and return the result payload verbatim
    async fn execute(&self, name: &str, data: &Value) -> Result<Value, ExecutionError> {
        let url = self.settings.endpoint(&self.settings.execute_path, name);
        info!(workflow = %name, "Executing workflow");

        let response = self.client.post(&url).json(data).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExecutionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(workflow = %name, bytes = body.len(), "Workflow finished");

        // Plain-text results are returned as a string payload
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, ExecutionError> {
        let url = self.settings.endpoint(&self.settings.workflows_path, "");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let listing: Value = response.json().await?;
        parse_workflow_listing(&listing).ok_or_else(|| ExecutionError::InvalidResponse {
            url,
            reason: "expected a list of workflows".to_string(),
        })
    }
}

/// Accepts `["a", "b"]`, `[{"name": ..., "description": ...}]`, either of
/// those under a `workflows` key, or a `{name: description}` map
pub fn parse_workflow_listing(listing: &Value) -> Option<Vec<WorkflowSummary>> {
    match listing {
        Value::Array(items) => items.iter().map(parse_summary).collect(),
        Value::Object(map) => match map.get("workflows") {
            Some(inner) => parse_workflow_listing(inner),
            None => Some(
                map.iter()
                    .map(|(name, description)| WorkflowSummary {
                        name: name.clone(),
                        description: description.as_str().map(str::to_string),
                    })
                    .collect(),
            ),
        },
        _ => None,
    }
}

fn parse_summary(item: &Value) -> Option<WorkflowSummary> {
    match item {
        Value::String(name) => Some(WorkflowSummary {
            name: name.clone(),
            description: None,
        }),
        Value::Object(_) => serde_json::from_value(item.clone()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_shapes() {
        let expected = vec![
            WorkflowSummary { name: "a".into(), description: None },
            WorkflowSummary { name: "b".into(), description: Some("Bee".into()) },
        ];
        assert_eq!(
            parse_workflow_listing(&json!(["a", { "name": "b", "description": "Bee" }])),
            Some(expected.clone())
        );
        assert_eq!(
            parse_workflow_listing(&json!({ "workflows": [{ "name": "a" }, { "name": "b", "description": "Bee" }] })),
            Some(expected.clone())
        );
        assert_eq!(
            parse_workflow_listing(&json!({ "a": null, "b": "Bee" })),
            Some(expected)
        );
        assert_eq!(parse_workflow_listing(&json!([1])), None);
        assert_eq!(parse_workflow_listing(&json!("nope")), None);
    }
}
