//! HTTP adapter for the control-plane API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use crate::control_plane::{ControlPlane, ServiceView};
use crate::errors::OrchestratorError;

/// Control-plane client speaking the REST API
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
}

impl HttpControlPlane {
    /// Create a new control-plane client
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, OrchestratorError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map non-success statuses onto the error taxonomy. Throttling and
    /// unavailability keep their textual signature so the retry harness
    /// recognizes them as transient.
    async fn check(response: Response, context: &str) -> Result<Response, OrchestratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("{} failed: {} - {}", context, status, body);

        Err(match status {
            StatusCode::NOT_FOUND => OrchestratorError::NotFound(format!("{}: {}", context, body)),
            StatusCode::TOO_MANY_REQUESTS => {
                OrchestratorError::ControlPlane(format!("Throttling: {}: {}", context, body))
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                OrchestratorError::ControlPlane(format!("ServiceUnavailable: {}: {}", context, body))
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                OrchestratorError::ControlPlane(format!("RequestTimeout: {}: {}", context, body))
            }
            _ => OrchestratorError::ControlPlane(format!("{}: {} - {}", context, status, body)),
        })
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn register_task_definition(&self, payload: &str) -> Result<(), OrchestratorError> {
        let url = self.url("/task-definitions");
        debug!("POST {}", url);

        let body = serde_json::json!({ "task_definition": payload });
        let response = self.client.post(&url).json(&body).send().await?;
        Self::check(response, "register task definition").await?;
        Ok(())
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> Result<(), OrchestratorError> {
        let url = self.url(&format!("/clusters/{}/services/{}", cluster, service));
        debug!("PUT {}", url);

        let body = serde_json::json!({
            "task_definition": task_definition,
            "force_new_deployment": true,
        });
        let response = self.client.put(&url).json(&body).send().await?;
        Self::check(response, "update service").await?;
        Ok(())
    }

    async fn create_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &str,
        weight: u32,
    ) -> Result<(), OrchestratorError> {
        let url = self.url(&format!("/clusters/{}/services/{}/task-sets", cluster, service));
        debug!("POST {} (weight: {}%)", url, weight);

        let body = serde_json::json!({
            "task_definition": task_definition,
            "weight": weight,
        });
        let response = self.client.post(&url).json(&body).send().await?;
        Self::check(response, "create task set").await?;
        Ok(())
    }

    async fn delete_task_set(
        &self,
        cluster: &str,
        service: &str,
        task_set_id: &str,
    ) -> Result<(), OrchestratorError> {
        let url = self.url(&format!(
            "/clusters/{}/services/{}/task-sets/{}?force=true",
            cluster, service, task_set_id
        ));
        debug!("DELETE {}", url);

        let response = self.client.delete(&url).send().await?;
        Self::check(response, "delete task set").await?;
        Ok(())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceView, OrchestratorError> {
        let url = self.url(&format!("/clusters/{}/services/{}", cluster, service));
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let response = Self::check(response, "describe service").await?;
        let view = response.json().await?;
        Ok(view)
    }

    async fn previous_task_definition(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<String, OrchestratorError> {
        let url = self.url(&format!(
            "/clusters/{}/services/{}/task-definitions/previous",
            cluster, service
        ));
        debug!("GET {}", url);

        #[derive(Deserialize)]
        struct PreviousTaskDefinition {
            task_definition: String,
        }

        let response = self.client.get(&url).send().await?;
        let response = Self::check(response, "previous task definition").await?;
        let body: PreviousTaskDefinition = response.json().await?;
        Ok(body.task_definition)
    }

    async fn shift_traffic(
        &self,
        cluster: &str,
        service: &str,
        new_weight: u32,
        old_weight: u32,
    ) -> Result<(), OrchestratorError> {
        let url = self.url(&format!("/clusters/{}/services/{}/traffic", cluster, service));
        debug!("PUT {} (new: {}%, old: {}%)", url, new_weight, old_weight);

        let body = serde_json::json!({
            "new_weight": new_weight,
            "old_weight": old_weight,
        });
        let response = self.client.put(&url).json(&body).send().await?;
        Self::check(response, "shift traffic").await?;
        Ok(())
    }
}
