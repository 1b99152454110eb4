use std::time::Duration;

use serde_json::Value;
use stratus_core::types::AgentCategory;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected response status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Body(String),
}

// ---------------------------------------------------------------------------
// InventoryApi trait
// ---------------------------------------------------------------------------

/// The provider boundary a caching agent fetches through.
///
/// One call lists the current resources of one category in one project
/// (regional categories pass the region). Provider semantics beyond this
/// listing contract are not this crate's concern.
#[async_trait::async_trait]
pub trait InventoryApi: Send + Sync {
    async fn list(
        &self,
        project: &str,
        category: AgentCategory,
        region: Option<&str>,
    ) -> Result<Vec<Value>, ApiError>;
}

// ---------------------------------------------------------------------------
// HttpInventoryApi
// ---------------------------------------------------------------------------

/// Thin HTTP client for an inventory endpoint:
/// `GET {base_url}/projects/{project}/{category}[?region=...]`, expecting a
/// JSON array of resource documents.
pub struct HttpInventoryApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryApi {
    pub fn new(
        base_url: impl Into<String>,
        application_name: &str,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(application_name.to_string())
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait::async_trait]
impl InventoryApi for HttpInventoryApi {
    async fn list(
        &self,
        project: &str,
        category: AgentCategory,
        region: Option<&str>,
    ) -> Result<Vec<Value>, ApiError> {
        let url = format!("{}/projects/{}/{}", self.base_url, project, category);
        let mut request = self.client.get(&url);
        if let Some(region) = region {
            request = request.query(&[("region", region)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| ApiError::Body(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Test stub
// ---------------------------------------------------------------------------
