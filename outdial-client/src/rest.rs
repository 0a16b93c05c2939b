//! REST implementation of the campaign service surface.

use crate::api::CampaignApi;
use crate::config::ClientConfig;
use crate::wire::{
    RawExecutionPage, RawLaunchResponse, RawOverview, RawRunStatus, RawVerifyResponse,
};
use async_trait::async_trait;
use outdial_core::{
    ApiError, CampaignId, CampaignOverview, ConfigError, ExecutionPage, IdType, OutdialResult,
    RunId, RunProgress, SessionError,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the campaign service.
///
/// The credential is attached to every request via headers built once at
/// construction. Unauthorized responses surface as
/// [`ApiError::Unauthorized`] regardless of endpoint.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> OutdialResult<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: e.to_string(),
            })?;

        let auth_header = build_auth_headers(&config.auth)?;
        if auth_header.is_empty() {
            return Err(SessionError::NoCredential.into());
        }
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(url).headers(self.auth_header.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await.map_err(|e| transport(path, e))?;
        parse_response(path, response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| transport(path, e))?;
        parse_response(path, response).await
    }
}

#[async_trait]
impl CampaignApi for RestClient {
    async fn verify_credential(&self) -> Result<bool, ApiError> {
        let raw: RawVerifyResponse = self
            .get_json::<_, ()>("/api/v1/session/verify", None)
            .await?;
        Ok(raw.normalize())
    }

    async fn launch_run(
        &self,
        campaign_id: CampaignId,
        batch_size: u32,
        throttle_ms: u64,
    ) -> Result<RunId, ApiError> {
        let path = format!("/api/v1/campaigns/{}/runs", campaign_id.as_uuid());
        let body = serde_json::json!({
            "batch_size": batch_size,
            "throttle_ms": throttle_ms,
        });
        let raw: RawLaunchResponse = self.post_json(&path, &body).await?;
        Ok(raw.run_id)
    }

    async fn run_status(&self, run_id: RunId) -> Result<RunProgress, ApiError> {
        let path = format!("/api/v1/runs/{}/status", run_id.as_uuid());
        let raw: RawRunStatus = self.get_json::<_, ()>(&path, None).await?;
        Ok(raw.normalize(run_id))
    }

    async fn campaign_overview(
        &self,
        campaign_id: CampaignId,
    ) -> Result<CampaignOverview, ApiError> {
        let path = format!("/api/v1/campaigns/{}/overview", campaign_id.as_uuid());
        let raw: RawOverview = self.get_json::<_, ()>(&path, None).await?;
        Ok(raw.normalize())
    }

    async fn execution_page(
        &self,
        campaign_id: CampaignId,
        page: u32,
        page_size: u32,
        status_filter: Option<&str>,
    ) -> Result<ExecutionPage, ApiError> {
        let path = format!("/api/v1/campaigns/{}/calls", campaign_id.as_uuid());
        let mut query = vec![
            ("page".to_string(), page.to_string()),
            ("page_size".to_string(), page_size.to_string()),
        ];
        if let Some(filter) = status_filter {
            query.push(("status".to_string(), filter.to_string()));
        }
        let raw: RawExecutionPage = self.get_json(&path, Some(&query)).await?;
        Ok(raw.normalize(page, page_size))
    }
}

fn transport(endpoint: &str, err: reqwest::Error) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    }
}

async fn parse_response<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport(endpoint, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    } else if status.as_u16() == 401 || status.as_u16() == 403 {
        tracing::warn!(endpoint, status = status.as_u16(), "unauthorized response");
        Err(ApiError::Unauthorized {
            endpoint: endpoint.to_string(),
        })
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Unexpected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn build_auth_headers(auth: &crate::config::CredentialConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| ConfigError::InvalidValue {
                field: "auth.api_key",
                reason: e.to_string(),
            })?,
        );
    }
    if let Some(token) = &auth.bearer_token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidValue {
                field: "auth.bearer_token",
                reason: e.to_string(),
            })?,
        );
    }
    Ok(headers)
}

// ============================================================================
// TESTS
// ============================================================================
