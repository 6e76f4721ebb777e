//! Qase REST client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{NewResult, NewRun, TrackerClient};
use crate::config::{ApiToken, QaseConfig};
use crate::error::SyncError;
use crate::labels::ProjectCode;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
struct Envelope<T> {
    result: Option<T>,
}

#[derive(Deserialize)]
struct CreatedRun {
    id: Option<u64>,
}

#[derive(Deserialize)]
struct CreatedResult {
    hash: Option<String>,
}

/// Talks to the Qase v1 API with a `Token` header.
pub struct QaseClient {
    client: Client,
    base_url: String,
    app_url: String,
    api_key: ApiToken,
}

impl QaseClient {
    pub fn new(config: &QaseConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::from_reqwest("qase client", e))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_url: config.app_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");

        let mut request = self
            .client
            .post(&url)
            .header("Token", self.api_key.expose())
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(endpoint, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SyncError::from_reqwest(endpoint, e))?;
        if !status.is_success() {
            return Err(SyncError::Status {
                endpoint,
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|source| SyncError::Decode { endpoint, source })
    }
}

#[async_trait::async_trait]
impl TrackerClient for QaseClient {
    async fn create_run(&self, project: &ProjectCode, run: &NewRun) -> Result<u64, SyncError> {
        const ENDPOINT: &str = "POST /run/{code}";
        let response: Envelope<CreatedRun> = self
            .post_json(ENDPOINT, &format!("/run/{project}"), Some(run))
            .await?;
        response
            .result
            .and_then(|r| r.id)
            .ok_or(SyncError::MissingField {
                endpoint: ENDPOINT,
                field: "result.id",
            })
    }

    async fn create_result(
        &self,
        project: &ProjectCode,
        run_id: u64,
        result: &NewResult,
    ) -> Result<String, SyncError> {
        const ENDPOINT: &str = "POST /result/{code}/{id}";
        let response: Envelope<CreatedResult> = self
            .post_json(ENDPOINT, &format!("/result/{project}/{run_id}"), Some(result))
            .await?;
        response
            .result
            .and_then(|r| r.hash)
            .ok_or(SyncError::MissingField {
                endpoint: ENDPOINT,
                field: "result.hash",
            })
    }

    async fn complete_run(&self, project: &ProjectCode, run_id: u64) -> Result<(), SyncError> {
        let _: serde_json::Value = self
            .post_json::<(), _>(
                "POST /result/{code}/{id}/complete",
                &format!("/result/{project}/{run_id}/complete"),
                None,
            )
            .await?;
        Ok(())
    }

    fn run_url(&self, project: &ProjectCode, run_id: u64) -> Option<String> {
        Some(format!("{}/run/{project}/dashboard/{run_id}", self.app_url))
    }
}
