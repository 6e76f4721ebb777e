//! Testim REST client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ExecutionDetail, ExecutionSummary, RunnerClient, TestDefinition};
use crate::config::{ApiToken, TestimConfig};
use crate::error::SyncError;

const LIST_TESTS_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_EXECUTIONS_TIMEOUT: Duration = Duration::from_secs(5);
const EXECUTION_DETAIL_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
struct TestsResponse {
    #[serde(default)]
    tests: Vec<TestDefinition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionsResponse {
    #[serde(default)]
    executions: Vec<ExecutionSummary>,
    #[serde(default)]
    total_records: Option<u64>,
}

#[derive(Deserialize)]
struct ExecutionDetailResponse {
    execution: Option<ExecutionDetail>,
}

/// Talks to the Testim public API with a bearer token.
pub struct TestimClient {
    client: Client,
    base_url: String,
    api_key: ApiToken,
}

impl TestimClient {
    pub fn new(config: &TestimConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .build()
            .map_err(|e| SyncError::from_reqwest("testim client", e))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        timeout: Duration,
    ) -> Result<T, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .header("Accept", "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::from_reqwest(endpoint, e))?;
        if !status.is_success() {
            return Err(SyncError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| SyncError::Decode { endpoint, source })
    }
}

#[async_trait::async_trait]
impl RunnerClient for TestimClient {
    async fn list_tests(&self) -> Result<Vec<TestDefinition>, SyncError> {
        let response: TestsResponse = self
            .get_json("GET /tests", "/tests", LIST_TESTS_TIMEOUT)
            .await?;
        Ok(response.tests)
    }

    async fn list_executions_today(&self) -> Result<Vec<ExecutionSummary>, SyncError> {
        let response: ExecutionsResponse = self
            .get_json(
                "GET /runs/executions",
                "/runs/executions",
                LIST_EXECUTIONS_TIMEOUT,
            )
            .await?;
        debug!(
            returned = response.executions.len(),
            total = ?response.total_records,
            "listed executions"
        );
        Ok(response.executions)
    }

    async fn execution_detail(&self, execution_id: &str) -> Result<ExecutionDetail, SyncError> {
        const ENDPOINT: &str = "GET /v2/runs/executions/{id}";
        let response: ExecutionDetailResponse = self
            .get_json(
                ENDPOINT,
                &format!("/v2/runs/executions/{execution_id}"),
                EXECUTION_DETAIL_TIMEOUT,
            )
            .await?;
        response.execution.ok_or(SyncError::MissingField {
            endpoint: ENDPOINT,
            field: "execution",
        })
    }
}
