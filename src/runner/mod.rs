//! Testim side: what an execution and a test look like, and how we fetch them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::SyncError;

pub mod testim;

pub use self::testim::TestimClient;

/// Outcome of an execution or of a single test within it.
///
/// Testim reports these in upper case on the executions list and in title
/// case on execution details; both parse to the same variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Passed,
    Failed,
    Running,
    /// Any status Testim adds that we do not special-case.
    Other(String),
}

impl ExecutionStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ExecutionStatus::Running)
    }

    /// Canonical lower-case form sent to Qase as a result status.
    pub fn as_tracker_status(&self) -> String {
        match self {
            ExecutionStatus::Passed => "passed".to_string(),
            ExecutionStatus::Failed => "failed".to_string(),
            ExecutionStatus::Running => "running".to_string(),
            ExecutionStatus::Other(s) => s.to_lowercase(),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "passed" => ExecutionStatus::Passed,
            "failed" => ExecutionStatus::Failed,
            "running" => ExecutionStatus::Running,
            _ => ExecutionStatus::Other(s.to_string()),
        })
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_tracker_status())
    }
}

impl<'de> Deserialize<'de> for ExecutionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A Testim test as listed by `GET /tests`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestDefinition {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// One entry of `GET /runs/executions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub execution_result: ExecutionStatus,
    #[serde(default)]
    pub result_labels: Vec<String>,
    #[serde(default)]
    pub execution: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_tests: u32,
    #[serde(default)]
    pub failed_count: u32,
}

/// Full execution record from `GET /v2/runs/executions/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetail {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub branch: String,
    /// Display name of the execution.
    #[serde(default)]
    pub execution: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub tests: Vec<TestResult>,
}

impl ExecutionDetail {
    /// Result for the test with `test_id`, if the execution ran it.
    pub fn result_for(&self, test_id: &str) -> Option<&TestResult> {
        self.tests.iter().find(|t| t.id == test_id)
    }
}

/// Outcome of one test inside an execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Matches [`TestDefinition::id`].
    pub id: String,
    pub execution_status: ExecutionStatus,
    /// Milliseconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default)]
    pub test_name: Option<String>,
}

impl TestResult {
    pub fn duration_ms(&self) -> u64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration.round() as u64
        } else {
            0
        }
    }
}

/// Read access to Testim.
#[async_trait::async_trait]
pub trait RunnerClient: Send + Sync {
    /// All tests in the project, with their labels.
    async fn list_tests(&self) -> Result<Vec<TestDefinition>, SyncError>;

    /// Executions Testim reports for today, in its own order.
    async fn list_executions_today(&self) -> Result<Vec<ExecutionSummary>, SyncError>;

    /// Details (including per-test results) of one execution.
    async fn execution_detail(&self, execution_id: &str) -> Result<ExecutionDetail, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_any_case() {
        assert_eq!("PASSED".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Passed);
        assert_eq!("Failed".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Failed);
        assert_eq!("RUNNING".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Running);
        assert_eq!(
            "ABORTED".parse::<ExecutionStatus>().unwrap(),
            ExecutionStatus::Other("ABORTED".to_string())
        );
    }

    #[test]
    fn test_tracker_status_is_lower_case() {
        assert_eq!(ExecutionStatus::Passed.as_tracker_status(), "passed");
        assert_eq!(ExecutionStatus::Other("Skipped".into()).as_tracker_status(), "skipped");
    }

    #[test]
    fn test_parse_execution_summary() {
        let json = r#"{
            "executionId": "E1",
            "executionResult": "PASSED",
            "resultLabels": ["qase/PRJ"],
            "branch": "master",
            "link": "https://app.testim.io/#/project/p/branch/master/runs/suites/E1",
            "startTime": "2024-03-01T08:15:30.000Z",
            "totalTests": 3,
            "failedCount": 0,
            "browser": ["chrome"],
            "turboMode": false
        }"#;

        let summary: ExecutionSummary = serde_json::from_str(json).expect("Parse failed");
        assert_eq!(summary.execution_id, "E1");
        assert_eq!(summary.execution_result, ExecutionStatus::Passed);
        assert_eq!(summary.result_labels, vec!["qase/PRJ"]);
        assert_eq!(summary.total_tests, 3);
    }

    #[test]
    fn test_parse_test_definition_underscore_id() {
        let def: TestDefinition =
            serde_json::from_str(r#"{"_id": "T1", "name": "Login", "labels": ["qase/PRJ-42"]}"#)
                .expect("Parse failed");
        assert_eq!(def.id, "T1");
        assert_eq!(def.labels, vec!["qase/PRJ-42"]);
    }

    #[test]
    fn test_parse_execution_detail() {
        let json = r#"{
            "id": "E1",
            "startTime": "2024-03-01T08:15:30.000Z",
            "source": "cli",
            "branch": "master",
            "execution": "Nightly",
            "link": "https://app.testim.io/x",
            "tests": [
                {"id": "T1", "executionStatus": "Passed", "duration": 120, "resultId": "R1"},
                {"id": "T2", "executionStatus": "Failed", "duration": 99.6}
            ]
        }"#;

        let detail: ExecutionDetail = serde_json::from_str(json).expect("Parse failed");
        assert_eq!(detail.tests.len(), 2);
        assert_eq!(detail.result_for("T1").unwrap().duration_ms(), 120);
        assert_eq!(detail.result_for("T2").unwrap().duration_ms(), 100);
        assert!(detail.result_for("T3").is_none());
    }
}
