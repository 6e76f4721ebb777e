//! Qase side: the records we create and the client that creates them.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::error::SyncError;
use crate::labels::ProjectCode;
use crate::runner::{ExecutionDetail, TestResult};

pub mod qase;

pub use self::qase::QaseClient;

/// Layout Qase expects for `start_time`.
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `time` as `YYYY-MM-DD HH:mm:ss` in the given offset.
pub fn format_start_time(time: &DateTime<Utc>, offset: &FixedOffset) -> String {
    time.with_timezone(offset).format(START_TIME_FORMAT).to_string()
}

/// Body of `POST /run/{code}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRun {
    pub title: String,
    pub description: String,
    pub is_autotest: bool,
    pub start_time: String,
    pub cases: Vec<u64>,
}

impl NewRun {
    /// Run record mirroring one Testim execution.
    pub fn for_execution(detail: &ExecutionDetail, cases: Vec<u64>, offset: &FixedOffset) -> Self {
        Self {
            title: format!(
                "[Testim | {} | {}] - {}",
                detail.source, detail.branch, detail.execution
            ),
            description: format!(
                "[Click this link to jump to the execution page in Testim]({})",
                detail.link
            ),
            is_autotest: true,
            start_time: format_start_time(&detail.start_time, offset),
            cases,
        }
    }
}

/// Body of `POST /result/{code}/{run_id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewResult {
    pub case_id: u64,
    pub status: String,
    pub time_ms: u64,
}

impl NewResult {
    pub fn from_test_result(case_id: u64, result: &TestResult) -> Self {
        Self {
            case_id,
            status: result.execution_status.as_tracker_status(),
            time_ms: result.duration_ms(),
        }
    }
}

/// Write access to Qase.
#[async_trait::async_trait]
pub trait TrackerClient: Send + Sync {
    /// Create a run and return its id.
    async fn create_run(&self, project: &ProjectCode, run: &NewRun) -> Result<u64, SyncError>;

    /// Record one case result in a run and return the result hash.
    async fn create_result(
        &self,
        project: &ProjectCode,
        run_id: u64,
        result: &NewResult,
    ) -> Result<String, SyncError>;

    /// Mark a run as complete.
    async fn complete_run(&self, project: &ProjectCode, run_id: u64) -> Result<(), SyncError>;

    /// Web link to a run's dashboard, for log lines.
    fn run_url(&self, _project: &ProjectCode, _run_id: u64) -> Option<String> {
        None
    }
}
