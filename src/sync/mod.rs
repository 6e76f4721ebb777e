//! Reconciliation of finished Testim executions into Qase runs.
//!
//! One call to [`Reconciler::synchronize`] is one pass: fetch tests and
//! today's executions, then handle each execution strictly in order. An
//! execution is remembered as processed as soon as its Qase run exists, so a
//! run is created at most once per process lifetime even when some of its
//! results fail to submit.
//!
//! Failures are isolated per execution: whatever goes wrong while handling
//! one execution is logged and the pass moves on to the next one.

pub mod processed;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::labels::{self, LabelError, ProjectCode};
use crate::runner::{ExecutionSummary, RunnerClient, TestDefinition, TestimClient};
use crate::tracker::{NewResult, NewRun, QaseClient, TrackerClient};

pub use self::processed::{InMemoryProcessed, ProcessedStore};

/// Knobs that shape what gets sent to Qase.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Offset used to render run start times.
    pub offset: FixedOffset,
    /// Call the run-completion endpoint after submitting results.
    pub complete_runs: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            complete_runs: false,
        }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    #[default]
    Completed,
    /// Test list empty or unavailable; nothing was touched.
    NoTests,
    /// Execution list empty or unavailable; nothing was touched.
    NoExecutions,
    /// Another pass was still in flight.
    AlreadyRunning,
}

/// Counters describing one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub executions_seen: usize,
    pub skipped_processed: usize,
    pub skipped_running: usize,
    pub skipped_unlinked: usize,
    /// Detail missing or empty, or run creation failed. Retried next pass.
    pub skipped_failed: usize,
    pub runs_created: usize,
    pub results_submitted: usize,
    pub results_failed: usize,
    pub tests_ambiguous: usize,
}

impl PassReport {
    fn ended(outcome: PassOutcome) -> Self {
        Self {
            outcome,
            ..Self::default()
        }
    }
}

/// Why an eligible execution was left for a later pass.
#[derive(Debug)]
enum Deferred {
    DetailUnavailable(SyncError),
    NoTestResults,
    RunNotCreated(SyncError),
}

#[derive(Debug, Default)]
struct Submission {
    submitted: usize,
    failed: usize,
    ambiguous: usize,
}

/// Clears the in-flight flag when a pass ends, including on panic.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The sync engine. Owns its processed-execution store.
pub struct Reconciler {
    runner: Arc<dyn RunnerClient>,
    tracker: Arc<dyn TrackerClient>,
    processed: Arc<dyn ProcessedStore>,
    options: ReconcileOptions,
    in_flight: AtomicBool,
}

impl Reconciler {
    pub fn new(
        runner: Arc<dyn RunnerClient>,
        tracker: Arc<dyn TrackerClient>,
        processed: Arc<dyn ProcessedStore>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            runner,
            tracker,
            processed,
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Engine wired to the real Testim and Qase APIs with an in-memory store.
    pub fn from_config(config: &SyncConfig) -> anyhow::Result<Self> {
        let runner = TestimClient::new(&config.testim)?;
        let tracker = QaseClient::new(&config.qase)?;
        let options = ReconcileOptions {
            offset: config.reporting.offset()?,
            complete_runs: config.reporting.complete_runs,
        };
        Ok(Self::new(
            Arc::new(runner),
            Arc::new(tracker),
            Arc::new(InMemoryProcessed::new()),
            options,
        ))
    }

    /// Run one pass. Returns immediately if a pass is already running.
    pub async fn synchronize(&self) -> PassReport {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            warn!("Skipping sync because the previous pass is still running");
            return PassReport::ended(PassOutcome::AlreadyRunning);
        };

        let span = info_span!("sync_pass", pass_id = %uuid::Uuid::new_v4());
        self.run_pass().instrument(span).await
    }

    async fn run_pass(&self) -> PassReport {
        let tests = match self.runner.list_tests().await {
            Ok(tests) if !tests.is_empty() => tests,
            Ok(_) => {
                info!("Skipping sync because there is no information about Testim tests");
                return PassReport::ended(PassOutcome::NoTests);
            }
            Err(e) => {
                error!(error = %e, "Skipping sync because Testim tests could not be listed");
                return PassReport::ended(PassOutcome::NoTests);
            }
        };

        let executions = match self.runner.list_executions_today().await {
            Ok(executions) if !executions.is_empty() => executions,
            Ok(_) => {
                info!("Skipping sync because there are no Testim executions today");
                return PassReport::ended(PassOutcome::NoExecutions);
            }
            Err(e) => {
                error!(error = %e, "Skipping sync because Testim executions could not be listed");
                return PassReport::ended(PassOutcome::NoExecutions);
            }
        };

        info!(count = executions.len(), "Found Testim executions for today");

        let mut report = PassReport::default();
        for summary in &executions {
            report.executions_seen += 1;
            let execution_id = summary.execution_id.as_str();

            if self.processed.contains(execution_id) {
                info!(%execution_id, "Skipping execution, already processed");
                report.skipped_processed += 1;
                continue;
            }
            if summary.execution_result.is_running() {
                info!(%execution_id, "Skipping execution, still running");
                report.skipped_running += 1;
                continue;
            }
            let Some(project) = labels::extract_project_code(&summary.result_labels) else {
                info!(
                    %execution_id,
                    "Skipping execution, not linked to a Qase project. \
                     Add '--result-label qase/{{projectCode}}' to the Testim CLI command"
                );
                report.skipped_unlinked += 1;
                continue;
            };

            let span = info_span!("execution", %execution_id, %project);
            match self
                .process_execution(summary, &project, &tests)
                .instrument(span)
                .await
            {
                Ok(submission) => {
                    report.runs_created += 1;
                    report.results_submitted += submission.submitted;
                    report.results_failed += submission.failed;
                    report.tests_ambiguous += submission.ambiguous;
                }
                Err(deferred) => {
                    match deferred {
                        Deferred::DetailUnavailable(e) => {
                            warn!(%execution_id, error = %e, "Skipping execution, details could not be fetched");
                        }
                        Deferred::NoTestResults => {
                            warn!(%execution_id, "Skipping execution, details contain no tests");
                        }
                        Deferred::RunNotCreated(e) => {
                            error!(%execution_id, %project, error = %e, "Cannot create test run in Qase");
                        }
                    }
                    report.skipped_failed += 1;
                }
            }
        }

        info!(
            seen = report.executions_seen,
            runs_created = report.runs_created,
            results_submitted = report.results_submitted,
            results_failed = report.results_failed,
            "Sync pass finished"
        );
        report
    }

    async fn process_execution(
        &self,
        summary: &ExecutionSummary,
        project: &ProjectCode,
        tests: &[TestDefinition],
    ) -> Result<Submission, Deferred> {
        let execution_id = summary.execution_id.as_str();
        info!("Processing Testim execution");

        let detail = self
            .runner
            .execution_detail(execution_id)
            .await
            .map_err(Deferred::DetailUnavailable)?;
        if detail.tests.is_empty() {
            return Err(Deferred::NoTestResults);
        }

        let ran: HashSet<&str> = detail.tests.iter().map(|t| t.id.as_str()).collect();
        let tests_in_execution: Vec<&TestDefinition> =
            tests.iter().filter(|t| ran.contains(t.id.as_str())).collect();
        let labelled = tests_in_execution
            .iter()
            .filter(|t| !labels::case_labels(&t.labels, project).is_empty())
            .count();
        info!(
            labelled,
            in_execution = tests_in_execution.len(),
            "Tests in execution linked to Qase cases"
        );

        let links: Vec<(&TestDefinition, Result<Option<u64>, LabelError>)> = tests_in_execution
            .iter()
            .map(|t| (*t, labels::extract_test_case_id(&t.labels, project)))
            .collect();

        // Only cases that will actually receive a result are listed on the run.
        let mut cases = Vec::new();
        for (_, link) in &links {
            if let Ok(Some(case_id)) = link {
                if !cases.contains(case_id) {
                    cases.push(*case_id);
                }
            }
        }

        info!(cases = cases.len(), "Creating test run in Qase");
        let run = NewRun::for_execution(&detail, cases, &self.options.offset);
        let run_id = self
            .tracker
            .create_run(project, &run)
            .await
            .map_err(Deferred::RunNotCreated)?;

        self.processed.add(execution_id);
        match self.tracker.run_url(project, run_id) {
            Some(url) => info!(run_id, %url, "Created test run in Qase"),
            None => info!(run_id, "Created test run in Qase"),
        }

        let mut submission = Submission::default();
        for (test, link) in links {
            let case_id = match link {
                Ok(Some(case_id)) => case_id,
                Ok(None) => continue,
                Err(e) => {
                    warn!(test_id = %test.id, error = %e, "Test must have exactly one label linking it to a Qase case");
                    submission.ambiguous += 1;
                    continue;
                }
            };
            let Some(result) = detail.result_for(&test.id) else {
                continue;
            };

            info!(test_id = %test.id, result_id = ?result.result_id, case_id, "Submitting test result");
            let body = NewResult::from_test_result(case_id, result);
            match self.tracker.create_result(project, run_id, &body).await {
                Ok(hash) => {
                    info!(case_id, run_id, status = %body.status, %hash, "Created test case result in Qase");
                    submission.submitted += 1;
                }
                Err(e) => {
                    error!(case_id, run_id, error = %e, "Cannot create test case result in Qase");
                    submission.failed += 1;
                }
            }
        }

        if self.options.complete_runs {
            match self.tracker.complete_run(project, run_id).await {
                Ok(()) => info!(run_id, "Completed test run in Qase"),
                Err(e) => error!(run_id, error = %e, "Cannot complete test run in Qase"),
            }
        }

        Ok(submission)
    }
}
