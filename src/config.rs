//! TOML configuration for the sync daemon.
//!
//! Layering, lowest precedence first: compiled-in defaults, an optional TOML
//! file, then CLI flags and environment variables applied by `main`.
//! [`SyncConfig::validate`] runs once at startup; business logic never reads
//! the environment itself.

use std::fmt;
use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::scheduler::SyncSchedule;

/// Hourly from 7:00 to 20:59, Monday through Friday (seconds field first).
pub const DEFAULT_CRON_SCHEDULE: &str = "0 0 7-20 * * Mon-Fri";

pub const DEFAULT_TESTIM_BASE_URL: &str = "https://api.testim.io";
pub const DEFAULT_QASE_BASE_URL: &str = "https://api.qase.io/v1";
pub const DEFAULT_QASE_APP_URL: &str = "https://app.qase.io";

/// An API key. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ApiToken(<unset>)")
        } else {
            f.write_str("ApiToken(***)")
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration handed to the engine and the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub testim: TestimConfig,
    #[serde(default)]
    pub qase: QaseConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

impl SyncConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "loaded sync configuration");
        Ok(config)
    }

    /// Check everything that must hold before scheduling starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.testim.api_key.is_empty() {
            return Err(ConfigError::MissingToken("TESTIM_APIKEY"));
        }
        if self.qase.api_key.is_empty() {
            return Err(ConfigError::MissingToken("QASE_APIKEY"));
        }
        self.reporting.offset()?;
        self.schedule()?;
        Ok(())
    }

    /// Parsed cron schedule in the reporting offset.
    pub fn schedule(&self) -> Result<SyncSchedule, ConfigError> {
        SyncSchedule::parse(&self.schedule.cron, self.reporting.offset()?)
    }
}

// ---------------------------------------------------------------------------
// Testim
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestimConfig {
    /// Bearer token (`TESTIM_APIKEY`).
    pub api_key: ApiToken,
    pub base_url: String,
}

impl Default for TestimConfig {
    fn default() -> Self {
        Self {
            api_key: ApiToken::default(),
            base_url: DEFAULT_TESTIM_BASE_URL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Qase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaseConfig {
    /// Value of the `Token` header (`QASE_APIKEY`).
    pub api_key: ApiToken,
    pub base_url: String,
    /// Web UI root, used for dashboard links in logs.
    pub app_url: String,
}

impl Default for QaseConfig {
    fn default() -> Self {
        Self {
            api_key: ApiToken::default(),
            base_url: DEFAULT_QASE_BASE_URL.to_string(),
            app_url: DEFAULT_QASE_APP_URL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 5-field or seconds-first 6/7-field cron expression.
    pub cron: String,
    /// Run one pass immediately at startup.
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: DEFAULT_CRON_SCHEDULE.to_string(),
            run_on_start: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Offset from UTC used for run start times and for the cron schedule.
    pub utc_offset_minutes: i32,
    /// Mark each Qase run complete once its results are submitted.
    pub complete_runs: bool,
}

impl ReportingConfig {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or(ConfigError::InvalidOffset(self.utc_offset_minutes))
    }
}

/// Parse a boolean flag the way `RUN_ONCE_ON_START` is usually written.
pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected true/false, got '{other}'")),
    }
}
