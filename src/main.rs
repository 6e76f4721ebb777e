use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use testim_qase_sync::config::{parse_flag, ApiToken, SyncConfig};

/// A leap year of hourly ticks is the longest preview we print.
const MAX_PREVIEW_HOURS: u64 = 366 * 24;

#[derive(Parser)]
#[command(
    name = "testim-qase-sync",
    about = "Reports finished Testim executions as Qase test runs",
    version,
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Overrides {
    /// TOML config file
    #[arg(long, env = "SYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Testim API key
    #[arg(long, env = "TESTIM_APIKEY", hide_env_values = true, global = true)]
    testim_api_key: Option<String>,

    /// Qase API token
    #[arg(long, env = "QASE_APIKEY", hide_env_values = true, global = true)]
    qase_api_key: Option<String>,

    /// Run one sync immediately at startup
    #[arg(long, env = "RUN_ONCE_ON_START", value_parser = parse_flag, global = true)]
    run_once_on_start: Option<bool>,

    /// Cron expression replacing the default schedule
    #[arg(long, env = "OVERRIDE_CRON_SCHEDULE", global = true)]
    cron: Option<String>,
}

impl Overrides {
    /// Defaults, then the config file, then flags and environment.
    fn into_config(self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load(path)?,
            None => SyncConfig::default(),
        };

        if let Some(key) = self.testim_api_key {
            config.testim.api_key = ApiToken::new(key);
        }
        if let Some(key) = self.qase_api_key {
            config.qase.api_key = ApiToken::new(key);
        }
        if let Some(run_on_start) = self.run_once_on_start {
            config.schedule.run_on_start = run_on_start;
        }
        if let Some(cron) = self.cron {
            tracing::info!(%cron, "Overriding the default cron schedule");
            config.schedule.cron = cron;
        }

        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (startup sync + cron schedule)
    Serve,

    /// Run a single sync pass and exit
    Sync {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Preview when syncs will run in the next N hours
    SchedulePreview {
        /// Hours to preview
        #[arg(
            long,
            default_value = "24",
            value_parser = clap::value_parser!(u64).range(1..=MAX_PREVIEW_HOURS)
        )]
        hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Hello from the Testim to Qase test run reporter");
    let config = cli.overrides.into_config()?;

    match cli.command {
        Commands::Serve => {
            testim_qase_sync::serve(config).await?;
        }
        Commands::Sync { json } => {
            let report = testim_qase_sync::sync_once(&config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\nTestim -> Qase sync");
                println!("{:<22} : {:?}", "Outcome", report.outcome);
                println!("{:<22} : {}", "Executions seen", report.executions_seen);
                println!("{:<22} : {}", "Already processed", report.skipped_processed);
                println!("{:<22} : {}", "Still running", report.skipped_running);
                println!("{:<22} : {}", "Not linked", report.skipped_unlinked);
                println!("{:<22} : {}", "Deferred (errors)", report.skipped_failed);
                println!("{:<22} : {}", "Runs created", report.runs_created);
                println!("{:<22} : {}", "Results submitted", report.results_submitted);
                println!("{:<22} : {}", "Results failed", report.results_failed);
                println!("{:<22} : {}", "Ambiguous tests", report.tests_ambiguous);
                println!();
            }
        }
        Commands::SchedulePreview { hours } => {
            let schedule = config.schedule()?;
            let preview = schedule.preview(&chrono::Utc::now(), hours)?;
            if preview.is_empty() {
                println!("No syncs scheduled in the next {} hours.", hours);
            } else {
                println!("Upcoming syncs (next {} hours, cron '{}'):", hours, schedule.expression());
                for time in preview {
                    println!("{}", time.to_rfc3339());
                }
            }
        }
    }

    Ok(())
}
