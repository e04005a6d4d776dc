//! DripExpress — scheduled, multi-step outbound messaging campaign runner.
//!
//! Entry point: resolves configuration and flags, loads the ledger, fetches
//! the contact population, and hands everything to the campaign runner.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use drip_audience::{ContactSource, ResendClient};
use drip_core::config::AppConfig;
use drip_core::schedule::DripSchedule;
use drip_engine::{CampaignRunner, RunMode, RunOptions};
use drip_ledger::TrackingLedger;

#[derive(Parser, Debug)]
#[command(name = "drip-express")]
#[command(about = "Scheduled drip email campaign runner")]
#[command(version)]
struct Cli {
    /// Evaluate and report every decision without sending or recording
    /// anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Restrict the run to a single named step
    #[arg(long = "email", value_name = "STEP_NAME")]
    email: Option<String>,

    /// Simulated elapsed days since signup (testing/backfill override;
    /// bypasses the already-sent guard)
    #[arg(long = "days", value_name = "N")]
    days: Option<u32>,

    /// Tracking ledger path (overrides config)
    #[arg(long, env = "DRIP_EXPRESS__LEDGER__PATH")]
    ledger: Option<String>,

    /// JSON schedule file (overrides the built-in schedule)
    #[arg(long, env = "DRIP_EXPRESS__SCHEDULE_PATH")]
    schedule: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drip_express=info,drip_engine=info,drip_audience=info,drip_ledger=info,drip_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(ledger) = cli.ledger {
        config.ledger.path = ledger;
    }
    if let Some(schedule) = cli.schedule {
        config.schedule_path = Some(schedule);
    }

    // Missing credentials abort before any network call.
    config.require_credentials()?;

    let schedule = match &config.schedule_path {
        Some(path) => DripSchedule::from_json_file(Path::new(path))
            .with_context(|| format!("loading schedule from {path}"))?,
        None => DripSchedule::builtin(),
    };

    info!(
        steps = schedule.len(),
        ledger = %config.ledger.path,
        dry_run = cli.dry_run,
        "DripExpress starting up"
    );

    let ledger_path = Path::new(&config.ledger.path).to_path_buf();
    let mut ledger = TrackingLedger::load(&ledger_path);

    let client = Arc::new(ResendClient::new(&config.provider));
    let source = ContactSource::new(client.clone(), config.pacing.clone());

    // A listing or pagination failure aborts the run; a partial contact
    // population must not pass as complete.
    let contacts = source
        .fetch_all()
        .await
        .context("fetching contact population")?;

    if contacts.is_empty() {
        info!("no contacts found in any audience, nothing to do");
        return Ok(());
    }

    let options = RunOptions {
        mode: match cli.email {
            Some(step_name) => RunMode::SingleStep(step_name),
            None => RunMode::Full,
        },
        dry_run: cli.dry_run,
        simulated_days: cli.days,
        smoke_test_address: config.smoke_test_address.clone(),
    };

    let mut runner = CampaignRunner::new(
        &schedule,
        client.as_ref(),
        &mut ledger,
        &ledger_path,
        config.pacing.clone(),
        options,
    );

    let report = runner.run(&contacts).await?;

    info!(
        run_id = %report.run_id,
        sent = report.total_sent(),
        skipped = report.total_skipped(),
        failed = report.total_failed(),
        dry_run = report.dry_run,
        "done"
    );

    Ok(())
}
