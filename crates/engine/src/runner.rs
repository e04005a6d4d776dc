//! Campaign runner — walks the drip schedule over the contact population,
//! consulting the evaluator per (contact, step) pair and recording confirmed
//! sends in the tracking ledger.
//!
//! Execution is strictly sequential: one contact, one step, one delivery
//! call at a time, with explicit delays to respect provider rate limits.
//! A failed delivery is not retried within the run; the pair stays pending
//! and is re-evaluated on the next invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use drip_core::channels::DeliveryChannel;
use drip_core::config::PacingConfig;
use drip_core::error::{DripError, DripResult};
use drip_core::schedule::{DripSchedule, DripStep};
use drip_core::types::Contact;
use drip_ledger::TrackingLedger;

use crate::evaluator::{evaluate, Decision};

/// Which part of the schedule a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Every step, in ascending day-offset order.
    Full,
    /// Exactly one named step. The already-sent guard stays active.
    SingleStep(String),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Evaluate everything, deliver and record nothing.
    pub dry_run: bool,
    /// Testing/backfill override for the elapsed-day calculation. Bypasses
    /// the already-sent guard; see [`evaluate`].
    pub simulated_days: Option<u32>,
    /// Operator address fronted in the iteration order so its outcome is
    /// visible before the bulk of the run.
    pub smoke_test_address: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Full,
            dry_run: false,
            simulated_days: None,
            smoke_test_address: None,
        }
    }
}

/// Per-step sent/skipped counters.
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub step_name: String,
    /// Deliveries confirmed by the provider (or that would happen, in
    /// dry-run mode).
    pub sent: u64,
    pub skipped_already_sent: u64,
    pub skipped_not_due: u64,
    pub failed: u64,
}

impl StepSummary {
    fn new(step_name: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            sent: 0,
            skipped_already_sent: 0,
            skipped_not_due: 0,
            failed: 0,
        }
    }
}

/// One delivery that failed; retried on the next invocation of the runner.
#[derive(Debug, Clone)]
pub struct FailedSend {
    pub step_name: String,
    pub address: String,
    pub error: String,
}

/// Outcome of a full or single-step run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub steps: Vec<StepSummary>,
    pub failures: Vec<FailedSend>,
}

impl RunReport {
    pub fn total_sent(&self) -> u64 {
        self.steps.iter().map(|s| s.sent).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.steps
            .iter()
            .map(|s| s.skipped_already_sent + s.skipped_not_due)
            .sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.steps.iter().map(|s| s.failed).sum()
    }
}

pub struct CampaignRunner<'a> {
    schedule: &'a DripSchedule,
    delivery: &'a dyn DeliveryChannel,
    ledger: &'a mut TrackingLedger,
    ledger_path: PathBuf,
    pacing: PacingConfig,
    options: RunOptions,
}

impl<'a> CampaignRunner<'a> {
    pub fn new(
        schedule: &'a DripSchedule,
        delivery: &'a dyn DeliveryChannel,
        ledger: &'a mut TrackingLedger,
        ledger_path: &Path,
        pacing: PacingConfig,
        options: RunOptions,
    ) -> Self {
        Self {
            schedule,
            delivery,
            ledger,
            ledger_path: ledger_path.to_path_buf(),
            pacing,
            options,
        }
    }

    /// Runs the campaign over the given contacts and reports per-step and
    /// per-run counts. Reported in every mode, dry-run included, so an
    /// operator can verify expected behavior before a real run.
    pub async fn run(&mut self, contacts: &[Contact]) -> DripResult<RunReport> {
        let steps: Vec<&DripStep> = match &self.options.mode {
            RunMode::Full => self.schedule.steps().iter().collect(),
            RunMode::SingleStep(name) => {
                let step = self.schedule.step(name).ok_or_else(|| {
                    DripError::Config(format!("unknown step '{name}' in schedule"))
                })?;
                vec![step]
            }
        };

        let run_id = Uuid::new_v4();
        let contacts = self.ordered_contacts(contacts);
        info!(
            run_id = %run_id,
            steps = steps.len(),
            contacts = contacts.len(),
            dry_run = self.options.dry_run,
            simulated_days = ?self.options.simulated_days,
            "starting campaign run"
        );

        let now = Utc::now();
        let mut report = RunReport {
            run_id,
            dry_run: self.options.dry_run,
            steps: Vec::with_capacity(steps.len()),
            failures: Vec::new(),
        };

        for step in steps {
            let mut summary = StepSummary::new(&step.name);

            for contact in &contacts {
                match evaluate(contact, step, self.ledger, now, self.options.simulated_days) {
                    Decision::SkipAlreadySent => summary.skipped_already_sent += 1,
                    Decision::SkipNotDue => summary.skipped_not_due += 1,
                    Decision::Send => {
                        if self.options.dry_run {
                            info!(
                                run_id = %run_id,
                                step = %step.name,
                                address = %contact.address,
                                "dry-run: would send"
                            );
                            summary.sent += 1;
                        } else {
                            self.deliver_one(run_id, step, contact, &mut summary, &mut report)
                                .await;
                        }
                    }
                }
            }

            info!(
                run_id = %run_id,
                step = %step.name,
                sent = summary.sent,
                skipped_already_sent = summary.skipped_already_sent,
                skipped_not_due = summary.skipped_not_due,
                failed = summary.failed,
                "step complete"
            );
            report.steps.push(summary);
        }

        info!(
            run_id = %run_id,
            sent = report.total_sent(),
            skipped = report.total_skipped(),
            failed = report.total_failed(),
            dry_run = report.dry_run,
            "campaign run complete"
        );
        for failure in &report.failures {
            warn!(
                run_id = %run_id,
                step = %failure.step_name,
                address = %failure.address,
                error = %failure.error,
                "delivery failed; will retry on next run"
            );
        }

        Ok(report)
    }

    /// Delivers one step to one contact and records it on success. Failures
    /// are counted, listed, and left unrecorded so the next run retries them.
    async fn deliver_one(
        &mut self,
        run_id: Uuid,
        step: &DripStep,
        contact: &Contact,
        summary: &mut StepSummary,
        report: &mut RunReport,
    ) {
        tokio::time::sleep(Duration::from_millis(self.pacing.send_delay_ms)).await;

        let error = match self.delivery.deliver(step, contact).await {
            Ok(outcome) if outcome.success => {
                metrics::counter!("drip.emails_sent", "step" => step.name.clone()).increment(1);
                info!(
                    run_id = %run_id,
                    step = %step.name,
                    address = %contact.address,
                    message_id = ?outcome.provider_message_id,
                    "sent"
                );
                self.ledger
                    .record_and_persist(&self.ledger_path, &contact.address, &step.name, Utc::now());
                summary.sent += 1;
                return;
            }
            Ok(outcome) => outcome.error.unwrap_or_else(|| "unknown provider failure".to_string()),
            Err(e) => e.to_string(),
        };

        metrics::counter!("drip.emails_failed", "step" => step.name.clone()).increment(1);
        summary.failed += 1;
        report.failures.push(FailedSend {
            step_name: step.name.clone(),
            address: contact.address.clone(),
            error,
        });
    }

    /// Iteration order for the run: the smoke-test contact, if configured
    /// and present in the population, moves to the front. Everything else
    /// keeps provider order.
    fn ordered_contacts(&self, contacts: &[Contact]) -> Vec<Contact> {
        let mut ordered: Vec<Contact> = contacts.to_vec();
        if let Some(smoke) = &self.options.smoke_test_address {
            match ordered.iter().position(|c| &c.address == smoke) {
                Some(pos) => {
                    let contact = ordered.remove(pos);
                    info!(address = %contact.address, "smoke-test contact fronted");
                    ordered.insert(0, contact);
                }
                None => {
                    info!(address = %smoke, "smoke-test address not in contact population, skipping");
                }
            }
        }
        ordered
    }
}
