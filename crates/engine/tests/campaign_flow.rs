//! End-to-end runner flow against a fake delivery channel and a real
//! on-disk ledger.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use drip_core::channels::DeliveryChannel;
use drip_core::config::PacingConfig;
use drip_core::error::DripResult;
use drip_core::schedule::{DripSchedule, DripStep};
use drip_core::types::{Contact, DeliveryOutcome};
use drip_engine::{CampaignRunner, RunMode, RunOptions};
use drip_ledger::TrackingLedger;

/// Records every (step, address) pair it is asked to deliver; addresses in
/// `fail_addresses` report a provider-side failure.
#[derive(Default)]
struct FakeDelivery {
    calls: Mutex<Vec<(String, String)>>,
    fail_addresses: HashSet<String>,
}

impl FakeDelivery {
    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryChannel for FakeDelivery {
    async fn deliver(&self, step: &DripStep, contact: &Contact) -> DripResult<DeliveryOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((step.name.clone(), contact.address.clone()));
        if self.fail_addresses.contains(&contact.address) {
            Ok(DeliveryOutcome::failed("mailbox unavailable"))
        } else {
            Ok(DeliveryOutcome::delivered(format!("msg-{}", contact.address)))
        }
    }
}

fn schedule() -> DripSchedule {
    let step = |name: &str, day_offset: u32| DripStep {
        name: name.to_string(),
        day_offset,
        subject: format!("subject {name}"),
        html: "<p>body</p>".to_string(),
    };
    DripSchedule::new(vec![step("welcome", 0), step("followup", 2), step("deep_dive", 6)])
        .unwrap()
}

fn contact(address: &str, signed_up_days_ago: i64) -> Contact {
    Contact {
        address: address.to_string(),
        display_name: None,
        signup_time: Some(Utc::now() - Duration::days(signed_up_days_ago)),
    }
}

fn ledger_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("ledger.json")
}

async fn run(
    delivery: &FakeDelivery,
    ledger: &mut TrackingLedger,
    path: &std::path::Path,
    options: RunOptions,
    contacts: &[Contact],
) -> drip_engine::RunReport {
    let schedule = schedule();
    let mut runner = CampaignRunner::new(
        &schedule,
        delivery,
        ledger,
        path,
        PacingConfig::immediate(),
        options,
    );
    runner.run(contacts).await.unwrap()
}

#[tokio::test]
async fn test_full_schedule_twice_sends_each_due_step_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let delivery = FakeDelivery::default();
    let contacts = vec![contact("a@x.com", 3)];

    // First run: welcome (day 0) and followup (day 2) are due, deep_dive is not.
    let mut ledger = TrackingLedger::load(&path);
    let report = run(&delivery, &mut ledger, &path, RunOptions::default(), &contacts).await;

    assert_eq!(report.total_sent(), 2);
    assert_eq!(report.total_failed(), 0);
    assert_eq!(
        delivery.calls(),
        vec![
            ("welcome".to_string(), "a@x.com".to_string()),
            ("followup".to_string(), "a@x.com".to_string()),
        ]
    );

    // The ledger survives a restart.
    let mut reloaded = TrackingLedger::load(&path);
    assert_eq!(reloaded.sent_count(), 2);
    assert!(reloaded.has_sent("a@x.com", "welcome"));
    assert!(reloaded.has_sent("a@x.com", "followup"));

    // Second run: nothing sent, two already-sent skips, one not-due skip.
    let report = run(&delivery, &mut reloaded, &path, RunOptions::default(), &contacts).await;
    assert_eq!(report.total_sent(), 0);
    assert_eq!(delivery.calls().len(), 2);

    let by_step: Vec<(u64, u64)> = report
        .steps
        .iter()
        .map(|s| (s.skipped_already_sent, s.skipped_not_due))
        .collect();
    assert_eq!(by_step, vec![(1, 0), (1, 0), (0, 1)]);
}

#[tokio::test]
async fn test_dry_run_has_zero_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let delivery = FakeDelivery::default();
    let contacts = vec![contact("a@x.com", 10), contact("b@x.com", 10)];

    // Seed a persisted ledger so there are pre-run bytes to compare.
    let mut ledger = TrackingLedger::empty();
    ledger.record("a@x.com", "welcome", Utc::now());
    ledger.persist(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };
    let report = run(&delivery, &mut ledger, &path, options, &contacts).await;

    // Every decision is still made and reported...
    assert_eq!(report.total_sent(), 5);
    assert_eq!(report.steps[0].skipped_already_sent, 1);
    // ...but the collaborator was never invoked and the ledger is untouched.
    assert!(delivery.calls().is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_single_step_mode_restricts_to_named_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let delivery = FakeDelivery::default();
    let contacts = vec![contact("a@x.com", 10)];

    let mut ledger = TrackingLedger::load(&path);
    let options = RunOptions {
        mode: RunMode::SingleStep("followup".to_string()),
        ..RunOptions::default()
    };
    let report = run(&delivery, &mut ledger, &path, options.clone(), &contacts).await;

    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].step_name, "followup");
    assert_eq!(report.total_sent(), 1);

    // The already-sent guard stays active in single-step mode.
    let report = run(&delivery, &mut ledger, &path, options, &contacts).await;
    assert_eq!(report.total_sent(), 0);
    assert_eq!(report.steps[0].skipped_already_sent, 1);
}

#[tokio::test]
async fn test_single_step_mode_rejects_unknown_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let delivery = FakeDelivery::default();
    let schedule = schedule();
    let mut ledger = TrackingLedger::empty();

    let mut runner = CampaignRunner::new(
        &schedule,
        &delivery,
        &mut ledger,
        &path,
        PacingConfig::immediate(),
        RunOptions {
            mode: RunMode::SingleStep("no_such_step".to_string()),
            ..RunOptions::default()
        },
    );
    let err = runner.run(&[contact("a@x.com", 1)]).await.unwrap_err();
    assert!(err.to_string().contains("no_such_step"));
    assert!(delivery.calls().is_empty());
}

#[tokio::test]
async fn test_failed_delivery_is_not_recorded_and_retries_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let contacts = vec![contact("bad@x.com", 0), contact("good@x.com", 0)];

    let mut failing = FakeDelivery::default();
    failing.fail_addresses.insert("bad@x.com".to_string());

    let mut ledger = TrackingLedger::load(&path);
    let options = RunOptions {
        mode: RunMode::SingleStep("welcome".to_string()),
        ..RunOptions::default()
    };
    let report = run(&failing, &mut ledger, &path, options.clone(), &contacts).await;

    assert_eq!(report.total_sent(), 1);
    assert_eq!(report.total_failed(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].address, "bad@x.com");
    assert!(!ledger.has_sent("bad@x.com", "welcome"));
    assert!(ledger.has_sent("good@x.com", "welcome"));

    // Next run: the failed pair is evaluated as due again; the confirmed
    // one is skipped.
    let recovered = FakeDelivery::default();
    let report = run(&recovered, &mut ledger, &path, options, &contacts).await;
    assert_eq!(report.total_sent(), 1);
    assert_eq!(
        recovered.calls(),
        vec![("welcome".to_string(), "bad@x.com".to_string())]
    );
}

#[tokio::test]
async fn test_simulated_days_bypasses_ledger_guard() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let delivery = FakeDelivery::default();
    let contacts = vec![contact("a@x.com", 0)];

    let mut ledger = TrackingLedger::empty();
    ledger.record("a@x.com", "welcome", Utc::now());
    ledger.record("a@x.com", "followup", Utc::now());

    let options = RunOptions {
        simulated_days: Some(2),
        ..RunOptions::default()
    };
    let report = run(&delivery, &mut ledger, &path, options, &contacts).await;

    // welcome and followup re-send despite their records; deep_dive (day 6)
    // stays gated by the simulated elapsed days.
    assert_eq!(report.total_sent(), 2);
    assert_eq!(report.steps[2].skipped_not_due, 1);
}

#[tokio::test]
async fn test_smoke_test_contact_goes_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let delivery = FakeDelivery::default();
    let contacts = vec![
        contact("a@x.com", 0),
        contact("b@x.com", 0),
        contact("operator@x.com", 0),
    ];

    let mut ledger = TrackingLedger::empty();
    let options = RunOptions {
        mode: RunMode::SingleStep("welcome".to_string()),
        smoke_test_address: Some("operator@x.com".to_string()),
        ..RunOptions::default()
    };
    run(&delivery, &mut ledger, &path, options, &contacts).await;

    let addresses: Vec<String> = delivery.calls().into_iter().map(|(_, a)| a).collect();
    assert_eq!(addresses, vec!["operator@x.com", "a@x.com", "b@x.com"]);
}
