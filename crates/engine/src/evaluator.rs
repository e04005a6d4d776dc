//! Eligibility evaluator — pure decision function over one (contact, step)
//! pair. No I/O, no clock access: the caller supplies `now` and the ledger.

use chrono::{DateTime, Utc};

use drip_core::schedule::DripStep;
use drip_core::types::Contact;
use drip_ledger::TrackingLedger;

/// What the runner should do for one contact and one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Send,
    SkipAlreadySent,
    SkipNotDue,
}

/// Decides whether `step` is due for `contact`.
///
/// The already-sent guard runs only when no simulated-days override is
/// present: normal runs are idempotent, while an override deliberately
/// bypasses the guard so operators can re-trigger a step for testing or
/// backfill. That bypass can double-send; it is an intentional affordance,
/// not a safe operation.
///
/// A contact without a signup time counts as having signed up `now`, so it
/// is eligible only for steps with a zero day offset.
pub fn evaluate(
    contact: &Contact,
    step: &DripStep,
    ledger: &TrackingLedger,
    now: DateTime<Utc>,
    simulated_days: Option<u32>,
) -> Decision {
    if simulated_days.is_none() && ledger.has_sent(&contact.address, &step.name) {
        return Decision::SkipAlreadySent;
    }

    let elapsed_days = match simulated_days {
        Some(days) => i64::from(days),
        None => {
            let signup = contact.signup_time.unwrap_or(now);
            (now - signup).num_days()
        }
    };

    if elapsed_days < i64::from(step.day_offset) {
        Decision::SkipNotDue
    } else {
        Decision::Send
    }
}
