//! The drip schedule — the fixed, ordered set of time-gated message steps.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DripError, DripResult};

/// One named message step, gated by days since signup.
///
/// Subject and body are carried opaquely; the runner never composes content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripStep {
    pub name: String,
    pub day_offset: u32,
    pub subject: String,
    pub html: String,
}

/// An ordered sequence of [`DripStep`]s, ascending by `day_offset`.
///
/// Step names are unique across the schedule; together with a contact
/// address they form the idempotency key in the tracking ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripSchedule {
    steps: Vec<DripStep>,
}

impl DripSchedule {
    /// Validates and wraps a step list. Rejects duplicate step names and
    /// day offsets that are not ascending.
    pub fn new(steps: Vec<DripStep>) -> DripResult<Self> {
        for window in steps.windows(2) {
            if window[1].day_offset < window[0].day_offset {
                return Err(DripError::Schedule(format!(
                    "step '{}' (day {}) is out of order after '{}' (day {})",
                    window[1].name, window[1].day_offset, window[0].name, window[0].day_offset
                )));
            }
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.name == step.name) {
                return Err(DripError::Schedule(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }
        Ok(Self { steps })
    }

    /// Loads a schedule from a JSON step list on disk.
    pub fn from_json_file(path: &Path) -> DripResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let steps: Vec<DripStep> = serde_json::from_str(&raw)?;
        let schedule = Self::new(steps)?;
        info!(path = %path.display(), steps = schedule.len(), "loaded drip schedule");
        Ok(schedule)
    }

    /// The built-in welcome series used when no schedule file is given.
    pub fn builtin() -> Self {
        let steps = vec![
            DripStep {
                name: "welcome".to_string(),
                day_offset: 0,
                subject: "Welcome aboard".to_string(),
                html: "<p>Thanks for joining us. Your account is ready to go.</p>".to_string(),
            },
            DripStep {
                name: "followup".to_string(),
                day_offset: 2,
                subject: "Getting the most out of your account".to_string(),
                html: "<p>A few things worth trying now that you have settled in.</p>".to_string(),
            },
            DripStep {
                name: "deep_dive".to_string(),
                day_offset: 6,
                subject: "A closer look at what you can do".to_string(),
                html: "<p>Ready to go further? Here is the longer tour.</p>".to_string(),
            },
        ];
        // The built-in list is ordered and unique by construction.
        Self { steps }
    }

    pub fn steps(&self) -> &[DripStep] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&DripStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
