use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recipient, as pulled from the remote audience store.
///
/// Read-only to the runner; the address is the identity key everywhere,
/// independent of which audience the contact came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub address: String,
    pub display_name: Option<String>,
    /// When the contact signed up. Absent means "just signed up" for
    /// eligibility purposes.
    pub signup_time: Option<DateTime<Utc>>,
}

/// A remote audience, resolved at the provider boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceRef {
    pub id: String,
    pub name: String,
}

/// One page of a cursor-paginated contact listing.
#[derive(Debug, Clone)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    /// Opaque token for the next page; `None` terminates the listing.
    pub next_cursor: Option<String>,
}

/// What the delivery collaborator reported for a single send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }
}

/// One confirmed send of one step to one contact. Append-only: records are
/// never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub address: String,
    pub step_name: String,
    pub sent_at: DateTime<Utc>,
}
