//! Delivery collaborator interface.

use async_trait::async_trait;

use crate::error::DripResult;
use crate::schedule::DripStep;
use crate::types::{Contact, DeliveryOutcome};

/// Sends one step to one contact. Opaque and synchronous from the runner's
/// point of view: the call blocks the single execution flow until the
/// provider answers.
///
/// Transport failures may surface as `Err`; provider-reported failures as
/// `Ok` with `success == false`. The runner treats both as a per-delivery
/// failure: logged, counted, and retried on the next invocation.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, step: &DripStep, contact: &Contact) -> DripResult<DeliveryOutcome>;
}
