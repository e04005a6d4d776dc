//! Audience provider interface.
//!
//! Implementations are the parsing boundary: provider wire shapes stay
//! private to the implementation and only the core data model crosses here.

use async_trait::async_trait;

use crate::error::DripResult;
use crate::types::{AudienceRef, ContactPage};

/// Remote audience store: audience listing and cursor-paginated contacts.
#[async_trait]
pub trait AudienceProvider: Send + Sync {
    /// Lists every audience. A failure here is fatal for the run; with no
    /// audiences there is nothing to work from.
    async fn list_audiences(&self) -> DripResult<Vec<AudienceRef>>;

    /// Fetches one page of contacts. Passing the cursor from the previous
    /// page continues the listing; a page with no cursor terminates it.
    async fn list_contacts(
        &self,
        audience_id: &str,
        cursor: Option<&str>,
    ) -> DripResult<ContactPage>;
}
