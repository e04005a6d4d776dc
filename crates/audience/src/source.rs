//! Contact source — aggregates the full contact population across every
//! audience via cursor-based pagination, with bounded retry on throttling.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use drip_core::config::PacingConfig;
use drip_core::error::DripResult;
use drip_core::provider::AudienceProvider;
use drip_core::types::{AudienceRef, Contact};

use crate::retry::RetryPolicy;

pub struct ContactSource {
    provider: Arc<dyn AudienceProvider>,
    retry: RetryPolicy,
    pacing: PacingConfig,
}

impl ContactSource {
    pub fn new(provider: Arc<dyn AudienceProvider>, pacing: PacingConfig) -> Self {
        let retry = RetryPolicy {
            max_attempts: pacing.max_page_attempts,
            delay_ms: pacing.rate_limit_delay_ms,
        };
        Self {
            provider,
            retry,
            pacing,
        }
    }

    /// Fetches every contact from every audience into one flat list.
    ///
    /// No deduplication: the tracking ledger is keyed by address, so a
    /// contact present in two audiences still receives each step once.
    /// A failure to list audiences, or to fully paginate any single
    /// audience, is fatal; a partial population must not pass as complete.
    pub async fn fetch_all(&self) -> DripResult<Vec<Contact>> {
        let audiences = self.provider.list_audiences().await?;
        info!(audiences = audiences.len(), "listed audiences");

        let mut contacts: Vec<Contact> = Vec::new();
        for audience in &audiences {
            let fetched = self.fetch_audience(audience).await?;
            info!(
                audience_id = %audience.id,
                name = %audience.name,
                contacts = fetched.len(),
                "fetched audience"
            );
            contacts.extend(fetched);
        }

        info!(total = contacts.len(), "aggregated contact population");
        Ok(contacts)
    }

    /// Walks one audience page by page until the provider returns no cursor.
    ///
    /// A fixed cool-down precedes every page request. Rate-limited pages are
    /// retried in place up to the policy bound, then escalated as fatal for
    /// the audience.
    pub async fn fetch_audience(&self, audience: &AudienceRef) -> DripResult<Vec<Contact>> {
        let mut contacts: Vec<Contact> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut attempt = 0u32;
            let page = loop {
                attempt += 1;
                // Cool-down before every page request, retries included.
                tokio::time::sleep(Duration::from_millis(self.pacing.page_delay_ms)).await;
                match self
                    .provider
                    .list_contacts(&audience.id, cursor.as_deref())
                    .await
                {
                    Ok(page) => break page,
                    Err(e) if e.is_rate_limited() && self.retry.should_retry(attempt) => {
                        warn!(
                            audience_id = %audience.id,
                            attempt,
                            max_attempts = self.retry.max_attempts,
                            "rate limited, retrying page"
                        );
                        tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                    }
                    Err(e) => return Err(e),
                }
            };

            contacts.extend(page.contacts);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use drip_core::error::DripError;
    use drip_core::types::ContactPage;

    fn contact(address: &str) -> Contact {
        Contact {
            address: address.to_string(),
            display_name: None,
            signup_time: None,
        }
    }

    fn audience(id: &str) -> AudienceRef {
        AudienceRef {
            id: id.to_string(),
            name: format!("Audience {id}"),
        }
    }

    /// Serves a fixed cursor-to-page map, failing each request with a
    /// rate-limit error a configurable number of times first.
    struct FakeProvider {
        audiences: Vec<AudienceRef>,
        pages: HashMap<(String, Option<String>), ContactPage>,
        rate_limit_first: u32,
        calls: AtomicU32,
        fail_listing: bool,
    }

    impl FakeProvider {
        fn new(audiences: Vec<AudienceRef>) -> Self {
            Self {
                audiences,
                pages: HashMap::new(),
                rate_limit_first: 0,
                calls: AtomicU32::new(0),
                fail_listing: false,
            }
        }

        fn with_page(
            mut self,
            audience_id: &str,
            cursor: Option<&str>,
            contacts: Vec<Contact>,
            next_cursor: Option<&str>,
        ) -> Self {
            self.pages.insert(
                (audience_id.to_string(), cursor.map(str::to_string)),
                ContactPage {
                    contacts,
                    next_cursor: next_cursor.map(str::to_string),
                },
            );
            self
        }
    }

    #[async_trait]
    impl AudienceProvider for FakeProvider {
        async fn list_audiences(&self) -> DripResult<Vec<AudienceRef>> {
            if self.fail_listing {
                return Err(DripError::Provider("listing unavailable".to_string()));
            }
            Ok(self.audiences.clone())
        }

        async fn list_contacts(
            &self,
            audience_id: &str,
            cursor: Option<&str>,
        ) -> DripResult<ContactPage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.rate_limit_first {
                return Err(DripError::RateLimited("throttled".to_string()));
            }
            self.pages
                .get(&(audience_id.to_string(), cursor.map(str::to_string)))
                .cloned()
                .ok_or_else(|| DripError::Provider(format!("unknown page {cursor:?}")))
        }
    }

    fn source(provider: FakeProvider) -> ContactSource {
        ContactSource::new(Arc::new(provider), PacingConfig::immediate())
    }

    fn shared(provider: FakeProvider) -> (Arc<FakeProvider>, ContactSource) {
        let provider = Arc::new(provider);
        let source = ContactSource::new(provider.clone(), PacingConfig::immediate());
        (provider, source)
    }

    #[tokio::test]
    async fn test_pagination_returns_union_of_all_pages() {
        let provider = FakeProvider::new(vec![audience("a1")])
            .with_page("a1", None, vec![contact("p1@x.com")], Some("c1"))
            .with_page("a1", Some("c1"), vec![contact("p2@x.com")], Some("c2"))
            .with_page("a1", Some("c2"), vec![contact("p3@x.com")], None);

        let contacts = source(provider).fetch_all().await.unwrap();
        let addresses: Vec<&str> = contacts.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(addresses, vec!["p1@x.com", "p2@x.com", "p3@x.com"]);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_fails_after_three_attempts() {
        let mut provider = FakeProvider::new(vec![audience("a1")]);
        provider.rate_limit_first = u32::MAX;

        let (provider, source) = shared(provider);
        let err = source.fetch_audience(&audience("a1")).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limited_page_is_retried_in_place() {
        let mut provider = FakeProvider::new(vec![audience("a1")])
            .with_page("a1", None, vec![contact("p1@x.com")], None);
        provider.rate_limit_first = 2;

        let contacts = source(provider).fetch_all().await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].address, "p1@x.com");
    }

    #[tokio::test]
    async fn test_aggregates_across_audiences_without_dedup() {
        let provider = FakeProvider::new(vec![audience("a1"), audience("a2")])
            .with_page("a1", None, vec![contact("p1@x.com")], None)
            .with_page("a2", None, vec![contact("p1@x.com"), contact("p2@x.com")], None);

        let contacts = source(provider).fetch_all().await.unwrap();
        assert_eq!(contacts.len(), 3);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let mut provider = FakeProvider::new(vec![]);
        provider.fail_listing = true;

        let err = source(provider).fetch_all().await.unwrap_err();
        assert!(matches!(err, DripError::Provider(_)));
    }

    #[tokio::test]
    async fn test_non_rate_limit_error_propagates_without_retry() {
        // No page registered: the first request fails with a provider error.
        let provider = FakeProvider::new(vec![audience("a1")]);

        let (provider, source) = shared(provider);
        let err = source.fetch_audience(&audience("a1")).await.unwrap_err();
        assert!(matches!(err, DripError::Provider(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
