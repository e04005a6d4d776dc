//! Resend API client — the typed boundary to the audience/delivery provider.
//!
//! Wire shapes stay private to this module; only the core data model leaves
//! it. HTTP 429 is surfaced as [`DripError::RateLimited`] so the contact
//! source can retry the same page in place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use drip_core::channels::DeliveryChannel;
use drip_core::config::ProviderConfig;
use drip_core::error::{DripError, DripResult};
use drip_core::provider::AudienceProvider;
use drip_core::schedule::DripStep;
use drip_core::types::{AudienceRef, Contact, ContactPage, DeliveryOutcome};

pub struct ResendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from_address: String,
    page_size: u32,
}

impl ResendClient {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
            page_size: config.page_size,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> DripResult<T> {
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| DripError::Provider(format!("GET {url}: {e}")))?;
        decode_response(resp).await
    }
}

async fn decode_response<T: DeserializeOwned>(resp: reqwest::Response) -> DripResult<T> {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let body = resp.text().await.unwrap_or_default();
        return Err(DripError::RateLimited(body));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(DripError::Provider(format!("HTTP {status}: {body}")));
    }
    resp.json::<T>()
        .await
        .map_err(|e| DripError::Provider(format!("malformed response: {e}")))
}

// ─── Wire shapes ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AudienceListResponse {
    data: Vec<AudienceData>,
}

#[derive(Debug, Deserialize)]
struct AudienceData {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContactListResponse {
    data: Vec<ContactData>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactData {
    email: String,
    first_name: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl From<AudienceData> for AudienceRef {
    fn from(raw: AudienceData) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
        }
    }
}

impl From<ContactData> for Contact {
    fn from(raw: ContactData) -> Self {
        Self {
            address: raw.email,
            // Empty names show up in exports; treat them as absent.
            display_name: raw.first_name.filter(|n| !n.trim().is_empty()),
            signup_time: raw.created_at,
        }
    }
}

// ─── Provider implementations ───────────────────────────────────────────

#[async_trait]
impl AudienceProvider for ResendClient {
    async fn list_audiences(&self) -> DripResult<Vec<AudienceRef>> {
        let resp: AudienceListResponse = self.get_json(self.url("/audiences")).await?;
        Ok(resp.data.into_iter().map(AudienceRef::from).collect())
    }

    async fn list_contacts(
        &self,
        audience_id: &str,
        cursor: Option<&str>,
    ) -> DripResult<ContactPage> {
        let mut url = format!(
            "{}?limit={}",
            self.url(&format!("/audiences/{audience_id}/contacts")),
            self.page_size
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&after={cursor}"));
        }

        let resp: ContactListResponse = self.get_json(url).await?;
        debug!(
            audience_id = %audience_id,
            contacts = resp.data.len(),
            has_next = resp.next_cursor.is_some(),
            "fetched contact page"
        );
        Ok(ContactPage {
            contacts: resp.data.into_iter().map(Contact::from).collect(),
            next_cursor: resp.next_cursor,
        })
    }
}

#[async_trait]
impl DeliveryChannel for ResendClient {
    async fn deliver(&self, step: &DripStep, contact: &Contact) -> DripResult<DeliveryOutcome> {
        let to = match &contact.display_name {
            Some(name) => format!("{name} <{}>", contact.address),
            None => contact.address.clone(),
        };
        let payload = serde_json::json!({
            "from": self.from_address,
            "to": [to],
            "subject": step.subject,
            "html": step.html,
        });

        let resp = self
            .http
            .post(self.url("/emails"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DripError::Delivery(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Ok(DeliveryOutcome::failed(format!("HTTP {status}: {body}")));
        }

        let sent: SendEmailResponse = resp
            .json()
            .await
            .map_err(|e| DripError::Delivery(format!("malformed send response: {e}")))?;
        Ok(DeliveryOutcome::delivered(sent.id))
    }
}
