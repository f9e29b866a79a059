pub mod error;
pub mod types;

pub use error::{HunterError, Result};
pub use types::{DomainSearch, HunterEmail};

use std::time::Duration;

use types::{ApiErrors, ApiResponse};

const BASE_URL: &str = "https://api.hunter.io/v2";

pub struct HunterClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HunterClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Look up the addresses Hunter knows for a company domain.
    pub async fn domain_search(&self, domain: &str) -> Result<DomainSearch> {
        let url = format!("{}/domain-search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("domain", domain), ("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let api_resp: ApiResponse<DomainSearch> = resp.json().await?;
        tracing::info!(
            domain,
            emails = api_resp.data.emails.len(),
            "Hunter domain search complete"
        );
        Ok(api_resp.data)
    }
}

fn api_error(status: u16, body: &str) -> HunterError {
    let parsed: Option<ApiErrors> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|p| p.errors.first());

    if status == 429 || detail.and_then(|d| d.id.as_deref()) == Some("too_many_requests") {
        return HunterError::QuotaExhausted;
    }

    let message = detail
        .and_then(|d| d.details.clone())
        .unwrap_or_else(|| body.to_string());
    HunterError::Api { status, message }
}
