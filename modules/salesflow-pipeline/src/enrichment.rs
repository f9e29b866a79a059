//! Contact email lookup for discovered leads.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use salesflow_common::{Lead, PLACEHOLDER_EMAIL};

use crate::pipeline::{PipelineState, Stage};
use crate::traits::EmailFinder;

const UNKNOWN_DOMAIN: &str = "unknown.com";

/// Domain to look up: the company website's host without `www.`, else a
/// guess from the company name, else `unknown.com`.
pub fn lookup_domain(lead: &Lead) -> String {
    if let Some(host) = lead.company_website.as_deref().and_then(website_host) {
        return host;
    }
    lead.company
        .as_deref()
        .map(|c| c.to_lowercase().split_whitespace().collect::<String>())
        .filter(|c| !c.is_empty())
        .map(|c| format!("{c}.com"))
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

fn website_host(website: &str) -> Option<String> {
    let website = website.trim();
    let parsed = url::Url::parse(website)
        .or_else(|_| url::Url::parse(&format!("https://{website}")))
        .ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    (!host.is_empty()).then(|| host.to_string())
}

pub struct LeadEnricher {
    finder: Option<Arc<dyn EmailFinder>>,
    /// Used when the lookup itself fails.
    fallback_email: String,
}

impl LeadEnricher {
    pub fn new(finder: Option<Arc<dyn EmailFinder>>, fallback_email: impl Into<String>) -> Self {
        Self {
            finder,
            fallback_email: fallback_email.into(),
        }
    }

    async fn resolve(&self, finder: &dyn EmailFinder, lead: &Lead) -> String {
        let domain = lookup_domain(lead);
        match finder.find_email(&domain).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                debug!(domain = %domain, "No emails for domain");
                PLACEHOLDER_EMAIL.to_string()
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "Email lookup failed, using fallback");
                self.fallback_email.clone()
            }
        }
    }
}

#[async_trait]
impl Stage for LeadEnricher {
    fn name(&self) -> &'static str {
        "lead_enricher"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let Some(finder) = &self.finder else {
            warn!("Hunter not configured, skipping enrichment");
            return Ok(());
        };
        let mut enriched = 0;
        for lead in state.leads.iter_mut() {
            if lead.deliverable_email().is_some() {
                continue;
            }
            let email = self.resolve(finder.as_ref(), lead).await;
            if email != PLACEHOLDER_EMAIL {
                state.stats.emails_found += 1;
            }
            info!(profile_url = %lead.profile_url, email = %email, "Lead enriched");
            lead.email = Some(email);
            enriched += 1;
        }
        info!(enriched, "Enrichment complete");
        Ok(())
    }
}
