//! Sends each lead's draft once.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use salesflow_common::Lead;

use crate::pipeline::{PipelineState, Stage};
use crate::traits::{Mailer, OutgoingEmail};

pub const DEFAULT_SEND_DELAY: Duration = Duration::from_secs(5);

/// The email to send for `lead`, or `None` when it is not ready or already sent.
pub fn outreach_email(lead: &Lead) -> Option<OutgoingEmail> {
    if lead.email_sent {
        return None;
    }
    let draft = lead.email_draft.as_ref()?;
    let to = lead.deliverable_email()?;
    let body = match draft.cta.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(cta) => format!("{}<br><br>{cta}", draft.body),
        None => draft.body.clone(),
    };
    Some(OutgoingEmail::html(to, &draft.subject, body))
}

pub struct OutreachExecutor {
    mailer: Option<Arc<dyn Mailer>>,
    delay: Duration,
}

impl OutreachExecutor {
    pub fn new(mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self {
            mailer,
            delay: DEFAULT_SEND_DELAY,
        }
    }

    /// Pause between consecutive sends.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Stage for OutreachExecutor {
    fn name(&self) -> &'static str {
        "outreach_executor"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let Some(mailer) = &self.mailer else {
            warn!("SMTP not configured, skipping outreach");
            return Ok(());
        };
        let mut sent_any = false;
        for lead in state.leads.iter_mut() {
            let Some(email) = outreach_email(lead) else {
                continue;
            };
            if sent_any {
                tokio::time::sleep(self.delay).await;
            }
            match mailer.send(&email).await {
                Ok(()) => {
                    lead.email_sent = true;
                    lead.email_sent_time = Some(chrono::Local::now().naive_local());
                    state.stats.emails_sent += 1;
                    sent_any = true;
                    info!(profile_url = %lead.profile_url, to = %email.to, "Outreach email sent");
                }
                Err(e) => {
                    state.stats.send_failures += 1;
                    warn!(profile_url = %lead.profile_url, to = %email.to, error = format!("{e:#}"), "Outreach send failed");
                }
            }
        }
        Ok(())
    }
}
