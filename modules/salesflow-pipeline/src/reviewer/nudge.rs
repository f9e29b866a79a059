//! One time-delayed follow-up for leads that have not replied.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta};
use tracing::{info, warn};

use salesflow_common::{Lead, ReviewStatus};

use crate::pipeline::{PipelineState, Stage};
use crate::traits::{Mailer, OutgoingEmail, TextGenerator};

const FALLBACK_NUDGE: &str = "Follow-up message.";

/// Whether `lead` is due its single nudge at `now`.
pub fn nudge_due(lead: &Lead, now: NaiveDateTime, threshold: TimeDelta) -> bool {
    if !lead.email_sent || lead.follow_up_sent {
        return false;
    }
    if lead.review_status() != Some(ReviewStatus::Pending) {
        return false;
    }
    lead.email_sent_time
        .is_some_and(|sent| now.signed_duration_since(sent) >= threshold)
}

pub fn nudge_prompt(lead: &Lead) -> String {
    format!(
        "Write a short, polite follow-up email to {name} ({role} at {company}) who has not replied \
         to our earlier message \"{subject}\". Plain text, 2-3 sentences, no subject line, no signature placeholders.",
        name = lead.display_name(),
        role = lead.role.as_deref().unwrap_or("their role"),
        company = lead.company.as_deref().unwrap_or("their company"),
        subject = lead.subject().unwrap_or("our introduction"),
    )
}

pub struct FollowUp {
    mailer: Option<Arc<dyn Mailer>>,
    generator: Option<Arc<dyn TextGenerator>>,
    threshold: TimeDelta,
}

impl FollowUp {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            mailer,
            generator,
            threshold: TimeDelta::days(1),
        }
    }

    pub fn with_threshold(mut self, threshold: TimeDelta) -> Self {
        self.threshold = threshold;
        self
    }

    async fn nudge_text(&self, lead: &Lead) -> String {
        let Some(generator) = &self.generator else {
            return FALLBACK_NUDGE.to_string();
        };
        match generator.generate(&nudge_prompt(lead)).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => FALLBACK_NUDGE.to_string(),
            Err(e) => {
                warn!(profile_url = %lead.profile_url, error = %e, "Nudge generation failed");
                FALLBACK_NUDGE.to_string()
            }
        }
    }
}

#[async_trait]
impl Stage for FollowUp {
    fn name(&self) -> &'static str {
        "follow_up"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let Some(mailer) = &self.mailer else {
            warn!("SMTP not configured, skipping follow-ups");
            return Ok(());
        };
        let now = chrono::Local::now().naive_local();
        for lead in state.leads.iter_mut() {
            if !nudge_due(lead, now, self.threshold) {
                continue;
            }
            let Some(to) = lead.deliverable_email().map(String::from) else {
                continue;
            };
            let subject = format!("Re: {}", lead.subject().unwrap_or("Follow-up"));
            let text = self.nudge_text(lead).await;
            match mailer.send(&OutgoingEmail::plain(&to, subject, text)).await {
                Ok(()) => {
                    lead.follow_up_sent = true;
                    state.stats.nudges_sent += 1;
                    info!(profile_url = %lead.profile_url, to = %to, "Nudge sent");
                }
                Err(e) => {
                    warn!(profile_url = %lead.profile_url, error = format!("{e:#}"), "Nudge send failed")
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesflow_common::{EmailReview, ReplyAnalysis};

    fn sent_lead(hours_ago: i64, now: NaiveDateTime) -> Lead {
        let mut lead = Lead::new("https://www.linkedin.com/in/a");
        lead.email = Some("a@acme.io".into());
        lead.email_sent = true;
        lead.email_sent_time = Some(now - TimeDelta::hours(hours_ago));
        lead.email_review = Some(EmailReview::pending());
        lead
    }

    #[test]
    fn due_after_threshold_only_once() {
        let now = chrono::Local::now().naive_local();
        let day = TimeDelta::days(1);
        assert!(nudge_due(&sent_lead(25, now), now, day));
        assert!(nudge_due(&sent_lead(24, now), now, day));
        assert!(!nudge_due(&sent_lead(23, now), now, day));

        let mut nudged = sent_lead(48, now);
        nudged.follow_up_sent = true;
        assert!(!nudge_due(&nudged, now, day));
    }

    #[test]
    fn replied_or_unreviewed_leads_are_not_nudged() {
        let now = chrono::Local::now().naive_local();
        let mut replied = sent_lead(48, now);
        replied.email_review = Some(EmailReview::replied("ok".into(), ReplyAnalysis::default()));
        assert!(!nudge_due(&replied, now, TimeDelta::days(1)));

        let mut unreviewed = sent_lead(48, now);
        unreviewed.email_review = None;
        assert!(!nudge_due(&unreviewed, now, TimeDelta::days(1)));
    }
}
