use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use salesflow_common::Lead;

use crate::pipeline::{PipelineState, Stage};
use crate::traits::{Mailer, OutgoingEmail};

/// Counts over the whole lead list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub organization: String,
    pub leads: usize,
    pub emails_sent: usize,
    pub replies: usize,
    pub meetings_scheduled: usize,
    pub proposals: usize,
    pub nudges: usize,
}

pub fn summarize(leads: &[Lead], organization: &str) -> PipelineSummary {
    let count = |f: fn(&Lead) -> bool| leads.iter().filter(|l| f(l)).count();
    PipelineSummary {
        organization: organization.to_string(),
        leads: leads.len(),
        emails_sent: count(|l| l.email_sent),
        replies: count(Lead::has_replied),
        meetings_scheduled: count(|l| l.meeting_scheduled),
        proposals: count(|l| l.proposal.is_some()),
        nudges: count(|l| l.follow_up_sent),
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Daily Sales Report for {}:", self.organization)?;
        writeln!(f, "- Leads Discovered: {}", self.leads)?;
        writeln!(f, "- Emails Sent: {}", self.emails_sent)?;
        writeln!(f, "- Replies Received: {}", self.replies)?;
        writeln!(f, "- Meetings Scheduled: {}", self.meetings_scheduled)?;
        writeln!(f, "- Proposals Generated: {}", self.proposals)?;
        write!(f, "- Follow-ups Sent: {}", self.nudges)
    }
}

pub struct SummaryReporter {
    mailer: Option<Arc<dyn Mailer>>,
    recipient: String,
}

impl SummaryReporter {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, recipient: impl Into<String>) -> Self {
        Self {
            mailer,
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl Stage for SummaryReporter {
    fn name(&self) -> &'static str {
        "reporter"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let org = &state.campaign.organization_name;
        let summary = summarize(&state.leads, org).to_string();
        info!(leads = state.leads.len(), "\n{summary}");

        match &self.mailer {
            Some(mailer) => {
                let email = OutgoingEmail::plain(
                    &self.recipient,
                    format!("Daily Sales Pipeline Report - {org}"),
                    &summary,
                );
                match mailer.send(&email).await {
                    Ok(()) => {
                        state.stats.reports_sent += 1;
                        info!(to = %self.recipient, "Summary report sent");
                    }
                    Err(e) => warn!(to = %self.recipient, error = format!("{e:#}"), "Summary report send failed"),
                }
            }
            None => warn!("No mailer configured, summary report not sent"),
        }
        state.summary = Some(summary);
        Ok(())
    }
}
