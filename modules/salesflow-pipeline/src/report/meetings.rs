use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use salesflow_common::{Interest, Lead};

use crate::pipeline::{PipelineState, Stage};
use crate::traits::{Mailer, OutgoingEmail};

const REPORT_HEADER: &str = "Here are the details of leads who are interested in our services:";

/// Booked meetings not yet reported, from leads that did not decline.
fn reportable(lead: &Lead) -> bool {
    !lead.send_meeting_info
        && lead.meeting_scheduled
        && lead.meeting.as_ref().is_some_and(|m| m.is_scheduled())
        && lead.analysis().map(|a| a.interest) != Some(Interest::NotInterested)
}

pub fn meeting_section(lead: &Lead) -> String {
    let meeting = lead.meeting.as_ref();
    let start = meeting.and_then(|m| m.start.as_deref());
    let end = meeting.and_then(|m| m.end.as_deref());
    let link = meeting.and_then(|m| m.hangout_link.as_deref().or(m.html_link.as_deref()));
    format!(
        "- Lead Name: {}\n- Lead profile: {}\n- Meeting start: {}\n- Meeting end: {}\n- Meeting link: {}",
        lead.name.as_deref().unwrap_or("Unknown"),
        lead.profile_url,
        start.unwrap_or("unknown"),
        end.unwrap_or("unknown"),
        link.unwrap_or("unknown"),
    )
}

pub struct MeetingReporter {
    mailer: Option<Arc<dyn Mailer>>,
    recipient: String,
}

impl MeetingReporter {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, recipient: impl Into<String>) -> Self {
        Self {
            mailer,
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl Stage for MeetingReporter {
    fn name(&self) -> &'static str {
        "meeting_reporter"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let indices: Vec<usize> = state
            .leads
            .iter()
            .enumerate()
            .filter(|(_, l)| reportable(l))
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            info!("No new meetings to report");
            return Ok(());
        }
        let Some(mailer) = &self.mailer else {
            warn!(meetings = indices.len(), "No mailer configured, meeting report not sent");
            return Ok(());
        };

        let sections: Vec<String> = indices.iter().map(|&i| meeting_section(&state.leads[i])).collect();
        let body = format!("{REPORT_HEADER}\n\n{}", sections.join("\n\n"));
        let email = OutgoingEmail::plain(
            &self.recipient,
            format!("Lead Response Meeting Report - {}", state.campaign.organization_name),
            body,
        );

        match mailer.send(&email).await {
            Ok(()) => {
                for &i in &indices {
                    state.leads[i].send_meeting_info = true;
                }
                state.stats.reports_sent += 1;
                info!(meetings = indices.len(), to = %self.recipient, "Meeting report sent");
            }
            Err(e) => warn!(to = %self.recipient, error = format!("{e:#}"), "Meeting report send failed"),
        }
        Ok(())
    }
}
