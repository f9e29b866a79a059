//! Reply detection and classification for sent outreach.
//!
//! For every sent lead that has not replied yet, search the mailbox for a
//! reply on the same subject after the send time. A reply is classified,
//! acknowledged and marked read; no reply leaves the lead `pending` for the
//! nudge in [`nudge`].

pub mod nudge;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use salesflow_common::{EmailReview, Intent, Interest, Lead, ReplyAnalysis};

use crate::pipeline::{PipelineState, Stage};
use crate::stats::RunStats;
use crate::store::{ArtifactKind, Artifacts};
use crate::traits::{Mailbox, Mailer, OutgoingEmail, TextGenerator};

/// Gmail search for a reply from `email` on `subject` after `sent`.
pub fn reply_query(email: &str, subject: &str, sent: Option<NaiveDateTime>) -> String {
    let after = sent
        .and_then(|t| chrono::Local.from_local_datetime(&t).earliest())
        .map(|t| t.timestamp())
        .unwrap_or(0);
    // Gmail has no escape for quotes inside a quoted phrase.
    let subject = subject.replace('"', "");
    format!("from:{email} subject:\"{subject}\" after:{after}")
}

/// Replies quoting long threads are cut to this many bytes before classifying.
const MAX_REPLY_BYTES: usize = 4_000;

pub fn classification_prompt(body: &str) -> String {
    let body = ai_client::truncate_to_char_boundary(body, MAX_REPLY_BYTES);
    format!(
        r#"Analyze this reply to a sales email:

{body}

Classify interest:
- "interested" if positive, or asking for more info, a meeting or a proposal.
- "not_interested" if it is a rejection.
- "other" if unclear.
Classify intent as "meeting_requested", "proposal_requested", "more_info" or "none".
If a meeting time is mentioned, give it as YYYY-MM-DD HH:MM with its IANA timezone (UTC if none given).

Output ONLY JSON:
{{"summary": "brief summary", "interest": "...", "intent": "...", "preferred_meeting_time": "YYYY-MM-DD HH:MM" or null, "timezone": "UTC"}}"#
    )
}

/// Loose shape of the classifier's answer; labels are mapped leniently.
#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    interest: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    preferred_meeting_time: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Parse a classifier response. Unreadable output becomes
/// [`ReplyAnalysis::unreadable`].
pub fn parse_analysis(raw: &str) -> ReplyAnalysis {
    let parsed: RawAnalysis = match serde_json::from_str(ai_client::extract_json_object(raw)) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Classifier output is not JSON");
            return ReplyAnalysis::unreadable();
        }
    };
    ReplyAnalysis {
        summary: parsed.summary.unwrap_or_default(),
        interest: parsed
            .interest
            .as_deref()
            .map(Interest::from_label)
            .unwrap_or_default(),
        intent: parsed
            .intent
            .as_deref()
            .map(Intent::from_label)
            .unwrap_or_default(),
        preferred_meeting_time: non_blank(parsed.preferred_meeting_time),
        timezone: non_blank(parsed.timezone),
    }
}

/// Rule-based acknowledgment text for a classified reply.
pub fn acknowledgment(interest: Interest) -> &'static str {
    match interest {
        Interest::Interested => "Thank you for your interest. Let's proceed.",
        Interest::NotInterested => "Noted, thank you.",
        Interest::Other => "Clarifying your response.",
    }
}

pub struct EmailReviewer {
    mailbox: Option<Arc<dyn Mailbox>>,
    classifier: Option<Arc<dyn TextGenerator>>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl EmailReviewer {
    pub fn new(
        mailbox: Option<Arc<dyn Mailbox>>,
        classifier: Option<Arc<dyn TextGenerator>>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        Self {
            mailbox,
            classifier,
            mailer,
        }
    }

    async fn classify(&self, body: &str) -> ReplyAnalysis {
        let Some(classifier) = &self.classifier else {
            warn!("No classifier configured");
            return ReplyAnalysis::unreadable();
        };
        match classifier.generate(&classification_prompt(body)).await {
            Ok(raw) => parse_analysis(&raw),
            Err(e) => {
                warn!(error = %e, "Reply classification failed");
                ReplyAnalysis::unreadable()
            }
        }
    }

    /// Returns whether a reply was found.
    async fn review(
        &self,
        mailbox: &dyn Mailbox,
        lead: &mut Lead,
        artifacts: &Artifacts,
        stats: &mut RunStats,
    ) -> Result<bool> {
        let Some(email) = lead.deliverable_email().map(String::from) else {
            return Ok(false);
        };
        let subject = lead.subject().unwrap_or_default().to_string();
        let query = reply_query(&email, &subject, lead.email_sent_time);

        let Some(message_id) = mailbox.find_message(&query).await.context("Reply search failed")? else {
            debug!(profile_url = %lead.profile_url, "No reply yet");
            lead.email_review = Some(EmailReview::pending());
            artifacts.write_json(
                ArtifactKind::NonReplied,
                lead,
                &json!({
                    "name": lead.name.as_deref().unwrap_or("Unknown"),
                    "company": lead.company.as_deref().unwrap_or("Unknown"),
                    "company_url": lead.company_url.as_deref().unwrap_or("Unknown"),
                    "profile_url": lead.profile_url,
                }),
            )?;
            return Ok(false);
        };

        let body = mailbox
            .message_body(&message_id)
            .await
            .context("Failed to read reply")?
            .unwrap_or_default();
        let analysis = self.classify(&body).await;
        info!(
            profile_url = %lead.profile_url,
            interest = ?analysis.interest,
            intent = ?analysis.intent,
            "Reply found"
        );

        artifacts.write_json(
            ArtifactKind::Replied,
            lead,
            &json!({
                "name": lead.name.as_deref().unwrap_or("Unknown"),
                "company": lead.company.as_deref().unwrap_or("Unknown"),
                "linkedin_url": lead.profile_url,
                "reply_body": body,
                "analysis": analysis,
            }),
        )?;
        let interest = analysis.interest;
        lead.email_review = Some(EmailReview::replied(body, analysis));
        stats.replies_found += 1;

        match &self.mailer {
            Some(mailer) => {
                let ack = OutgoingEmail::plain(&email, format!("Re: {subject}"), acknowledgment(interest));
                match mailer.send(&ack).await {
                    Ok(()) => stats.acknowledgments_sent += 1,
                    Err(e) => warn!(to = %email, error = format!("{e:#}"), "Acknowledgment send failed"),
                }
            }
            None => warn!(to = %email, "No mailer configured, acknowledgment not sent"),
        }

        if let Err(e) = mailbox.mark_read(&message_id).await {
            warn!(message_id = %message_id, error = %e, "Failed to mark reply read");
        }
        Ok(true)
    }
}

#[async_trait]
impl Stage for EmailReviewer {
    fn name(&self) -> &'static str {
        "email_reviewer"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let Some(mailbox) = &self.mailbox else {
            warn!("Gmail not available, skipping email review");
            return Ok(());
        };
        let mut replies = 0;
        for lead in state.leads.iter_mut() {
            if !lead.email_sent || lead.has_replied() {
                continue;
            }
            match self
                .review(mailbox.as_ref(), lead, &state.artifacts, &mut state.stats)
                .await
            {
                Ok(true) => replies += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(profile_url = %lead.profile_url, error = format!("{e:#}"), "Review failed, skipping lead")
                }
            }
        }
        info!(replies, "Email review complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_without_send_time_starts_at_epoch() {
        assert_eq!(
            reply_query("jane@acme.io", "Hello Acme", None),
            "from:jane@acme.io subject:\"Hello Acme\" after:0"
        );
    }

    #[test]
    fn quotes_in_subject_do_not_break_the_phrase() {
        assert_eq!(
            reply_query("jane@acme.io", "Your \"AI\" roadmap", None),
            "from:jane@acme.io subject:\"Your AI roadmap\" after:0"
        );
    }

    #[test]
    fn query_uses_send_time() {
        let sent = chrono::NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let expected = chrono::Local
            .from_local_datetime(&sent)
            .earliest()
            .unwrap()
            .timestamp();
        assert!(reply_query("a@b.c", "S", Some(sent)).ends_with(&format!("after:{expected}")));
    }

    #[test]
    fn analysis_parses_leniently() {
        let raw = r#"Here you go:
```json
{"summary": "Wants a call", "interest": "Interested", "intent": "meeting request",
 "preferred_meeting_time": "2025-03-01 15:00", "timezone": "Asia/Kolkata"}
```"#;
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.interest, Interest::Interested);
        assert_eq!(analysis.intent, Intent::MeetingRequested);
        assert_eq!(analysis.preferred_meeting_time.as_deref(), Some("2025-03-01 15:00"));
        assert!(analysis.wants_meeting());
    }

    #[test]
    fn null_strings_and_garbage() {
        let analysis = parse_analysis(r#"{"interest": "maybe", "preferred_meeting_time": "null"}"#);
        assert_eq!(analysis.interest, Interest::Other);
        assert_eq!(analysis.preferred_meeting_time, None);

        let unreadable = parse_analysis("I could not decide.");
        assert_eq!(unreadable.summary, "Error");
        assert_eq!(unreadable.interest, Interest::Other);
    }

    #[test]
    fn long_replies_are_cut_before_classifying() {
        let prompt = classification_prompt(&"é".repeat(MAX_REPLY_BYTES));
        assert!(prompt.len() < MAX_REPLY_BYTES + 1_000);
        assert!(prompt.starts_with("Analyze this reply"));
    }

    #[test]
    fn acknowledgments() {
        assert_eq!(acknowledgment(Interest::Interested), "Thank you for your interest. Let's proceed.");
        assert_eq!(acknowledgment(Interest::NotInterested), "Noted, thank you.");
        assert_eq!(acknowledgment(Interest::Other), "Clarifying your response.");
    }
}
