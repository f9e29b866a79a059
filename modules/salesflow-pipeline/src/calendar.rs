//! Books meetings requested in replies, refusing double bookings.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use salesflow_common::{Lead, MeetingRecord, MeetingStatus, ReplyAnalysis};

use crate::pipeline::{PipelineState, Stage};
use crate::traits::{CalendarApi, MeetingRequest};

pub const MEETING_MINUTES: i64 = 30;
const DEFAULT_HOUR_UTC: u32 = 10;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a requested time. Naive times are read in `timezone` (UTC when
/// absent or unknown); RFC 3339 strings carry their own offset.
pub fn parse_preferred_time(raw: &str, timezone: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?;
    let tz: Tz = match timezone.map(str::trim).filter(|t| !t.is_empty()) {
        Some(name) => name.parse().unwrap_or_else(|_| {
            debug!(timezone = name, "Unknown timezone, assuming UTC");
            Tz::UTC
        }),
        None => Tz::UTC,
    };
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Tomorrow at 10:00 UTC.
pub fn default_slot(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = (now + TimeDelta::days(1)).date_naive();
    tomorrow
        .and_hms_opt(DEFAULT_HOUR_UTC, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now + TimeDelta::days(1))
}

pub fn meeting_start(analysis: &ReplyAnalysis, now: DateTime<Utc>) -> DateTime<Utc> {
    match analysis.preferred_meeting_time.as_deref() {
        Some(raw) => parse_preferred_time(raw, analysis.timezone.as_deref()).unwrap_or_else(|| {
            warn!(preferred_time = raw, "Unparseable meeting time, using default slot");
            default_slot(now)
        }),
        None => default_slot(now),
    }
}

fn needs_meeting(lead: &Lead) -> bool {
    lead.has_replied() && !lead.meeting_scheduled && lead.analysis().is_some_and(ReplyAnalysis::wants_meeting)
}

pub fn meeting_request(lead: &Lead, start: DateTime<Utc>) -> MeetingRequest {
    MeetingRequest {
        summary: format!(
            "Meeting with {} for {}",
            lead.name.as_deref().unwrap_or("Lead"),
            lead.role.as_deref().unwrap_or("Discussion")
        ),
        description: format!("Follow-up call with {}", lead.profile_url),
        start,
        end: start + TimeDelta::minutes(MEETING_MINUTES),
        attendee: lead.deliverable_email().map(String::from),
    }
}

pub struct CalendarManager {
    calendar: Option<Arc<dyn CalendarApi>>,
}

impl CalendarManager {
    pub fn new(calendar: Option<Arc<dyn CalendarApi>>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Stage for CalendarManager {
    fn name(&self) -> &'static str {
        "calendar_manager"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let Some(calendar) = &self.calendar else {
            warn!("Calendar not available, skipping meeting scheduling");
            return Ok(());
        };
        let now = Utc::now();
        for lead in state.leads.iter_mut().filter(|l| needs_meeting(l)) {
            let Some(analysis) = lead.analysis() else {
                continue;
            };
            let request = meeting_request(lead, meeting_start(analysis, now));

            let busy = match calendar.overlapping(request.start, request.end).await {
                Ok(count) => count > 0,
                Err(e) => {
                    warn!(profile_url = %lead.profile_url, error = %e, "Overlap check failed, treating slot as busy");
                    true
                }
            };
            if busy {
                info!(profile_url = %lead.profile_url, start = %request.start, "Meeting slot overlaps");
                lead.meeting = Some(MeetingRecord::overlap());
                state.stats.meeting_overlaps += 1;
                continue;
            }

            match calendar.book(&request).await {
                Ok(booked) => {
                    info!(profile_url = %lead.profile_url, event_id = %booked.event_id, start = %request.start, "Meeting scheduled");
                    lead.meeting = Some(MeetingRecord {
                        status: MeetingStatus::Scheduled,
                        event_id: Some(booked.event_id),
                        start: Some(request.start.to_rfc3339()),
                        end: Some(request.end.to_rfc3339()),
                        hangout_link: booked.hangout_link,
                        html_link: booked.html_link,
                        note: None,
                    });
                    lead.meeting_scheduled = true;
                    state.stats.meetings_scheduled += 1;
                }
                Err(e) => {
                    warn!(profile_url = %lead.profile_url, error = format!("{e:#}"), "Meeting booking failed")
                }
            }
        }
        Ok(())
    }
}
