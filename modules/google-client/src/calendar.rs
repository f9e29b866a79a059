//! Google Calendar API v3: list events in a window, insert events with Meet links.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::GoogleAuth;
use crate::error::{error_for_response, Result};
use crate::retry::{send_with_retry, RetryPolicy};

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn utc(at: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(at.to_rfc3339()),
            date: None,
            time_zone: Some("UTC".to_string()),
        }
    }

    /// Start instant; all-day events resolve to midnight UTC.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        if let Some(dt) = self.date_time.as_deref() {
            return DateTime::parse_from_rfc3339(dt)
                .ok()
                .map(|d| d.with_timezone(&Utc));
        }
        self.date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

/// An event as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub hangout_link: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attendee {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    create_request: CreateConferenceRequest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConferenceRequest {
    request_id: String,
    conference_solution_key: ConferenceSolutionKey,
}

#[derive(Debug, Clone, Serialize)]
struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    kind: String,
}

/// Event to create.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conference_data: Option<ConferenceData>,
}

impl NewEvent {
    pub fn new(summary: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            summary: summary.into(),
            description: None,
            start: EventTime::utc(start),
            end: EventTime::utc(end),
            attendees: Vec::new(),
            conference_data: None,
        }
    }

    pub fn attendee(mut self, email: impl Into<String>) -> Self {
        self.attendees.push(Attendee {
            email: email.into(),
        });
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Ask Calendar to attach a Google Meet link. `request_id` must be unique per event.
    pub fn with_meet(mut self, request_id: impl Into<String>) -> Self {
        self.conference_data = Some(ConferenceData {
            create_request: CreateConferenceRequest {
                request_id: request_id.into(),
                conference_solution_key: ConferenceSolutionKey {
                    kind: "hangoutsMeet".to_string(),
                },
            },
        });
        self
    }
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

// ============================================================================
// CalendarClient
// ============================================================================

pub struct CalendarClient {
    auth: Arc<GoogleAuth>,
    http: reqwest::Client,
    base_url: String,
    calendar_id: String,
    retry: RetryPolicy,
}

impl CalendarClient {
    pub fn new(auth: Arc<GoogleAuth>) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            base_url: CALENDAR_API_URL.to_string(),
            calendar_id: "primary".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Events overlapping `[start, end)`, recurring events expanded.
    pub async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/calendars/{}/events", self.base_url, self.calendar_id);
        let resp = send_with_retry(
            self.http.get(&url).bearer_auth(token).query(&[
                ("timeMin", start.to_rfc3339().as_str()),
                ("timeMax", end.to_rfc3339().as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ]),
            &self.retry,
        )
        .await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }
        let list: EventListResponse = resp.json().await?;
        Ok(list.items)
    }

    /// Insert an event; attendees get invitations.
    pub async fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/calendars/{}/events", self.base_url, self.calendar_id);
        let resp = send_with_retry(
            self.http
                .post(&url)
                .bearer_auth(token)
                .query(&[("conferenceDataVersion", "1"), ("sendUpdates", "all")])
                .json(event),
            &self.retry,
        )
        .await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }
        let created: CalendarEvent = resp.json().await?;
        tracing::info!(event_id = %created.id, summary = %event.summary, "Calendar event created");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::GoogleToken;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CalendarClient {
        let token = GoogleToken {
            token: "ya29.valid".to_string(),
            refresh_token: None,
            token_uri: "http://unused".to_string(),
            client_id: "cid".to_string(),
            client_secret: None,
            scopes: vec![],
            expiry: Some("2099-01-01T00:00:00Z".to_string()),
            account: None,
        };
        CalendarClient::new(Arc::new(GoogleAuth::from_token(token, "/nonexistent")))
            .with_base_url(&server.uri())
            .with_retry(RetryPolicy::none())
    }

    #[test]
    fn all_day_event_resolves_to_midnight() {
        let t = EventTime {
            date: Some("2026-03-01".into()),
            ..Default::default()
        };
        assert_eq!(
            t.instant(),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn new_event_serializes_meet_request() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let event = NewEvent::new("Meeting with Jane", start, start + chrono::Duration::minutes(30))
            .attendee("jane@acme.com")
            .with_meet("req-1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["attendees"][0]["email"], "jane@acme.com");
        assert_eq!(
            json["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"],
            "hangoutsMeet"
        );
        assert_eq!(json["start"]["timeZone"], "UTC");
        assert!(json.get("description").is_none());
    }

    #[tokio::test]
    async fn events_between_sends_window() {
        let server = MockServer::start().await;
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = start + chrono::Duration::minutes(30);
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("timeMin", start.to_rfc3339()))
            .and(query_param("timeMax", end.to_rfc3339()))
            .and(query_param("singleEvents", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "e1", "summary": "Standup",
                           "start": {"dateTime": "2026-03-02T10:15:00Z"},
                           "end": {"dateTime": "2026-03-02T10:30:00Z"}}]
            })))
            .mount(&server)
            .await;

        let events = client(&server).events_between(start, end).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary.as_deref(), Some("Standup"));
    }

    #[tokio::test]
    async fn insert_requests_conference_data_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(query_param("conferenceDataVersion", "1"))
            .and(body_partial_json(serde_json::json!({"summary": "Meeting with Jane"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "evt-9",
                "htmlLink": "https://calendar.google.com/event?eid=evt-9",
                "hangoutLink": "https://meet.google.com/abc-defg-hij",
                "start": {"dateTime": "2026-03-02T10:00:00Z"},
                "end": {"dateTime": "2026-03-02T10:30:00Z"}
            })))
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let created = client(&server)
            .insert_event(&NewEvent::new(
                "Meeting with Jane",
                start,
                start + chrono::Duration::minutes(30),
            ))
            .await
            .unwrap();
        assert_eq!(created.id, "evt-9");
        assert_eq!(
            created.hangout_link.as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
    }
}
