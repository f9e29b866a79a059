use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Address written when a lookup finds nothing. Treated as "no email" everywhere.
pub const PLACEHOLDER_EMAIL: &str = "unknown@example.com";

/// Value of `Lead::source` for everything the scraper produces.
pub const LINKEDIN_SOURCE: &str = "LinkedIn";

fn is_false(b: &bool) -> bool {
    !*b
}

fn default_source() -> String {
    LINKEDIN_SOURCE.to_string()
}

/// Reads `null` as the type's default. Classifier output was stored verbatim
/// and may hold `null` where a label is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Lead ---

/// One person discovered from a people search, progressively filled in by
/// every stage. Keyed by `profile_url`; unknown keys survive a load/save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub profile_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_draft: Option<EmailDraft>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub email_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_review: Option<EmailReview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingRecord>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub meeting_scheduled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub follow_up_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<ProposalRecord>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub send_meeting_info: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lead {
    pub fn new(profile_url: impl Into<String>) -> Self {
        Self {
            profile_url: profile_url.into(),
            name: None,
            role: None,
            company: None,
            company_url: None,
            company_website: None,
            location: None,
            source: default_source(),
            email: None,
            email_draft: None,
            email_sent: false,
            email_sent_time: None,
            email_review: None,
            meeting: None,
            meeting_scheduled: false,
            follow_up_sent: false,
            proposal: None,
            send_meeting_info: false,
            extra: Map::new(),
        }
    }

    /// A lead is worth keeping once it has a name, a role and a company page.
    pub fn is_valid(&self) -> bool {
        [&self.name, &self.role, &self.company_url]
            .iter()
            .all(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// The lead's email unless it is missing or the placeholder.
    pub fn deliverable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case(PLACEHOLDER_EMAIL))
    }

    pub fn review_status(&self) -> Option<ReviewStatus> {
        self.email_review.as_ref().map(|r| r.status)
    }

    pub fn has_replied(&self) -> bool {
        self.review_status() == Some(ReviewStatus::Replied)
    }

    pub fn analysis(&self) -> Option<&ReplyAnalysis> {
        self.email_review.as_ref().and_then(|r| r.analysis.as_ref())
    }

    pub fn subject(&self) -> Option<&str> {
        self.email_draft.as_ref().map(|d| d.subject.as_str())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("there")
    }

    /// File-name-safe form of the profile URL used for per-lead artifacts.
    pub fn artifact_slug(&self) -> String {
        artifact_slug(&self.profile_url)
    }
}

pub fn artifact_slug(profile_url: &str) -> String {
    profile_url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
}

// --- Review ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Replied,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "pending"),
            ReviewStatus::Replied => write!(f, "replied"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailReview {
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_body: Option<String>,
    /// Older files stored this under `client_intent`.
    #[serde(
        default,
        alias = "client_intent",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis: Option<ReplyAnalysis>,
}

impl EmailReview {
    pub fn pending() -> Self {
        Self {
            status: ReviewStatus::Pending,
            full_body: None,
            analysis: None,
        }
    }

    pub fn replied(full_body: String, analysis: ReplyAnalysis) -> Self {
        Self {
            status: ReviewStatus::Replied,
            full_body: Some(full_body),
            analysis: Some(analysis),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interest {
    #[serde(alias = "Interested")]
    Interested,
    #[serde(alias = "not interested", alias = "Not Interested")]
    NotInterested,
    #[default]
    #[serde(other)]
    Other,
}

impl Interest {
    /// Lenient mapping for labels produced by a language model.
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "interested" => Interest::Interested,
            "not_interested" | "uninterested" => Interest::NotInterested,
            _ => Interest::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    MeetingRequested,
    ProposalRequested,
    MoreInfo,
    #[default]
    #[serde(other)]
    None,
}

impl Intent {
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "meeting_requested" | "meeting_request" | "meeting" => Intent::MeetingRequested,
            "proposal_requested" | "proposal_request" | "proposal" => Intent::ProposalRequested,
            "more_info" | "more_information" | "info_requested" => Intent::MoreInfo,
            _ => Intent::None,
        }
    }
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace(['-', ' ', '/'], "_")
}

/// Classified reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interest: Interest,
    #[serde(default, deserialize_with = "null_as_default")]
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_meeting_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl ReplyAnalysis {
    /// Stand-in used when the classifier's output cannot be read.
    pub fn unreadable() -> Self {
        Self {
            summary: "Error".to_string(),
            ..Default::default()
        }
    }

    pub fn wants_meeting(&self) -> bool {
        self.intent == Intent::MeetingRequested
            || (self.interest == Interest::Interested && self.preferred_meeting_time.is_some())
    }

    pub fn wants_proposal(&self) -> bool {
        self.intent == Intent::ProposalRequested
    }
}

// --- Meeting / proposal ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Overlap,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    /// Files written by earlier versions stored the raw event, which has no status.
    #[serde(default = "scheduled")]
    pub status: MeetingStatus,
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "event_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<String>,
    #[serde(
        default,
        deserialize_with = "event_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<String>,
    #[serde(default, alias = "hangoutLink", skip_serializing_if = "Option::is_none")]
    pub hangout_link: Option<String>,
    #[serde(default, alias = "htmlLink", skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn scheduled() -> MeetingStatus {
    MeetingStatus::Scheduled
}

/// Accepts a plain timestamp or a Calendar `{"dateTime": ..}` object.
fn event_time<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(obj)) => obj
            .get("dateTime")
            .or_else(|| obj.get("date"))
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    })
}

impl MeetingRecord {
    pub fn overlap() -> Self {
        Self {
            status: MeetingStatus::Overlap,
            event_id: None,
            start: None,
            end: None,
            hangout_link: None,
            html_link: None,
            note: Some("Reschedule needed".to_string()),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == MeetingStatus::Scheduled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposal_path: String,
}

// --- Campaign ---

/// Who is reaching out and what they are searching for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub search_query: String,
    pub organization_name: String,
    pub user_name: String,
    pub company_email: String,
    pub company_website: String,
    pub company_linkedin: String,
    pub company_logo: Option<String>,
    pub num_profiles: usize,
}

impl Default for Campaign {
    fn default() -> Self {
        Self {
            search_query: "CTO".to_string(),
            organization_name: "Your Company".to_string(),
            user_name: "Sales Team".to_string(),
            company_email: "sales@company.com".to_string(),
            company_website: "https://yourcompany.com".to_string(),
            company_linkedin: "https://linkedin.com/company/yourcompany".to_string(),
            company_logo: None,
            num_profiles: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_replaces_every_non_alphanumeric() {
        assert_eq!(
            artifact_slug("https://www.linkedin.com/in/jane-doe/"),
            "https___www_linkedin_com_in_jane_doe_"
        );
    }

    #[test]
    fn valid_requires_name_role_and_company_url() {
        let mut lead = Lead::new("https://www.linkedin.com/in/a");
        lead.name = Some("Jane".into());
        lead.role = Some("CTO".into());
        assert!(!lead.is_valid());
        lead.company_url = Some("  ".into());
        assert!(!lead.is_valid());
        lead.company_url = Some("https://www.linkedin.com/company/acme/".into());
        assert!(lead.is_valid());
    }

    #[test]
    fn placeholder_is_not_deliverable() {
        let mut lead = Lead::new("u");
        lead.email = Some(PLACEHOLDER_EMAIL.into());
        assert_eq!(lead.deliverable_email(), None);
        lead.email = Some(" jane@acme.com ".into());
        assert_eq!(lead.deliverable_email(), Some("jane@acme.com"));
    }

    #[test]
    fn labels_map_leniently() {
        assert_eq!(Interest::from_label("Not Interested"), Interest::NotInterested);
        assert_eq!(Interest::from_label("maybe"), Interest::Other);
        assert_eq!(Intent::from_label("meeting-requested"), Intent::MeetingRequested);
        assert_eq!(Intent::from_label("Proposal"), Intent::ProposalRequested);
        assert_eq!(Intent::from_label(""), Intent::None);
    }

    #[test]
    fn meeting_reads_raw_calendar_event() {
        let raw = serde_json::json!({
            "id": "evt1",
            "htmlLink": "https://calendar.google.com/e/evt1",
            "hangoutLink": "https://meet.google.com/abc",
            "start": {"dateTime": "2025-03-01T10:00:00Z", "timeZone": "UTC"},
            "end": {"dateTime": "2025-03-01T10:30:00Z"}
        });
        let meeting: MeetingRecord = serde_json::from_value(raw).unwrap();
        assert!(meeting.is_scheduled());
        assert_eq!(meeting.event_id.as_deref(), Some("evt1"));
        assert_eq!(meeting.start.as_deref(), Some("2025-03-01T10:00:00Z"));
        assert_eq!(meeting.hangout_link.as_deref(), Some("https://meet.google.com/abc"));
    }

    #[test]
    fn meeting_wanted_by_intent_or_interest_with_time() {
        let mut a = ReplyAnalysis {
            interest: Interest::Interested,
            ..Default::default()
        };
        assert!(!a.wants_meeting());
        a.preferred_meeting_time = Some("2025-03-01 10:00".into());
        assert!(a.wants_meeting());

        let b = ReplyAnalysis {
            intent: Intent::MeetingRequested,
            ..Default::default()
        };
        assert!(b.wants_meeting());
    }
}
