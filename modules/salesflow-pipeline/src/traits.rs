// Trait abstractions for every external collaborator a stage touches.
//
// PageDriver     — one browser tab (CdpPage in production)
// BrowserSource  — launches or attaches the browser discovery drives
// EmailFinder    — domain → contact email (Hunter)
// TextGenerator  — prompt → text (Gemini, OpenAI, DeepSeek)
// Mailer         — outbound mail (SMTP)
// Mailbox        — reply lookup (Gmail)
// CalendarApi    — overlap check + booking (Google Calendar)
// DocumentRenderer — HTML → PDF (wkhtmltopdf)
//
// Stages only see these traits, so the whole pipeline runs against the
// mocks in `testing.rs` with no browser, network or mail server.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use browser_session::{CdpPage, LaunchOptions, PageSnapshot, ProfileSession};

// ---------------------------------------------------------------------------
// PageDriver
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and return the rendered page.
    async fn load(&self, url: &str) -> Result<PageSnapshot>;

    /// Scroll the current page to `y` pixels and re-snapshot.
    async fn scroll_to(&self, y: u32) -> Result<PageSnapshot>;

    /// Fill form fields by selector, click `submit`, return the page navigated to.
    async fn fill_and_submit(&self, fields: &[(&str, &str)], submit: &str)
        -> Result<PageSnapshot>;
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn load(&self, url: &str) -> Result<PageSnapshot> {
        Ok(CdpPage::load(self, url).await?)
    }

    async fn scroll_to(&self, y: u32) -> Result<PageSnapshot> {
        Ok(CdpPage::scroll_to(self, y).await?)
    }

    async fn fill_and_submit(
        &self,
        fields: &[(&str, &str)],
        submit: &str,
    ) -> Result<PageSnapshot> {
        Ok(CdpPage::fill_and_submit(self, fields, submit).await?)
    }
}

// ---------------------------------------------------------------------------
// BrowserSource
// ---------------------------------------------------------------------------

/// An open browser: the page to drive plus the session to tear down.
pub struct OpenBrowser {
    pub page: Arc<dyn PageDriver>,
    session: Option<ProfileSession>,
}

impl OpenBrowser {
    pub fn new(page: Arc<dyn PageDriver>) -> Self {
        Self {
            page,
            session: None,
        }
    }

    pub async fn close(self) {
        drop(self.page);
        if let Some(session) = self.session {
            session.shutdown().await;
        }
    }
}

#[async_trait]
pub trait BrowserSource: Send + Sync {
    async fn open(&self) -> Result<OpenBrowser>;
}

/// Chrome bound to a saved login profile, launched fresh or attached.
pub struct ChromeSource {
    pub options: LaunchOptions,
    /// Resolve the profile by signed-in account instead of `options.profile_dir`.
    pub profile_email: Option<String>,
    /// Attach to this debugging URL instead of launching.
    pub debug_url: Option<String>,
}

#[async_trait]
impl BrowserSource for ChromeSource {
    async fn open(&self) -> Result<OpenBrowser> {
        let session = match (&self.debug_url, &self.profile_email) {
            (Some(url), _) => ProfileSession::attach(url, &self.options).await?,
            (None, Some(email)) => ProfileSession::launch_for_email(email, &self.options).await?,
            (None, None) => ProfileSession::launch(&self.options).await?,
        };
        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                session.shutdown().await;
                return Err(e.into());
            }
        };
        Ok(OpenBrowser {
            page: Arc::new(page),
            session: Some(session),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailFinder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EmailFinder: Send + Sync {
    /// Best contact address for `domain`, `None` when the lookup found nothing.
    async fn find_email(&self, domain: &str) -> Result<Option<String>>;
}

#[async_trait]
impl EmailFinder for hunter_client::HunterClient {
    async fn find_email(&self, domain: &str) -> Result<Option<String>> {
        let result = self.domain_search(domain).await?;
        Ok(result.first_email().map(String::from))
    }
}

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl TextGenerator for ai_client::Gemini {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(ai_client::Gemini::generate(self, prompt).await?)
    }
}

#[async_trait]
impl TextGenerator for ai_client::OpenAi {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(self.complete(prompt).await?)
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

impl OutgoingEmail {
    pub fn html(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            html: true,
        }
    }

    pub fn plain(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            html: false,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Id of the first message matching a Gmail search query.
    async fn find_message(&self, query: &str) -> Result<Option<String>>;

    /// Decoded text of a message, plain text preferred.
    async fn message_body(&self, message_id: &str) -> Result<Option<String>>;

    async fn mark_read(&self, message_id: &str) -> Result<()>;
}

#[async_trait]
impl Mailbox for google_client::GmailClient {
    async fn find_message(&self, query: &str) -> Result<Option<String>> {
        let found = self.search(query, 1).await?;
        Ok(found.into_iter().next().map(|m| m.id))
    }

    async fn message_body(&self, message_id: &str) -> Result<Option<String>> {
        Ok(google_client::GmailClient::message_body(self, message_id).await?)
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        Ok(google_client::GmailClient::mark_read(self, message_id).await?)
    }
}

// ---------------------------------------------------------------------------
// CalendarApi
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequest {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookedMeeting {
    pub event_id: String,
    pub html_link: Option<String>,
    pub hangout_link: Option<String>,
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Number of events overlapping `[start, end)`.
    async fn overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize>;

    async fn book(&self, request: &MeetingRequest) -> Result<BookedMeeting>;
}

#[async_trait]
impl CalendarApi for google_client::CalendarClient {
    async fn overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize> {
        Ok(self.events_between(start, end).await?.len())
    }

    async fn book(&self, request: &MeetingRequest) -> Result<BookedMeeting> {
        let mut event = google_client::NewEvent::new(&request.summary, request.start, request.end)
            .description(&request.description)
            .with_meet(format!("meeting-{}", uuid::Uuid::new_v4()));
        if let Some(email) = &request.attendee {
            event = event.attendee(email);
        }
        let created = self.insert_event(&event).await?;
        Ok(BookedMeeting {
            event_id: created.id,
            html_link: created.html_link,
            hangout_link: created.hangout_link,
        })
    }
}

// ---------------------------------------------------------------------------
// DocumentRenderer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render `html` to a PDF at `output`.
    async fn render_pdf(&self, html: &str, output: &Path) -> Result<()>;
}
