// Test mocks for the salesflow pipeline.
//
// One mock per trait boundary in `traits.rs`:
// - MockDriver (PageDriver) — URL→HTML pages, auth walls, scripted failures
// - MockBrowserSource (BrowserSource) — hands out one shared MockDriver
// - MockEmailFinder (EmailFinder) — domain→email map
// - MockGenerator (TextGenerator) — prompt-substring→response rules
// - MockMailer (Mailer) — records what was sent
// - MockMailbox (Mailbox) — sender→reply map
// - MockCalendar (CalendarApi) — in-memory event list
// - MockRenderer (DocumentRenderer) — writes a stub PDF or fails
//
// Plus lead fixtures and LinkedIn HTML builders.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use browser_session::PageSnapshot;
use salesflow_common::{EmailDraft, EmailReview, Lead, ReplyAnalysis};

use crate::discovery::extract;
use crate::traits::{
    BookedMeeting, BrowserSource, CalendarApi, DocumentRenderer, EmailFinder, Mailbox, Mailer,
    MeetingRequest, OpenBrowser, OutgoingEmail, PageDriver, TextGenerator,
};

pub const AUTH_WALL_URL: &str = "https://www.linkedin.com/authwall?trk=test";
pub const FEED_URL: &str = "https://www.linkedin.com/feed/";

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

/// HashMap-based page driver. Loading an unregistered URL is an error.
/// Builder pattern: `.on_page()`, `.on_scrolled()`, `.walled()`, `.failing()`.
pub struct MockDriver {
    pages: HashMap<String, String>,
    scrolled: HashMap<String, String>,
    walled: HashSet<String>,
    login_succeeds: bool,
    failures: Mutex<HashMap<String, u32>>,
    logged_in: Mutex<bool>,
    current: Mutex<Option<String>>,
    visits: Mutex<Vec<String>>,
    logins: AtomicUsize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            scrolled: HashMap::new(),
            walled: HashSet::new(),
            login_succeeds: true,
            failures: Mutex::new(HashMap::new()),
            logged_in: Mutex::new(false),
            current: Mutex::new(None),
            visits: Mutex::new(Vec::new()),
            logins: AtomicUsize::new(0),
        }
    }

    pub fn on_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    /// HTML returned by `scroll_to` while `url` is the current page.
    pub fn on_scrolled(mut self, url: &str, html: impl Into<String>) -> Self {
        self.scrolled.insert(url.to_string(), html.into());
        self
    }

    /// `url` redirects to the auth wall until a login succeeds.
    pub fn walled(mut self, url: &str) -> Self {
        self.walled.insert(url.to_string());
        self
    }

    pub fn login_fails(mut self) -> Self {
        self.login_succeeds = false;
        self
    }

    /// The next `times` loads of `url` fail.
    pub fn failing(self, url: &str, times: u32) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(url.to_string(), times);
        }
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn visit_count(&self, url: &str) -> usize {
        self.visits().iter().filter(|v| *v == url).count()
    }

    pub fn login_attempts(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    fn set_current(&self, url: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(url.to_string());
        }
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.lock().map(|l| *l).unwrap_or(false)
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn load(&self, url: &str) -> Result<PageSnapshot> {
        if let Ok(mut visits) = self.visits.lock() {
            visits.push(url.to_string());
        }
        if let Ok(mut failures) = self.failures.lock() {
            if let Some(left) = failures.get_mut(url) {
                if *left > 0 {
                    *left -= 1;
                    bail!("MockDriver: scripted failure for {url}");
                }
            }
        }
        if url == extract::LOGIN_URL {
            self.set_current(url);
            return Ok(PageSnapshot {
                url: url.to_string(),
                html: "<form><input id='username'><input id='password'></form>".to_string(),
            });
        }
        if self.walled.contains(url) && !self.is_logged_in() {
            self.set_current(AUTH_WALL_URL);
            return Ok(PageSnapshot {
                url: AUTH_WALL_URL.to_string(),
                html: "<html><body>Sign in</body></html>".to_string(),
            });
        }
        let html = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("MockDriver: no page registered for {url}"))?;
        self.set_current(url);
        Ok(PageSnapshot {
            url: url.to_string(),
            html,
        })
    }

    async fn scroll_to(&self, _y: u32) -> Result<PageSnapshot> {
        let url = self
            .current
            .lock()
            .ok()
            .and_then(|c| c.clone())
            .ok_or_else(|| anyhow!("MockDriver: scroll with no page loaded"))?;
        let html = self
            .scrolled
            .get(&url)
            .or_else(|| self.pages.get(&url))
            .cloned()
            .unwrap_or_default();
        Ok(PageSnapshot { url, html })
    }

    async fn fill_and_submit(&self, fields: &[(&str, &str)], _submit: &str) -> Result<PageSnapshot> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if fields.len() != 2 {
            bail!("MockDriver: expected username and password fields");
        }
        let url = if self.login_succeeds {
            if let Ok(mut logged_in) = self.logged_in.lock() {
                *logged_in = true;
            }
            FEED_URL
        } else {
            "https://www.linkedin.com/checkpoint/challenge/1"
        };
        self.set_current(url);
        Ok(PageSnapshot {
            url: url.to_string(),
            html: String::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockBrowserSource
// ---------------------------------------------------------------------------

pub struct MockBrowserSource {
    driver: Arc<MockDriver>,
    opens: AtomicUsize,
}

impl MockBrowserSource {
    pub fn new(driver: Arc<MockDriver>) -> Self {
        Self {
            driver,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSource for MockBrowserSource {
    async fn open(&self) -> Result<OpenBrowser> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(OpenBrowser::new(self.driver.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockEmailFinder
// ---------------------------------------------------------------------------

/// Domain lookups. Unregistered domains are errors, like an API failure.
#[derive(Default)]
pub struct MockEmailFinder {
    emails: HashMap<String, Option<String>>,
    lookups: Mutex<Vec<String>>,
}

impl MockEmailFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_domain(mut self, domain: &str, email: &str) -> Self {
        self.emails.insert(domain.to_string(), Some(email.to_string()));
        self
    }

    /// Lookup succeeds but finds nobody.
    pub fn empty_domain(mut self, domain: &str) -> Self {
        self.emails.insert(domain.to_string(), None);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailFinder for MockEmailFinder {
    async fn find_email(&self, domain: &str) -> Result<Option<String>> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(domain.to_string());
        }
        self.emails
            .get(domain)
            .cloned()
            .ok_or_else(|| anyhow!("MockEmailFinder: no domain registered for {domain}"))
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Returns the response of the first rule whose needle occurs in the prompt.
/// No matching rule is an error.
#[derive(Default)]
pub struct MockGenerator {
    rules: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_prompt(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), response.to_string()));
        self
    }

    /// Respond to every prompt.
    pub fn always(self, response: &str) -> Self {
        self.on_prompt("", response)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| anyhow!("MockGenerator: no response registered for prompt"))
    }
}

// ---------------------------------------------------------------------------
// MockMailer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail_for: HashSet<String>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to `to` fail.
    pub fn fail_for(mut self, to: &str) -> Self {
        self.fail_for.insert(to.to_string());
        self
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutgoingEmail> {
        self.sent().into_iter().filter(|e| e.to == to).collect()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if self.fail_for.contains(&email.to) {
            bail!("MockMailer: refused recipient {}", email.to);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockMailbox
// ---------------------------------------------------------------------------

/// Replies keyed by sender. Message ids are `msg-<sender>`.
#[derive(Default)]
pub struct MockMailbox {
    replies: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
    read: Mutex<Vec<String>>,
    fail_search: bool,
}

impl MockMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_reply(mut self, from: &str, body: &str) -> Self {
        self.replies.insert(from.to_string(), body.to_string());
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn read(&self) -> Vec<String> {
        self.read.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn sender(query: &str) -> Option<&str> {
        query
            .split_whitespace()
            .find_map(|term| term.strip_prefix("from:"))
    }
}

#[async_trait]
impl Mailbox for MockMailbox {
    async fn find_message(&self, query: &str) -> Result<Option<String>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        if self.fail_search {
            bail!("MockMailbox: search failed");
        }
        Ok(Self::sender(query)
            .filter(|from| self.replies.contains_key(*from))
            .map(|from| format!("msg-{from}")))
    }

    async fn message_body(&self, message_id: &str) -> Result<Option<String>> {
        let from = message_id
            .strip_prefix("msg-")
            .ok_or_else(|| anyhow!("MockMailbox: unknown message {message_id}"))?;
        Ok(self.replies.get(from).cloned())
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        if let Ok(mut read) = self.read.lock() {
            read.push(message_id.to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockCalendar
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockCalendar {
    events: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    booked: Mutex<Vec<MeetingRequest>>,
    fail_listing: bool,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// An existing event occupying `[start, start + minutes)`.
    pub fn busy(self, start: DateTime<Utc>, minutes: i64) -> Self {
        if let Ok(mut events) = self.events.lock() {
            events.push((start, start + TimeDelta::minutes(minutes)));
        }
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn booked(&self) -> Vec<MeetingRequest> {
        self.booked.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize> {
        if self.fail_listing {
            bail!("MockCalendar: listing failed");
        }
        let events = self.events.lock().map_err(|_| anyhow!("MockCalendar: poisoned"))?;
        Ok(events.iter().filter(|(s, e)| *s < end && *e > start).count())
    }

    async fn book(&self, request: &MeetingRequest) -> Result<BookedMeeting> {
        let mut booked = self.booked.lock().map_err(|_| anyhow!("MockCalendar: poisoned"))?;
        booked.push(request.clone());
        if let Ok(mut events) = self.events.lock() {
            events.push((request.start, request.end));
        }
        let n = booked.len();
        Ok(BookedMeeting {
            event_id: format!("evt-{n}"),
            html_link: Some(format!("https://calendar.google.com/event?eid=evt-{n}")),
            hangout_link: Some(format!("https://meet.google.com/mock-{n}")),
        })
    }
}

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRenderer {
    fail: bool,
    rendered: AtomicUsize,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentRenderer for MockRenderer {
    async fn render_pdf(&self, html: &str, output: &Path) -> Result<()> {
        if self.fail {
            bail!("MockRenderer: renderer unavailable");
        }
        std::fs::write(output, format!("%PDF-mock\n{}", html.len()))?;
        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lead fixtures
// ---------------------------------------------------------------------------

pub fn profile_url(handle: &str) -> String {
    format!("https://www.linkedin.com/in/{handle}/")
}

/// A valid discovered lead at `<handle>.io`.
pub fn discovered_lead(handle: &str) -> Lead {
    let mut lead = Lead::new(profile_url(handle));
    lead.name = Some(format!("{} Tester", capitalize(handle)));
    lead.role = Some("CTO".to_string());
    lead.company = Some(format!("{} Labs", capitalize(handle)));
    lead.company_url = Some(format!("https://www.linkedin.com/company/{handle}-labs/"));
    lead.company_website = Some(format!("https://www.{handle}.io"));
    lead
}

/// Discovered, enriched, drafted and sent `hours_ago`.
pub fn sent_lead(handle: &str, hours_ago: i64) -> Lead {
    let mut lead = discovered_lead(handle);
    lead.email = Some(format!("{handle}@{handle}.io"));
    lead.email_draft = Some(EmailDraft {
        subject: format!("Exploring AI for {} Labs", capitalize(handle)),
        body: "<p>Hi</p>".to_string(),
        cta: None,
    });
    lead.email_sent = true;
    lead.email_sent_time = Some(chrono::Local::now().naive_local() - TimeDelta::hours(hours_ago));
    lead
}

pub fn replied_lead(handle: &str, analysis: ReplyAnalysis) -> Lead {
    let mut lead = sent_lead(handle, 48);
    lead.email_review = Some(EmailReview::replied("Sounds good.".to_string(), analysis));
    lead
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// LinkedIn HTML builders
// ---------------------------------------------------------------------------

/// People-search results listing `handles`.
pub fn search_results_html(handles: &[&str]) -> String {
    let items: String = handles
        .iter()
        .map(|h| {
            format!(
                r#"<li><span class="entity-result__title-text"><a href="https://www.linkedin.com/in/{h}/?miniProfileUrn=x">{h}</a></span></li>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="search-results-container"><ul>{items}</ul></div></body></html>"#)
}

/// Profile page in the multi-company layout. `company_href` may be a
/// `/company/` page or a `search/results/all` link.
pub fn profile_html(name: &str, role: &str, company: &str, company_href: &str) -> String {
    format!(
        r#"<html><body>
<h1 class="text-heading-xlarge">{name}</h1>
<div class="text-body-small inline t-black--light break-words">Pune, Maharashtra, India</div>
<ul>
  <li class="artdeco-list__item">
    <a data-field="experience_company_logo" href="{company_href}"></a>
    <div class="display-flex align-items-center mr1 t-bold"><span aria-hidden="true">{role}</span></div>
    <span class="t-14 t-normal"><span aria-hidden="true">{company} · Full-time</span></span>
  </li>
</ul>
</body></html>"#
    )
}

/// A profile with a name only; never a valid lead.
pub fn bare_profile_html(name: &str) -> String {
    format!(r#"<html><body><h1 class="text-heading-xlarge">{name}</h1></body></html>"#)
}

pub fn about_html(website: &str) -> String {
    format!(
        r#"<html><body><dl><dd class="mb4 t-black--light text-body-medium"><a href="{website}">{website}</a></dd></dl></body></html>"#
    )
}

pub fn company_search_html(results: &[(&str, &str)]) -> String {
    let items: String = results
        .iter()
        .map(|(name, href)| {
            format!(
                r#"<li class="entity-result__item"><span class="entity-result__title-text"><a href="{href}">{name}</a></span></li>"#
            )
        })
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}
