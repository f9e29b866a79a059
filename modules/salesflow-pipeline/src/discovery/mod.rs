//! LinkedIn people-search scraper.
//!
//! Discovery is a small state machine over a [`PageDriver`]:
//!
//! ```text
//! Search{attempt, page} → CollectUrls → ExtractProfiles → Done(TargetMet)
//!                                          ├─ page < max_pages          → Search{attempt, page + 1}
//!                                          ├─ attempt + 1 < max_attempts → Search{attempt + 1, 1}
//!                                          └─ otherwise                  → Done(Exhausted)
//! ```
//!
//! Backfill attempts search the query's ` OR ` alternatives one at a time.

pub mod extract;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use browser_session::PageSnapshot;
use salesflow_common::Lead;

use crate::pipeline::{PipelineState, Stage};
use crate::store::merge_new_leads;
use crate::traits::{BrowserSource, PageDriver};
use extract::{CompanyLink, ProfileDetails};

/// Max navigation attempts per URL.
const NAV_MAX_ATTEMPTS: u32 = 3;
/// Scroll offset that loads the experience section of a profile.
const PROFILE_SCROLL_Y: u32 = 800;
/// Scroll offset used to coax an empty results page into rendering.
const RESULTS_SCROLL_Y: u32 = 1000;

#[derive(Debug, Clone, TypedBuilder)]
pub struct DiscoverySettings {
    #[builder(default = 3)]
    pub target_count: usize,
    #[builder(default = 3)]
    pub max_pages: u32,
    #[builder(default = 2)]
    pub max_search_attempts: u32,
    /// Navigation retry delay is `retry_base * 3^attempt + jitter`.
    #[builder(default = Duration::from_secs(3))]
    pub retry_base: Duration,
    #[builder(default = Duration::from_secs(1))]
    pub max_jitter: Duration,
    /// Pause before each profile visit.
    #[builder(default = Duration::from_secs(2))]
    pub politeness_delay: Duration,
    #[builder(default)]
    pub credentials: Option<(String, String)>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DiscoverySettings {
    /// No waiting anywhere. For tests.
    pub fn immediate() -> Self {
        Self::builder()
            .retry_base(Duration::ZERO)
            .max_jitter(Duration::ZERO)
            .politeness_delay(Duration::ZERO)
            .build()
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..max))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base * 3u32.pow(attempt) + self.jitter()
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetMet,
    Exhausted,
    NotAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryState {
    Search { attempt: u32, page: u32 },
    CollectUrls { attempt: u32, page: u32, snapshot: PageSnapshot },
    ExtractProfiles { attempt: u32, page: u32, urls: Vec<String> },
    Done(StopReason),
}

/// Where to go once a results page has been fully processed.
pub fn next_after_page(attempt: u32, page: u32, found: usize, settings: &DiscoverySettings) -> DiscoveryState {
    if found >= settings.target_count {
        DiscoveryState::Done(StopReason::TargetMet)
    } else if page < settings.max_pages {
        DiscoveryState::Search {
            attempt,
            page: page + 1,
        }
    } else {
        next_attempt(attempt, settings)
    }
}

/// Where to go when the current query has run out of results.
pub fn next_attempt(attempt: u32, settings: &DiscoverySettings) -> DiscoveryState {
    if attempt + 1 < settings.max_search_attempts {
        DiscoveryState::Search {
            attempt: attempt + 1,
            page: 1,
        }
    } else {
        DiscoveryState::Done(StopReason::Exhausted)
    }
}

/// Query text for a search attempt: the full query first, then each ` OR `
/// alternative in turn, then the full query again.
pub fn query_for_attempt(query: &str, attempt: u32) -> String {
    let alternatives: Vec<&str> = query
        .split(" OR ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if attempt == 0 || alternatives.len() < 2 {
        return query.trim().to_string();
    }
    alternatives
        .get(attempt as usize - 1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| query.trim().to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOutcome {
    pub leads: Vec<Lead>,
    pub pages_visited: u32,
    pub profiles_visited: u32,
    pub rejected: u32,
    pub stop: StopReason,
}

// ---------------------------------------------------------------------------
// Scraper
// ---------------------------------------------------------------------------

pub struct LinkedInScraper<'a> {
    driver: &'a dyn PageDriver,
    settings: &'a DiscoverySettings,
    login_attempted: AtomicBool,
}

impl<'a> LinkedInScraper<'a> {
    pub fn new(driver: &'a dyn PageDriver, settings: &'a DiscoverySettings) -> Self {
        Self {
            driver,
            settings,
            login_attempted: AtomicBool::new(false),
        }
    }

    /// Run the search state machine until `target_count` valid leads are
    /// found or every page and attempt is spent. `known_urls` are skipped.
    pub async fn discover(&self, query: &str, known_urls: &HashSet<String>) -> Result<DiscoveryOutcome> {
        let mut outcome = DiscoveryOutcome {
            leads: Vec::new(),
            pages_visited: 0,
            profiles_visited: 0,
            rejected: 0,
            stop: StopReason::Exhausted,
        };
        let mut seen: HashSet<String> = known_urls.clone();
        let mut state = DiscoveryState::Search {
            attempt: 0,
            page: 1,
        };

        loop {
            state = match state {
                DiscoveryState::Search { attempt, page } => {
                    let q = query_for_attempt(query, attempt);
                    let url = extract::search_url(&q, page);
                    info!(query = %q, attempt, page, "Searching people");
                    match self.open_authenticated(&url).await {
                        Ok(Some(snapshot)) => {
                            outcome.pages_visited += 1;
                            DiscoveryState::CollectUrls {
                                attempt,
                                page,
                                snapshot,
                            }
                        }
                        Ok(None) => DiscoveryState::Done(StopReason::NotAuthenticated),
                        Err(e) => {
                            warn!(url = %url, error = %e, "Search page failed");
                            next_attempt(attempt, self.settings)
                        }
                    }
                }

                DiscoveryState::CollectUrls {
                    attempt,
                    page,
                    snapshot,
                } => {
                    let mut urls = extract::profile_urls(&snapshot.html);
                    if urls.is_empty() {
                        debug!(page, "No results rendered, scrolling and retrying once");
                        match self.driver.scroll_to(RESULTS_SCROLL_Y).await {
                            Ok(scrolled) => urls = extract::profile_urls(&scrolled.html),
                            Err(e) => debug!(error = %e, "Scroll failed"),
                        }
                    }
                    if urls.is_empty() {
                        // This query has no more results.
                        info!(attempt, page, "No profiles on results page");
                        next_attempt(attempt, self.settings)
                    } else {
                        // A page of already-known profiles still moves on to the next page.
                        let fresh: Vec<String> = urls.into_iter().filter(|u| seen.insert(u.clone())).collect();
                        info!(attempt, page, new_profiles = fresh.len(), "Collected profile URLs");
                        DiscoveryState::ExtractProfiles {
                            attempt,
                            page,
                            urls: fresh,
                        }
                    }
                }

                DiscoveryState::ExtractProfiles { attempt, page, urls } => {
                    let mut blocked = false;
                    for url in urls {
                        if outcome.leads.len() >= self.settings.target_count {
                            break;
                        }
                        tokio::time::sleep(self.settings.politeness_delay + self.settings.jitter()).await;
                        outcome.profiles_visited += 1;
                        match self.extract_lead(&url).await {
                            Ok(Some(lead)) if lead.is_valid() => {
                                info!(profile_url = %lead.profile_url, name = ?lead.name, "Lead found");
                                outcome.leads.push(lead);
                            }
                            Ok(Some(lead)) => {
                                debug!(profile_url = %lead.profile_url, "Incomplete profile rejected");
                                outcome.rejected += 1;
                            }
                            Ok(None) => {
                                blocked = true;
                                break;
                            }
                            Err(e) => {
                                warn!(profile_url = %url, error = %e, "Profile extraction failed");
                                outcome.rejected += 1;
                            }
                        }
                    }
                    if blocked {
                        DiscoveryState::Done(StopReason::NotAuthenticated)
                    } else {
                        next_after_page(attempt, page, outcome.leads.len(), self.settings)
                    }
                }

                DiscoveryState::Done(reason) => {
                    outcome.stop = reason;
                    break;
                }
            };
        }

        info!(
            leads = outcome.leads.len(),
            pages = outcome.pages_visited,
            profiles = outcome.profiles_visited,
            rejected = outcome.rejected,
            stop = ?outcome.stop,
            "Discovery finished"
        );
        Ok(outcome)
    }

    /// Navigate with retry and exponential backoff.
    async fn load_with_retry(&self, url: &str) -> Result<PageSnapshot> {
        let mut attempt = 0;
        loop {
            match self.driver.load(url).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if attempt + 1 < NAV_MAX_ATTEMPTS => {
                    let delay = self.settings.retry_delay(attempt);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "Navigation failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Load `url`, logging in once if LinkedIn puts up an auth wall.
    /// `Ok(None)` means we are not authenticated and cannot become so.
    async fn open_authenticated(&self, url: &str) -> Result<Option<PageSnapshot>> {
        let snapshot = self.load_with_retry(url).await?;
        if !extract::is_auth_wall(&snapshot.url) {
            return Ok(Some(snapshot));
        }
        warn!(url = %snapshot.url, "Hit LinkedIn auth wall");
        if !self.login().await? {
            return Ok(None);
        }
        let retried = self.load_with_retry(url).await?;
        Ok((!extract::is_auth_wall(&retried.url)).then_some(retried))
    }

    /// Log in with configured credentials. Only tried once per run.
    async fn login(&self) -> Result<bool> {
        let Some((email, password)) = &self.settings.credentials else {
            warn!("No LinkedIn credentials configured; cannot pass auth wall");
            return Ok(false);
        };
        if self.login_attempted.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        info!("Logging in to LinkedIn");
        self.load_with_retry(extract::LOGIN_URL).await?;
        let after = self
            .driver
            .fill_and_submit(
                &[("#username", email.as_str()), ("#password", password.as_str())],
                "button[type='submit']",
            )
            .await?;
        if extract::is_auth_wall(&after.url) {
            warn!(url = %after.url, "LinkedIn login did not succeed");
            return Ok(false);
        }
        info!("LinkedIn login succeeded");
        Ok(true)
    }

    /// Visit a profile and, when found, its company's About page.
    /// `Ok(None)` means the profile was behind an auth wall we could not pass.
    async fn extract_lead(&self, profile_url: &str) -> Result<Option<Lead>> {
        if self.open_authenticated(profile_url).await?.is_none() {
            return Ok(None);
        }
        let scrolled = self.driver.scroll_to(PROFILE_SCROLL_Y).await?;
        let details = extract::parse_profile(&scrolled.html);

        let company_url = match &details.company_link {
            Some(CompanyLink::Page(url)) => Some(url.clone()),
            Some(CompanyLink::Search) => self.find_company_page(&details).await,
            None => None,
        };

        let company_website = match &company_url {
            Some(url) => self.company_website(url).await,
            None => None,
        };

        let mut lead = Lead::new(profile_url);
        lead.name = details.name;
        lead.role = details.role;
        lead.company = details.company;
        lead.location = details.location;
        lead.company_url = company_url;
        lead.company_website = company_website;
        Ok(Some(lead))
    }

    /// Resolve a company page through company search when the profile only
    /// linked to a generic search.
    async fn find_company_page(&self, details: &ProfileDetails) -> Option<String> {
        let company = details.company.as_deref()?;
        debug!(company, "Company link is a search link, searching companies");
        match self.load_with_retry(&extract::company_search_url(company)).await {
            Ok(snapshot) => extract::parse_company_search(&snapshot.html, company),
            Err(e) => {
                debug!(company, error = %e, "Company search failed");
                None
            }
        }
    }

    async fn company_website(&self, company_url: &str) -> Option<String> {
        match self.load_with_retry(&extract::about_url(company_url)).await {
            Ok(snapshot) => extract::parse_company_website(&snapshot.html),
            Err(e) => {
                debug!(company_url, error = %e, "Company page failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Opens the browser, runs the scraper for the campaign query, merges new
/// leads by profile URL, and always tears the browser down.
pub struct LeadDiscovery {
    browser: Arc<dyn BrowserSource>,
    settings: DiscoverySettings,
}

impl LeadDiscovery {
    pub fn new(browser: Arc<dyn BrowserSource>, settings: DiscoverySettings) -> Self {
        Self { browser, settings }
    }
}

#[async_trait]
impl Stage for LeadDiscovery {
    fn name(&self) -> &'static str {
        "lead_discovery"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let settings = DiscoverySettings {
            target_count: state.campaign.num_profiles,
            ..self.settings.clone()
        };
        let known: HashSet<String> = state.leads.iter().map(|l| l.profile_url.clone()).collect();

        let browser = self.browser.open().await?;
        let result = LinkedInScraper::new(browser.page.as_ref(), &settings)
            .discover(&state.campaign.search_query, &known)
            .await;
        browser.close().await;

        let outcome = result?;
        state.stats.pages_visited += outcome.pages_visited;
        state.stats.profiles_visited += outcome.profiles_visited;
        state.stats.profiles_rejected += outcome.rejected;
        state.stats.leads_discovered += outcome.leads.len() as u32;

        let added = merge_new_leads(&mut state.leads, outcome.leads);
        state.stats.leads_merged += added as u32;
        info!(added, total = state.leads.len(), "New leads merged");

        if outcome.stop == StopReason::NotAuthenticated {
            bail!("LinkedIn session is not authenticated");
        }
        Ok(())
    }
}
