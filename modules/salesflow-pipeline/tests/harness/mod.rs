//! Shared fixture for pipeline integration tests.
//!
//! Every external service is a mock from `salesflow_pipeline::testing`.
//! Artifacts and the lead store live in a tempdir owned by the context.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use salesflow_common::{Campaign, Lead};
use salesflow_pipeline::discovery::extract::search_url;
use salesflow_pipeline::discovery::DiscoverySettings;
use salesflow_pipeline::pipeline::{Pipeline, PipelineState};
use salesflow_pipeline::stats::RunStats;
use salesflow_pipeline::store::{Artifacts, LeadStore};
use salesflow_pipeline::testing::*;
use salesflow_pipeline::workflows::Services;

pub const REPORT_TO: &str = "team@example.com";
pub const QUERY: &str = "CTO";

/// Search results listing `handles`, each with a full profile and About page.
pub fn linkedin(handles: &[&str]) -> MockDriver {
    let mut driver = MockDriver::new().on_page(&search_url(QUERY, 1), search_results_html(handles));
    for h in handles {
        let cap = capitalized(h);
        driver = driver
            .on_page(
                &profile_url(h),
                profile_html(
                    &format!("{cap} Tester"),
                    "CTO",
                    &format!("{cap} Labs"),
                    &format!("/company/{h}-labs/"),
                ),
            )
            .on_page(
                &format!("https://www.linkedin.com/company/{h}-labs/about/"),
                about_html(&format!("https://www.{h}.io")),
            );
    }
    driver
}

fn capitalized(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Mocks for every service. Replace fields before calling [`TestContext::services`].
pub struct TestContext {
    pub dir: TempDir,
    pub driver: Arc<MockDriver>,
    pub browser: Arc<MockBrowserSource>,
    pub finder: Arc<MockEmailFinder>,
    pub email_model: Arc<MockGenerator>,
    pub reply_model: Arc<MockGenerator>,
    pub proposal_model: Arc<MockGenerator>,
    pub mailer: Arc<MockMailer>,
    pub mailbox: Arc<MockMailbox>,
    pub calendar: Arc<MockCalendar>,
    pub renderer: Arc<MockRenderer>,
}

impl TestContext {
    pub fn new() -> Self {
        let driver = Arc::new(MockDriver::new());
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            browser: Arc::new(MockBrowserSource::new(driver.clone())),
            driver,
            finder: Arc::new(MockEmailFinder::new()),
            email_model: Arc::new(MockGenerator::new()),
            reply_model: Arc::new(MockGenerator::new()),
            proposal_model: Arc::new(MockGenerator::new()),
            mailer: Arc::new(MockMailer::new()),
            mailbox: Arc::new(MockMailbox::new()),
            calendar: Arc::new(MockCalendar::new()),
            renderer: Arc::new(MockRenderer::new()),
        }
    }

    pub fn with_driver(mut self, driver: MockDriver) -> Self {
        self.driver = Arc::new(driver);
        self.browser = Arc::new(MockBrowserSource::new(self.driver.clone()));
        self
    }

    pub fn services(&self) -> Services {
        Services::builder()
            .browser(self.browser.clone())
            .renderer(self.renderer.clone())
            .email_finder(Some(self.finder.clone()))
            .email_model(Some(self.email_model.clone()))
            .reply_model(Some(self.reply_model.clone()))
            .proposal_model(Some(self.proposal_model.clone()))
            .mailer(Some(self.mailer.clone()))
            .mailbox(Some(self.mailbox.clone()))
            .calendar(Some(self.calendar.clone()))
            .report_email(REPORT_TO.to_string())
            .discovery(DiscoverySettings::immediate())
            .send_delay(Duration::ZERO)
            .build()
    }

    pub fn store(&self) -> LeadStore {
        LeadStore::new(self.dir.path().join("final_leads.json"))
    }

    pub fn artifacts(&self) -> Artifacts {
        Artifacts::new(self.dir.path().join("outputs"))
    }

    pub fn campaign(&self, num_profiles: usize) -> Campaign {
        Campaign {
            search_query: QUERY.to_string(),
            num_profiles,
            ..Campaign::default()
        }
    }

    /// Load the store, run `pipeline` checkpointing back to it, and return
    /// the final state.
    pub async fn run(&self, pipeline: Pipeline, num_profiles: usize) -> PipelineState {
        let leads = self.store().load().expect("store loads");
        let mut state = PipelineState::new(leads, self.campaign(num_profiles), self.artifacts());
        pipeline.checkpoint_to(self.store()).run(&mut state).await;
        state
    }

    pub fn seed(&self, leads: &[Lead]) {
        self.store().save(leads).expect("store saves");
    }

    pub fn stored(&self, handle: &str) -> Lead {
        let url = profile_url(handle);
        self.store()
            .load()
            .expect("store loads")
            .into_iter()
            .find(|l| l.profile_url == url)
            .unwrap_or_else(|| panic!("{url} not in store"))
    }

    pub fn artifact_count(&self, kind: salesflow_pipeline::store::ArtifactKind) -> usize {
        std::fs::read_dir(self.artifacts().dir(kind))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn no_failures(stats: &RunStats) {
    assert_eq!(stats.stage_failures, 0, "unexpected stage failure:\n{stats}");
}
