//! Discovery tests: scripted LinkedIn pages → LinkedInScraper / LeadDiscovery → assert.
//!
//! Every page comes from MockDriver. No browser, no network.

use std::collections::HashSet;
use std::sync::Arc;

use salesflow_common::Campaign;
use salesflow_pipeline::discovery::extract::search_url;
use salesflow_pipeline::discovery::{DiscoverySettings, LeadDiscovery, LinkedInScraper, StopReason};
use salesflow_pipeline::pipeline::{PipelineState, Stage};
use salesflow_pipeline::store::Artifacts;
use salesflow_pipeline::testing::*;

const QUERY: &str = "CTO";

fn settings(target: usize) -> DiscoverySettings {
    DiscoverySettings {
        target_count: target,
        ..DiscoverySettings::immediate()
    }
}

fn about_url(handle: &str) -> String {
    format!("https://www.linkedin.com/company/{handle}-labs/about/")
}

/// Registers a complete profile for `handle` plus its company About page.
fn with_profile(driver: MockDriver, handle: &str) -> MockDriver {
    driver
        .on_page(
            &profile_url(handle),
            profile_html(
                &format!("{handle} Tester"),
                "CTO",
                &format!("{handle} Labs"),
                &format!("/company/{handle}-labs/"),
            ),
        )
        .on_page(&about_url(handle), about_html(&format!("https://www.{handle}.io")))
}

// ---------------------------------------------------------------------------
// Search and pagination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stops_as_soon_as_target_is_met() {
    let mut driver = MockDriver::new().on_page(
        &search_url(QUERY, 1),
        search_results_html(&["ann", "bob", "cat"]),
    );
    for h in ["ann", "bob", "cat"] {
        driver = with_profile(driver, h);
    }
    let settings = settings(2);

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::TargetMet);
    assert_eq!(outcome.leads.len(), 2);
    assert_eq!(outcome.profiles_visited, 2);
    assert_eq!(driver.visit_count(&profile_url("cat")), 0);
    assert_eq!(driver.visit_count(&search_url(QUERY, 2)), 0);

    let ann = &outcome.leads[0];
    assert_eq!(ann.name.as_deref(), Some("ann Tester"));
    assert_eq!(ann.role.as_deref(), Some("CTO"));
    assert_eq!(ann.company.as_deref(), Some("ann Labs"));
    assert_eq!(
        ann.company_url.as_deref(),
        Some("https://www.linkedin.com/company/ann-labs/")
    );
    assert_eq!(ann.company_website.as_deref(), Some("https://www.ann.io"));
    assert_eq!(ann.location.as_deref(), Some("Pune, Maharashtra, India"));
}

#[tokio::test]
async fn incomplete_profiles_are_rejected_and_next_page_searched() {
    let driver = with_profile(
        with_profile(MockDriver::new(), "ann"),
        "bob",
    )
    .on_page(&search_url(QUERY, 1), search_results_html(&["ann", "ghost"]))
    .on_page(&profile_url("ghost"), bare_profile_html("Ghost"))
    .on_page(&search_url(QUERY, 2), search_results_html(&["bob"]));
    let settings = settings(2);

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::TargetMet);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.rejected, 1);
    let urls: Vec<&str> = outcome.leads.iter().map(|l| l.profile_url.as_str()).collect();
    assert_eq!(urls, vec![profile_url("ann"), profile_url("bob")]);
}

#[tokio::test]
async fn backfill_searches_each_alternative() {
    let query = "CTO AI OR CEO AI";
    let driver = with_profile(with_profile(MockDriver::new(), "ann"), "bob")
        .on_page(&search_url(query, 1), search_results_html(&["ann"]))
        .on_page(&search_url("CTO AI", 1), search_results_html(&["ann", "bob"]));
    let settings = DiscoverySettings {
        max_pages: 1,
        ..settings(2)
    };

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(query, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::TargetMet);
    assert_eq!(outcome.leads.len(), 2);
    // ann was already seen on the first attempt.
    assert_eq!(driver.visit_count(&profile_url("ann")), 1);
}

#[tokio::test]
async fn exhausted_when_results_run_out() {
    let driver = with_profile(MockDriver::new(), "ann")
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
        .on_page(&search_url(QUERY, 2), search_results_html(&[]));
    let settings = DiscoverySettings {
        max_pages: 2,
        ..settings(5)
    };

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.leads.len(), 1);
    assert_eq!(driver.visit_count(&profile_url("ann")), 1);
}

#[tokio::test]
async fn empty_results_are_scrolled_once() {
    let driver = with_profile(MockDriver::new(), "ann")
        .on_page(&search_url(QUERY, 1), search_results_html(&[]))
        .on_scrolled(&search_url(QUERY, 1), search_results_html(&["ann"]));
    let settings = settings(1);

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::TargetMet);
    assert_eq!(outcome.leads[0].profile_url, profile_url("ann"));
}

#[tokio::test]
async fn known_profiles_are_skipped() {
    let driver = with_profile(with_profile(MockDriver::new(), "ann"), "bob")
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann", "bob"]));
    let settings = settings(1);
    let known: HashSet<String> = [profile_url("ann")].into_iter().collect();

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &known)
        .await
        .unwrap();

    assert_eq!(outcome.leads.len(), 1);
    assert_eq!(outcome.leads[0].profile_url, profile_url("bob"));
    assert_eq!(driver.visit_count(&profile_url("ann")), 0);
}

#[tokio::test]
async fn page_of_known_profiles_moves_on_to_next_page() {
    let driver = with_profile(MockDriver::new(), "cat")
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann", "bob"]))
        .on_page(&search_url(QUERY, 2), search_results_html(&["cat"]));
    let settings = settings(1);
    let known: HashSet<String> = [profile_url("ann"), profile_url("bob")].into_iter().collect();

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &known)
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::TargetMet);
    assert_eq!(driver.visit_count(&search_url(QUERY, 1)), 1);
    assert_eq!(driver.visit_count(&search_url(QUERY, 2)), 1);
    assert_eq!(outcome.leads.len(), 1);
    assert_eq!(outcome.leads[0].profile_url, profile_url("cat"));
    assert_eq!(driver.visit_count(&profile_url("ann")), 0);
}

// ---------------------------------------------------------------------------
// Navigation failures and auth walls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn navigation_is_retried_with_backoff() {
    let driver = with_profile(MockDriver::new(), "ann")
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
        .failing(&search_url(QUERY, 1), 2);
    let settings = settings(1);

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::TargetMet);
    assert_eq!(driver.visit_count(&search_url(QUERY, 1)), 3);
}

#[tokio::test]
async fn auth_wall_triggers_a_single_login() {
    let driver = with_profile(MockDriver::new(), "ann")
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
        .walled(&search_url(QUERY, 1))
        .walled(&profile_url("ann"));
    let settings = DiscoverySettings {
        credentials: Some(("me@example.com".into(), "secret".into())),
        ..settings(1)
    };

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::TargetMet);
    assert_eq!(outcome.leads.len(), 1);
    assert_eq!(driver.login_attempts(), 1);
}

#[tokio::test]
async fn failed_login_stops_discovery() {
    let driver = with_profile(MockDriver::new(), "ann")
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
        .walled(&search_url(QUERY, 1))
        .login_fails();
    let settings = DiscoverySettings {
        credentials: Some(("me@example.com".into(), "wrong".into())),
        ..settings(1)
    };

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::NotAuthenticated);
    assert!(outcome.leads.is_empty());
    assert_eq!(driver.login_attempts(), 1);
}

#[tokio::test]
async fn no_credentials_means_no_login_attempt() {
    let driver = MockDriver::new()
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
        .walled(&search_url(QUERY, 1));
    let settings = settings(1);

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop, StopReason::NotAuthenticated);
    assert_eq!(driver.login_attempts(), 0);
}

// ---------------------------------------------------------------------------
// Company resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_link_falls_back_to_company_search() {
    let company_search = "https://www.linkedin.com/search/results/companies/?keywords=Acme+Robotics";
    let driver = MockDriver::new()
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
        .on_page(
            &profile_url("ann"),
            profile_html(
                "Ann Tester",
                "CTO",
                "Acme Robotics",
                "https://www.linkedin.com/search/results/all/?keywords=Acme",
            ),
        )
        .on_page(
            company_search,
            company_search_html(&[
                ("Unrelated Inc", "/company/unrelated/"),
                ("Acme Robotics", "/company/acme-robotics/"),
            ]),
        )
        .on_page(
            "https://www.linkedin.com/company/acme-robotics/about/",
            about_html("https://acme-robotics.com"),
        );
    let settings = settings(1);

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    let lead = &outcome.leads[0];
    assert_eq!(
        lead.company_url.as_deref(),
        Some("https://www.linkedin.com/company/acme-robotics/")
    );
    assert_eq!(lead.company_website.as_deref(), Some("https://acme-robotics.com"));
}

#[tokio::test]
async fn missing_about_page_still_yields_a_lead() {
    let driver = MockDriver::new()
        .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
        .on_page(
            &profile_url("ann"),
            profile_html("Ann Tester", "CTO", "Ann Labs", "/company/ann-labs/"),
        );
    let settings = settings(1);

    let outcome = LinkedInScraper::new(&driver, &settings)
        .discover(QUERY, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.leads.len(), 1);
    assert!(outcome.leads[0].company_website.is_none());
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

fn state(dir: &std::path::Path, leads: Vec<salesflow_common::Lead>, num_profiles: usize) -> PipelineState {
    let campaign = Campaign {
        search_query: QUERY.to_string(),
        num_profiles,
        ..Campaign::default()
    };
    PipelineState::new(leads, campaign, Artifacts::new(dir))
}

#[tokio::test]
async fn stage_merges_new_leads_and_opens_browser_once() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(
        with_profile(with_profile(MockDriver::new(), "ann"), "bob")
            .on_page(&search_url(QUERY, 1), search_results_html(&["ann", "bob"])),
    );
    let browser = Arc::new(MockBrowserSource::new(driver.clone()));
    let stage = LeadDiscovery::new(browser.clone(), DiscoverySettings::immediate());

    let mut state = state(dir.path(), vec![discovered_lead("ann")], 1);
    stage.run(&mut state).await.unwrap();

    assert_eq!(browser.opens(), 1);
    assert_eq!(state.leads.len(), 2);
    assert_eq!(state.leads[1].profile_url, profile_url("bob"));
    assert_eq!(state.stats.leads_merged, 1);
    assert_eq!(driver.visit_count(&profile_url("ann")), 0);
}

#[tokio::test]
async fn stage_fails_when_not_authenticated() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(
        MockDriver::new()
            .on_page(&search_url(QUERY, 1), search_results_html(&["ann"]))
            .walled(&search_url(QUERY, 1)),
    );
    let browser = Arc::new(MockBrowserSource::new(driver));
    let stage = LeadDiscovery::new(browser.clone(), DiscoverySettings::immediate());

    let mut state = state(dir.path(), Vec::new(), 3);
    assert!(stage.run(&mut state).await.is_err());
    assert_eq!(browser.opens(), 1);
    assert!(state.leads.is_empty());
}
