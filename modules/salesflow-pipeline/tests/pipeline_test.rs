//! End-to-end pipeline tests: mocked LinkedIn, Hunter, models, SMTP and Gmail
//! → workflows → lead store on disk.

mod harness;

use std::sync::Arc;

use harness::{linkedin, no_failures, TestContext, REPORT_TO};
use salesflow_common::{ReviewStatus, PLACEHOLDER_EMAIL};
use salesflow_pipeline::store::ArtifactKind;
use salesflow_pipeline::testing::*;
use salesflow_pipeline::workflows::{self, Services};

const DRAFT_JSON: &str = r#"{"subject": "Exploring AI for your team", "body": "<p>Hi there</p>"}"#;

fn acquisition_context() -> TestContext {
    let mut ctx = TestContext::new().with_driver(linkedin(&["ann", "bob"]));
    ctx.finder = Arc::new(
        MockEmailFinder::new()
            .on_domain("ann.io", "ann@ann.io")
            .empty_domain("bob.io"),
    );
    ctx.email_model = Arc::new(MockGenerator::new().always(DRAFT_JSON));
    ctx
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquisition_takes_new_leads_to_first_contact() {
    let ctx = acquisition_context();

    let state = ctx.run(workflows::acquisition(&ctx.services()), 2).await;
    no_failures(&state.stats);

    assert_eq!(state.stats.leads_merged, 2);
    assert_eq!(state.stats.emails_found, 1);
    assert_eq!(state.stats.drafts_written, 2);
    assert_eq!(state.stats.emails_sent, 1);

    let ann = ctx.stored("ann");
    assert_eq!(ann.email.as_deref(), Some("ann@ann.io"));
    assert!(ann.email_sent);
    assert!(ann.email_sent_time.is_some());
    assert_eq!(ann.review_status(), Some(ReviewStatus::Pending));
    assert_eq!(ann.subject(), Some("Exploring AI for your team"));

    let bob = ctx.stored("bob");
    assert_eq!(bob.email.as_deref(), Some(PLACEHOLDER_EMAIL));
    assert!(bob.email_draft.is_some());
    assert!(!bob.email_sent);
    assert!(bob.email_review.is_none());

    let sent = ctx.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ann@ann.io");
    assert!(sent[0].html);
    assert!(sent[0].body.starts_with("<p>Hi there</p>"));
    assert!(sent[0].body.contains("Best regards"));

    assert_eq!(ctx.artifact_count(ArtifactKind::Email), 2);
    assert_eq!(ctx.artifact_count(ArtifactKind::NonReplied), 1);
    assert!(ctx.mailbox.queries()[0].starts_with("from:ann@ann.io subject:\"Exploring AI for your team\" after:"));
}

#[tokio::test]
async fn second_acquisition_run_sends_nothing_twice() {
    let ctx = acquisition_context();
    ctx.run(workflows::acquisition(&ctx.services()), 2).await;

    let state = ctx.run(workflows::acquisition(&ctx.services()), 2).await;
    no_failures(&state.stats);

    assert_eq!(state.leads.len(), 2);
    assert_eq!(state.stats.leads_merged, 0);
    assert_eq!(state.stats.drafts_written, 0);
    assert_eq!(state.stats.emails_sent, 0);
    assert_eq!(ctx.mailer.sent_to("ann@ann.io").len(), 1);
    assert_eq!(ctx.email_model.prompts().len(), 2);
    assert_eq!(ctx.browser.opens(), 2);
}

#[tokio::test]
async fn failed_send_is_retried_on_the_next_run() {
    let mut ctx = acquisition_context();
    ctx.mailer = Arc::new(MockMailer::new().fail_for("ann@ann.io"));

    let state = ctx.run(workflows::acquisition(&ctx.services()), 2).await;
    assert_eq!(state.stats.send_failures, 1);
    assert!(!ctx.stored("ann").email_sent);

    ctx.mailer = Arc::new(MockMailer::new());
    let state = ctx.run(workflows::acquisition(&ctx.services()), 2).await;
    assert_eq!(state.stats.emails_sent, 1);
    assert!(ctx.stored("ann").email_sent);
}

#[tokio::test]
async fn model_failure_falls_back_to_canned_draft() {
    let mut ctx = acquisition_context();
    ctx.email_model = Arc::new(MockGenerator::new().always("I cannot help with that."));

    let state = ctx.run(workflows::prospect(&ctx.services()), 2).await;
    no_failures(&state.stats);

    assert_eq!(ctx.stored("ann").subject(), Some("Exploring AI for Ann Labs"));
    assert!(ctx.mailer.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Follow-through
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_lead_is_nudged_exactly_once() {
    let mut ctx = TestContext::new();
    ctx.reply_model = Arc::new(MockGenerator::new().always("Just checking in on my last note."));
    ctx.seed(&[sent_lead("ann", 30)]);

    let state = ctx.run(workflows::follow_through(&ctx.services()), 3).await;
    no_failures(&state.stats);
    assert_eq!(state.stats.nudges_sent, 1);

    let nudges = ctx.mailer.sent_to("ann@ann.io");
    assert_eq!(nudges.len(), 1);
    assert_eq!(nudges[0].subject, "Re: Exploring AI for Ann Labs");
    assert_eq!(nudges[0].body, "Just checking in on my last note.");
    assert!(!nudges[0].html);

    let ann = ctx.stored("ann");
    assert!(ann.follow_up_sent);
    assert_eq!(ann.review_status(), Some(ReviewStatus::Pending));

    let state = ctx.run(workflows::follow_through(&ctx.services()), 3).await;
    assert_eq!(state.stats.nudges_sent, 0);
    assert_eq!(ctx.mailer.sent_to("ann@ann.io").len(), 1);
}

#[tokio::test]
async fn recent_send_is_not_nudged_yet() {
    let ctx = TestContext::new();
    ctx.seed(&[sent_lead("ann", 2)]);

    let state = ctx.run(workflows::follow_through(&ctx.services()), 3).await;

    assert_eq!(state.stats.nudges_sent, 0);
    assert!(ctx.mailer.sent_to("ann@ann.io").is_empty());
    assert!(!ctx.stored("ann").follow_up_sent);
}

#[tokio::test]
async fn summary_report_goes_to_the_team() {
    let ctx = TestContext::new();
    ctx.seed(&[sent_lead("ann", 2), discovered_lead("bob")]);

    let state = ctx.run(workflows::follow_through(&ctx.services()), 3).await;

    let reports = ctx.mailer.sent_to(REPORT_TO);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].subject, "Daily Sales Pipeline Report - Your Company");
    let summary = state.summary.expect("summary set");
    assert!(summary.starts_with("Daily Sales Report for Your Company:"));
    assert_eq!(reports[0].body, summary);
    assert_eq!(state.stats.reports_sent, 1);
}

#[tokio::test]
async fn unconfigured_services_skip_their_stages() {
    let ctx = TestContext::new();
    ctx.seed(&[sent_lead("ann", 48)]);
    let services = Services::builder()
        .browser(ctx.browser.clone())
        .renderer(ctx.renderer.clone())
        .build();

    let state = ctx.run(workflows::follow_through(&services), 3).await;
    no_failures(&state.stats);

    let ann = ctx.stored("ann");
    assert!(ann.email_review.is_none());
    assert!(!ann.follow_up_sent);
    assert!(state.summary.is_some());
}
