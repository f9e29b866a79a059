//! Service wiring and the two step groups `salesflow run` executes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::TimeDelta;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use ai_client::{Gemini, OpenAi, GEMINI_FLASH_MODEL};
use browser_session::LaunchOptions;
use google_client::{CalendarClient, GmailClient, GoogleAuth};
use hunter_client::HunterClient;
use salesflow_common::{Config, PLACEHOLDER_EMAIL};

use crate::calendar::CalendarManager;
use crate::discovery::{DiscoverySettings, LeadDiscovery};
use crate::enrichment::LeadEnricher;
use crate::mailer::SmtpMailer;
use crate::outreach::{OutreachExecutor, DEFAULT_SEND_DELAY};
use crate::pipeline::Pipeline;
use crate::proposal::ProposalGenerator;
use crate::render::WkhtmlRenderer;
use crate::report::{MeetingReporter, SummaryReporter};
use crate::reviewer::nudge::FollowUp;
use crate::reviewer::EmailReviewer;
use crate::traits::{
    BrowserSource, CalendarApi, ChromeSource, DocumentRenderer, EmailFinder, Mailbox, Mailer,
    TextGenerator,
};
use crate::writer::EmailWriter;

const EMAIL_TEMPERATURE: f32 = 0.1;
const PROPOSAL_MODEL: &str = "gpt-4";

/// Every external collaborator the stages use. Absent services stay `None`
/// and their stages skip with a warning.
#[derive(Clone, TypedBuilder)]
pub struct Services {
    pub browser: Arc<dyn BrowserSource>,
    pub renderer: Arc<dyn DocumentRenderer>,
    #[builder(default)]
    pub email_finder: Option<Arc<dyn EmailFinder>>,
    /// Drafts outreach emails (Gemini).
    #[builder(default)]
    pub email_model: Option<Arc<dyn TextGenerator>>,
    /// Classifies replies and writes nudges (DeepSeek).
    #[builder(default)]
    pub reply_model: Option<Arc<dyn TextGenerator>>,
    /// Writes statements of work (OpenAI).
    #[builder(default)]
    pub proposal_model: Option<Arc<dyn TextGenerator>>,
    #[builder(default)]
    pub mailer: Option<Arc<dyn Mailer>>,
    #[builder(default)]
    pub mailbox: Option<Arc<dyn Mailbox>>,
    #[builder(default)]
    pub calendar: Option<Arc<dyn CalendarApi>>,
    #[builder(default = PLACEHOLDER_EMAIL.to_string())]
    pub fallback_email: String,
    #[builder(default = "team@example.com".to_string())]
    pub report_email: String,
    #[builder(default)]
    pub discovery: DiscoverySettings,
    #[builder(default = DEFAULT_SEND_DELAY)]
    pub send_delay: Duration,
    #[builder(default = TimeDelta::days(1))]
    pub nudge_after: TimeDelta,
}

impl Services {
    /// Production clients for everything `config` has keys for.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut launch = LaunchOptions {
            chrome_bin: config.chrome_bin.clone(),
            profile_dir: config.chrome_profile_dir.clone(),
            headless: config.chrome_headless,
            ..LaunchOptions::default()
        };
        if let Some(dir) = &config.chrome_user_data_dir {
            launch.user_data_dir = dir.clone();
        }
        let browser = ChromeSource {
            options: launch,
            profile_email: config.chrome_profile_email.clone(),
            debug_url: config.chrome_debug_url.clone(),
        };

        let mailer: Option<Arc<dyn Mailer>> = match &config.smtp {
            Some(smtp) => Some(Arc::new(SmtpMailer::new(smtp)?)),
            None => None,
        };

        let (mailbox, calendar) = google_services(config).await;

        let discovery = DiscoverySettings::builder()
            .target_count(config.campaign.num_profiles)
            .credentials(
                config
                    .linkedin_credentials()
                    .map(|(email, password)| (email.to_string(), password.to_string())),
            )
            .build();

        Ok(Services::builder()
            .browser(Arc::new(browser))
            .renderer(Arc::new(WkhtmlRenderer::new(&config.wkhtmltopdf_bin)))
            .email_finder(
                config
                    .hunter_api_key
                    .as_ref()
                    .map(|key| Arc::new(HunterClient::new(key)) as Arc<dyn EmailFinder>),
            )
            .email_model(config.google_api_key.as_ref().map(|key| {
                Arc::new(Gemini::new(key, GEMINI_FLASH_MODEL).with_temperature(EMAIL_TEMPERATURE))
                    as Arc<dyn TextGenerator>
            }))
            .reply_model(
                config
                    .deepseek_api_key
                    .as_ref()
                    .map(|key| Arc::new(OpenAi::deepseek(key)) as Arc<dyn TextGenerator>),
            )
            .proposal_model(
                config
                    .openai_api_key
                    .as_ref()
                    .map(|key| Arc::new(OpenAi::new(key, PROPOSAL_MODEL)) as Arc<dyn TextGenerator>),
            )
            .mailer(mailer)
            .mailbox(mailbox)
            .calendar(calendar)
            .fallback_email(config.fallback_email.clone())
            .report_email(config.report_email.clone())
            .discovery(discovery)
            .build())
    }
}

/// Gmail and Calendar share one OAuth token. Gmail is probed with a
/// profile lookup so a dead token disables review up front.
async fn google_services(config: &Config) -> (Option<Arc<dyn Mailbox>>, Option<Arc<dyn CalendarApi>>) {
    let auth = match GoogleAuth::load(&config.google_token_path, config.google_credentials_path.as_deref()) {
        Ok(auth) => Arc::new(auth),
        Err(e) => {
            warn!(error = %e, "Google token unavailable; Gmail and Calendar disabled");
            return (None, None);
        }
    };
    let gmail = GmailClient::new(auth.clone());
    let mailbox: Option<Arc<dyn Mailbox>> = match gmail.profile_email().await {
        Ok(address) => {
            info!(mailbox = %address, "Gmail connected");
            Some(Arc::new(gmail))
        }
        Err(e) => {
            warn!(error = %e, "Gmail unavailable");
            None
        }
    };
    (mailbox, Some(Arc::new(CalendarClient::new(auth))))
}

// ---------------------------------------------------------------------------
// Step groups
// ---------------------------------------------------------------------------

pub fn reviewer(services: &Services) -> EmailReviewer {
    EmailReviewer::new(
        services.mailbox.clone(),
        services.reply_model.clone(),
        services.mailer.clone(),
    )
}

fn with_review(pipeline: Pipeline, services: &Services) -> Pipeline {
    pipeline
        .stage(reviewer(services))
        .stage(ProposalGenerator::new(
            services.proposal_model.clone(),
            services.renderer.clone(),
        ))
        .stage(CalendarManager::new(services.calendar.clone()))
        .stage(
            FollowUp::new(services.mailer.clone(), services.reply_model.clone())
                .with_threshold(services.nudge_after),
        )
}

fn with_reports(pipeline: Pipeline, services: &Services) -> Pipeline {
    pipeline
        .stage(MeetingReporter::new(
            services.mailer.clone(),
            &services.report_email,
        ))
        .stage(SummaryReporter::new(
            services.mailer.clone(),
            &services.report_email,
        ))
}

fn with_prospecting(pipeline: Pipeline, services: &Services) -> Pipeline {
    pipeline
        .stage(LeadDiscovery::new(
            services.browser.clone(),
            services.discovery.clone(),
        ))
        .stage(LeadEnricher::new(
            services.email_finder.clone(),
            &services.fallback_email,
        ))
        .stage(EmailWriter::new(services.email_model.clone()))
}

/// Work on leads already in the store: replies, proposals, meetings,
/// nudges and reports.
pub fn follow_through(services: &Services) -> Pipeline {
    with_reports(with_review(Pipeline::new(), services), services)
}

/// Find new leads and take every lead as far as first contact, then look
/// for immediate replies.
pub fn acquisition(services: &Services) -> Pipeline {
    with_prospecting(Pipeline::new(), services)
        .stage(OutreachExecutor::new(services.mailer.clone()).with_delay(services.send_delay))
        .stage(reviewer(services))
}

/// Discovery, enrichment and drafting. Nothing is sent.
pub fn prospect(services: &Services) -> Pipeline {
    with_prospecting(Pipeline::new(), services)
}

/// Reply handling and everything that follows from it, without reports.
pub fn review(services: &Services) -> Pipeline {
    with_review(Pipeline::new(), services)
}

pub fn reports(services: &Services) -> Pipeline {
    with_reports(Pipeline::new(), services)
}
