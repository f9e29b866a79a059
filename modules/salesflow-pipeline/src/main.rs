use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use salesflow_common::Config;
use salesflow_pipeline::pipeline::{Pipeline, PipelineState};
use salesflow_pipeline::store::{Artifacts, LeadStore};
use salesflow_pipeline::workflows::{self, Services};

#[derive(Parser)]
#[command(name = "salesflow")]
#[command(about = "LinkedIn lead generation and outreach pipeline")]
#[command(version)]
struct Cli {
    /// Lead store, rewritten after every stage
    #[arg(long, global = true, default_value = "outputs/final_leads.json")]
    leads_file: PathBuf,

    /// Root directory for per-lead artifacts
    #[arg(long, global = true, default_value = "outputs")]
    outputs_dir: PathBuf,

    /// LinkedIn people-search query (overrides SEARCH_QUERY)
    #[arg(long, global = true)]
    query: Option<String>,

    /// Number of new profiles to collect (overrides NUM_PROFILES)
    #[arg(long, global = true)]
    num_profiles: Option<usize>,

    /// Sender organization (overrides ORG_NAME)
    #[arg(long, global = true)]
    org_name: Option<String>,

    /// Sender name used in signatures (overrides USER_NAME)
    #[arg(long, global = true)]
    user_name: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Follow through on stored leads, then acquire new ones (default)
    Run,
    /// Discover, enrich and draft without sending anything
    Discover,
    /// Check replies, book meetings, write proposals, send nudges
    Review,
    /// Send the meeting and summary reports
    Report,
    /// List local Chrome profiles and their signed-in accounts
    Profiles,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        let campaign = &mut config.campaign;
        if let Some(query) = &self.query {
            campaign.search_query = query.clone();
        }
        if let Some(n) = self.num_profiles {
            campaign.num_profiles = n;
        }
        if let Some(org) = &self.org_name {
            campaign.organization_name = org.clone();
        }
        if let Some(user) = &self.user_name {
            campaign.user_name = user.clone();
        }
    }
}

/// Workspace crates logged at info on top of RUST_LOG.
const LOG_DIRECTIVES: &[&str] = &[
    "salesflow=info",
    "salesflow_pipeline=info",
    "salesflow_common=info",
    "ai_client=info",
    "google_client=info",
    "hunter_client=info",
    "browser_session=info",
];

fn env_filter() -> Result<EnvFilter> {
    LOG_DIRECTIVES
        .iter()
        .try_fold(EnvFilter::from_default_env(), |filter, directive| -> Result<EnvFilter> {
            Ok(filter.add_directive(directive.parse()?))
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter()?)
        .init();

    let cli = Cli::parse();
    let command = cli.command.as_ref().unwrap_or(&Command::Run);

    let mut config = Config::from_env()?;
    cli.apply_overrides(&mut config);

    if let Command::Profiles = command {
        return list_profiles(&config);
    }

    info!(query = %config.campaign.search_query, "Salesflow starting...");

    let store = LeadStore::new(&cli.leads_file);
    let had_store = store.exists();
    let leads = store.load()?;
    info!(leads = leads.len(), path = %store.path().display(), "Lead store loaded");

    let services = Services::from_config(&config).await?;
    let mut state = PipelineState::new(
        leads,
        config.campaign.clone(),
        Artifacts::new(&cli.outputs_dir),
    );

    let pipelines: Vec<Pipeline> = match command {
        Command::Run if had_store => vec![
            workflows::follow_through(&services),
            workflows::acquisition(&services),
        ],
        Command::Run => vec![workflows::acquisition(&services)],
        Command::Discover => vec![workflows::prospect(&services)],
        Command::Review => vec![workflows::review(&services)],
        Command::Report => vec![workflows::reports(&services)],
        Command::Profiles => Vec::new(),
    };

    for pipeline in pipelines {
        pipeline.checkpoint_to(store.clone()).run(&mut state).await;
    }

    if let Some(summary) = &state.summary {
        println!("{summary}");
    }
    println!("{}", state.stats);
    Ok(())
}

fn list_profiles(config: &Config) -> Result<()> {
    let dir = config
        .chrome_user_data_dir
        .clone()
        .or_else(browser_session::default_user_data_dir)
        .context("No Chrome user data directory found; set CHROME_USER_DATA_DIR")?;
    let profiles = browser_session::list_profiles(&dir)?;
    println!("Chrome profiles in {}:", dir.display());
    for profile in profiles {
        println!(
            "  {:<12} {:<24} {}",
            profile.directory,
            profile.name,
            profile.email.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
