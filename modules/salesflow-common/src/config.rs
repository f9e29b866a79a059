use std::path::PathBuf;

use crate::error::SalesflowError;
use crate::types::{Campaign, PLACEHOLDER_EMAIL};

/// Application configuration loaded from environment variables.
/// Services whose keys are absent stay `None` and the stages that need
/// them skip with a warning.
#[derive(Debug, Clone)]
pub struct Config {
    // AI providers
    pub google_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    // Enrichment
    pub hunter_api_key: Option<String>,
    pub fallback_email: String,

    // Mail
    pub smtp: Option<SmtpConfig>,
    pub report_email: String,

    // Google OAuth (Gmail + Calendar)
    pub google_credentials_path: Option<PathBuf>,
    pub google_token_path: PathBuf,

    // LinkedIn
    pub linkedin_email: Option<String>,
    pub linkedin_password: Option<String>,

    // Browser
    pub chrome_bin: String,
    pub chrome_user_data_dir: Option<PathBuf>,
    pub chrome_profile_dir: String,
    pub chrome_profile_email: Option<String>,
    pub chrome_debug_url: Option<String>,
    pub chrome_headless: bool,

    // Proposals
    pub wkhtmltopdf_bin: String,

    pub campaign: Campaign,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, SalesflowError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_redacted();
        Ok(config)
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SalesflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(get("SMTP_PORT"), "SMTP_PORT", 587)?,
                user: get("SMTP_USER").ok_or(SalesflowError::NotConfigured {
                    service: "SMTP",
                    key: "SMTP_USER",
                })?,
                password: get("SMTP_PASSWORD").ok_or(SalesflowError::NotConfigured {
                    service: "SMTP",
                    key: "SMTP_PASSWORD",
                })?,
            }),
            None => None,
        };

        let defaults = Campaign::default();
        let campaign = Campaign {
            search_query: get("SEARCH_QUERY").unwrap_or(defaults.search_query),
            organization_name: get("ORG_NAME").unwrap_or(defaults.organization_name),
            user_name: get("USER_NAME").unwrap_or(defaults.user_name),
            company_email: get("COMPANY_EMAIL").unwrap_or(defaults.company_email),
            company_website: get("COMPANY_WEBSITE").unwrap_or(defaults.company_website),
            company_linkedin: get("COMPANY_LINKEDIN").unwrap_or(defaults.company_linkedin),
            company_logo: get("COMPANY_LOGO"),
            num_profiles: parse_or(get("NUM_PROFILES"), "NUM_PROFILES", defaults.num_profiles)?,
        };

        Ok(Self {
            google_api_key: get("GOOGLE_API_KEY"),
            deepseek_api_key: get("DEEPSEEK_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            hunter_api_key: get("HUNTER_API_KEY"),
            fallback_email: get("FALLBACK_EMAIL").unwrap_or_else(|| PLACEHOLDER_EMAIL.to_string()),
            smtp,
            report_email: get("REPORT_EMAIL_ID").unwrap_or_else(|| "team@example.com".to_string()),
            google_credentials_path: get("GOOGLE_OAUTH_CREDENTIALS_PATH").map(PathBuf::from),
            google_token_path: get("GOOGLE_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("token.json")),
            linkedin_email: get("LINKEDIN_EMAIL"),
            linkedin_password: get("LINKEDIN_PASSWORD"),
            chrome_bin: get("CHROME_BIN").unwrap_or_else(|| "google-chrome-stable".to_string()),
            chrome_user_data_dir: get("CHROME_USER_DATA_DIR").map(PathBuf::from),
            chrome_profile_dir: get("CHROME_PROFILE_DIR").unwrap_or_else(|| "Profile 1".to_string()),
            chrome_profile_email: get("CHROME_PROFILE_EMAIL"),
            chrome_debug_url: get("CHROME_DEBUG_URL"),
            chrome_headless: parse_or(get("CHROME_HEADLESS"), "CHROME_HEADLESS", false)?,
            wkhtmltopdf_bin: get("WKHTMLTOPDF_BIN").unwrap_or_else(|| "wkhtmltopdf".to_string()),
            campaign,
        })
    }

    /// LinkedIn login pair, only when both halves are set.
    pub fn linkedin_credentials(&self) -> Option<(&str, &str)> {
        Some((self.linkedin_email.as_deref()?, self.linkedin_password.as_deref()?))
    }

    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => preview(v),
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  GOOGLE_API_KEY: {}", preview_opt(&self.google_api_key));
        tracing::info!("  DEEPSEEK_API_KEY: {}", preview_opt(&self.deepseek_api_key));
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!("  HUNTER_API_KEY: {}", preview_opt(&self.hunter_api_key));
        match &self.smtp {
            Some(smtp) => tracing::info!("  SMTP: {}:{} as {}", smtp.host, smtp.port, smtp.user),
            None => tracing::info!("  SMTP: <not set>"),
        }
        tracing::info!(
            "  GOOGLE_OAUTH_CREDENTIALS_PATH: {}",
            self.google_credentials_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<not set>".to_string())
        );
        tracing::info!("  GOOGLE_TOKEN_PATH: {}", self.google_token_path.display());
        tracing::info!("  LINKEDIN_EMAIL: {}", preview_opt(&self.linkedin_email));
        tracing::info!("  CHROME_DEBUG_URL: {}", preview_opt(&self.chrome_debug_url));
        tracing::info!("  CHROME_PROFILE_DIR: {}", self.chrome_profile_dir);
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &str,
    default: T,
) -> Result<T, SalesflowError> {
    match raw {
        Some(v) => v
            .parse()
            .map_err(|_| SalesflowError::Config(format!("{key} has an invalid value: {v}"))),
        None => Ok(default),
    }
}
