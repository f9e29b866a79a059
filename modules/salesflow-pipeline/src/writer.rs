//! Personalized first-touch email drafts.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use salesflow_common::{Campaign, EmailDraft, Lead};

use crate::pipeline::{PipelineState, Stage};
use crate::store::ArtifactKind;
use crate::traits::TextGenerator;

pub const DEFAULT_LOGO_URL: &str =
    "https://assets.bacancytechnology.com/main-boot-5/images/bacancy-logo-white.svg";
const LINKEDIN_ICON_URL: &str =
    "https://img.icons8.com/?size=100&id=xuvGCOXi8Wyg&format=png&color=000000png";

/// Model output shape. Anything else in the object is ignored.
#[derive(Debug, Deserialize)]
struct GeneratedEmail {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

fn first_name(lead: &Lead) -> &str {
    lead.name
        .as_deref()
        .and_then(|n| n.split_whitespace().next())
        .unwrap_or("there")
}

fn company_or<'a>(lead: &'a Lead, default: &'a str) -> &'a str {
    lead.company.as_deref().filter(|c| !c.trim().is_empty()).unwrap_or(default)
}

/// Campaign logo when it is a URL or data URI, else the stock logo.
pub fn logo_src(campaign: &Campaign) -> &str {
    match campaign.company_logo.as_deref() {
        Some(logo) if logo.starts_with("http") || logo.starts_with("data:") => logo,
        _ => DEFAULT_LOGO_URL,
    }
}

pub fn signature(campaign: &Campaign) -> String {
    format!(
        r#"
<br><br>
Best regards,<br>
<b>{user}</b><br>
{org}<br>
Email: <a href="mailto:{email}">{email}</a><br>
<a href="{website}" style="text-decoration:none;"><img src="{logo}" alt="{org}" width="120" style="margin-top:8px;"></a>&nbsp;
<a href="{linkedin}" style="text-decoration:none;"><img src="{icon}" alt="LinkedIn" width="20" style="vertical-align:middle;"></a>
"#,
        user = campaign.user_name,
        org = campaign.organization_name,
        email = campaign.company_email,
        website = campaign.company_website,
        logo = logo_src(campaign),
        linkedin = campaign.company_linkedin,
        icon = LINKEDIN_ICON_URL,
    )
}

pub fn build_prompt(lead: &Lead, campaign: &Campaign) -> String {
    let company = company_or(lead, "your company");
    let role = lead.role.as_deref().unwrap_or("Unknown");
    let website = lead.company_website.as_deref().unwrap_or("");
    format!(
        r#"Output ONLY a JSON object with keys "subject" and "body". No other text.

subject: 8-12 words, benefit-focused and personalized, e.g. "Exploring AI Possibilities for {company}".

body: HTML, 150-200 words, professional and warm, short sentences, no sales clichés. Structure:
<p>Hi {first},</p>
<p>I hope you're doing well.</p>
<p>I'm {user} from {org}. [One sentence on the work {company} is doing, inferred from the website {website} or the role {role}, and why it caught our attention.]</p>
<p>At {org}, we help businesses get real outcomes from custom AI solutions. Here's how we typically add value:</p>
<ul>
<li><strong>Enhance User Experience</strong>: [benefit tied to {company}]</li>
<li><strong>Boost Operational Efficiency</strong>: [benefit tied to the {role} role]</li>
<li><strong>Enable Smarter Decisions</strong>: [analytics benefit for {company}]</li>
</ul>
<p>[1-2 sentence wrap-up.]</p>
<p>[Non-pushy call to action, e.g. a short call next week.]</p>

Do not include From/To lines, email addresses, or links other than the lead's website.

Lead:
- Name: {name}
- Role: {role}
- Company: {company_raw}
- Location: {location}
- Company Website: {website}
"#,
        first = first_name(lead),
        user = campaign.user_name,
        org = campaign.organization_name,
        name = lead.name.as_deref().unwrap_or("Unknown"),
        company_raw = company_or(lead, "Unknown"),
        location = lead.location.as_deref().unwrap_or("Unknown"),
    )
}

/// Parse a model response into subject and body (signature not yet added).
pub fn parse_generated(raw: &str) -> Result<(String, String)> {
    let json = ai_client::extract_json_object(raw);
    let generated: GeneratedEmail =
        serde_json::from_str(json).context("Email model returned invalid JSON")?;
    Ok((
        generated
            .subject
            .unwrap_or_else(|| "Personalized AI Outreach".to_string()),
        generated
            .body
            .unwrap_or_else(|| "Default body with CTA included.".to_string()),
    ))
}

pub fn fallback_draft(lead: &Lead, campaign: &Campaign) -> EmailDraft {
    EmailDraft {
        subject: format!("Exploring AI for {}", company_or(lead, "your company")),
        body: format!(
            "<p>Hi {},</p><p>I hope you're doing well.</p><p>I'm {} from {}. Let's discuss AI opportunities.</p><p>Would you be open to a call?</p>{}",
            first_name(lead),
            campaign.user_name,
            campaign.organization_name,
            signature(campaign),
        ),
        cta: None,
    }
}

pub struct EmailWriter {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl EmailWriter {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    async fn draft(&self, lead: &Lead, campaign: &Campaign) -> Result<EmailDraft> {
        let generator = self.generator.as_ref().context("No email model configured")?;
        let raw = generator
            .generate(&build_prompt(lead, campaign))
            .await
            .context("Email generation failed")?;
        let (subject, body) = parse_generated(&raw)?;
        Ok(EmailDraft {
            subject,
            body: body + &signature(campaign),
            cta: None,
        })
    }
}

#[async_trait]
impl Stage for EmailWriter {
    fn name(&self) -> &'static str {
        "email_writer"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        for lead in state.leads.iter_mut() {
            if lead.email_draft.is_some() {
                continue;
            }
            let draft = match self.draft(lead, &state.campaign).await {
                Ok(draft) => draft,
                Err(e) => {
                    warn!(profile_url = %lead.profile_url, error = format!("{e:#}"), "Using fallback draft");
                    fallback_draft(lead, &state.campaign)
                }
            };
            if let Err(e) = state.artifacts.write_json(ArtifactKind::Email, lead, &draft) {
                warn!(profile_url = %lead.profile_url, error = format!("{e:#}"), "Failed to save draft");
            }
            info!(profile_url = %lead.profile_url, subject = %draft.subject, "Draft written");
            lead.email_draft = Some(draft);
            state.stats.drafts_written += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> Lead {
        let mut lead = Lead::new("https://www.linkedin.com/in/jane");
        lead.name = Some("Jane Doe".into());
        lead.role = Some("CTO".into());
        lead.company = Some("Acme".into());
        lead
    }

    #[test]
    fn logo_falls_back_unless_url_or_data_uri() {
        let mut campaign = Campaign::default();
        assert_eq!(logo_src(&campaign), DEFAULT_LOGO_URL);
        campaign.company_logo = Some("logo.png".into());
        assert_eq!(logo_src(&campaign), DEFAULT_LOGO_URL);
        campaign.company_logo = Some("data:image/png;base64,AAAA".into());
        assert_eq!(logo_src(&campaign), "data:image/png;base64,AAAA");
        campaign.company_logo = Some("https://cdn.example.com/l.svg".into());
        assert_eq!(logo_src(&campaign), "https://cdn.example.com/l.svg");
    }

    #[test]
    fn prompt_names_the_lead() {
        let prompt = build_prompt(&lead(), &Campaign::default());
        assert!(prompt.contains("<p>Hi Jane,</p>"));
        assert!(prompt.contains("Exploring AI Possibilities for Acme"));
        assert!(prompt.contains("- Role: CTO"));
    }

    #[test]
    fn fenced_output_parses() {
        let raw = "```json\n{\"subject\": \"Hello Acme\", \"body\": \"<p>Hi</p>\"}\n```";
        let (subject, body) = parse_generated(raw).unwrap();
        assert_eq!(subject, "Hello Acme");
        assert_eq!(body, "<p>Hi</p>");
        assert!(parse_generated("not json").is_err());
    }

    #[test]
    fn fallback_uses_company_and_signature() {
        let draft = fallback_draft(&lead(), &Campaign::default());
        assert_eq!(draft.subject, "Exploring AI for Acme");
        assert!(draft.body.starts_with("<p>Hi Jane,</p>"));
        assert!(draft.body.contains("mailto:sales@company.com"));
    }
}
