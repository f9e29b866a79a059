//! Statement-of-work proposals for leads that asked for one.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use salesflow_common::{Lead, ProposalRecord, ReplyAnalysis};

use crate::pipeline::{PipelineState, Stage};
use crate::store::{ArtifactKind, Artifacts};
use crate::traits::{DocumentRenderer, TextGenerator};

const FALLBACK_SOW: &str = "Default SoW content";

pub fn sow_prompt(lead: &Lead) -> String {
    format!(
        "Generate a 2-page Statement of Work for {name}, {role} at {company} ({profile}).\n\
         Use a fixed-price model. Include scope, timeline and deliverables.",
        name = lead.display_name(),
        role = lead.role.as_deref().unwrap_or("N/A"),
        company = lead.company.as_deref().unwrap_or("N/A"),
        profile = lead.profile_url,
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The "Statement of Work" page. `content` is escaped, newlines become `<br>`.
pub fn render_sow_html(content: &str) -> String {
    let body = escape_html(content).replace("\r\n", "\n").replace('\n', "<br>\n");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Statement of Work</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        h1 {{ text-align: center; }}
        .section {{ margin-bottom: 20px; }}
    </style>
</head>
<body>
    <h1>Statement of Work</h1>
    <div class="section">
        {body}
    </div>
</body>
</html>
"#
    )
}

fn needs_proposal(lead: &Lead) -> bool {
    lead.has_replied() && lead.proposal.is_none() && lead.analysis().is_some_and(ReplyAnalysis::wants_proposal)
}

pub struct ProposalGenerator {
    generator: Option<Arc<dyn TextGenerator>>,
    renderer: Arc<dyn DocumentRenderer>,
}

impl ProposalGenerator {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self { generator, renderer }
    }

    async fn sow_text(&self, lead: &Lead) -> String {
        let Some(generator) = &self.generator else {
            return FALLBACK_SOW.to_string();
        };
        match generator.generate(&sow_prompt(lead)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => FALLBACK_SOW.to_string(),
            Err(e) => {
                warn!(profile_url = %lead.profile_url, error = %e, "SoW generation failed");
                FALLBACK_SOW.to_string()
            }
        }
    }

    /// Render to PDF, or write the HTML itself when rendering fails.
    async fn write_document(&self, html: &str, lead: &Lead, artifacts: &Artifacts) -> Result<String> {
        let pdf = artifacts.path_for(ArtifactKind::Proposal, lead, "pdf")?;
        match self.renderer.render_pdf(html, &pdf).await {
            Ok(()) => return Ok(path_string(&pdf)),
            Err(e) => warn!(path = %pdf.display(), error = format!("{e:#}"), "PDF render failed, writing HTML"),
        }
        let fallback = artifacts.path_for(ArtifactKind::Proposal, lead, "html")?;
        std::fs::write(&fallback, html)
            .with_context(|| format!("Failed to write {}", fallback.display()))?;
        Ok(path_string(&fallback))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl Stage for ProposalGenerator {
    fn name(&self) -> &'static str {
        "proposal_generator"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        for lead in state.leads.iter_mut().filter(|l| needs_proposal(l)) {
            let html = render_sow_html(&self.sow_text(lead).await);
            match self.write_document(&html, lead, &state.artifacts).await {
                Ok(proposal_path) => {
                    info!(profile_url = %lead.profile_url, path = %proposal_path, "Proposal stored");
                    lead.proposal = Some(ProposalRecord { proposal_path });
                    state.stats.proposals_generated += 1;
                }
                Err(e) => {
                    warn!(profile_url = %lead.profile_url, error = format!("{e:#}"), "Proposal not stored")
                }
            }
        }
        Ok(())
    }
}
