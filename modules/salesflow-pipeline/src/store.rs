//! The persisted lead list and the per-lead artifact directories.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use salesflow_common::Lead;

// ---------------------------------------------------------------------------
// LeadStore
// ---------------------------------------------------------------------------

/// One pretty-printed JSON array, rewritten wholesale at every checkpoint.
#[derive(Debug, Clone)]
pub struct LeadStore {
    path: PathBuf,
}

impl LeadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Missing file loads as empty; a malformed file is an error, never discarded.
    pub fn load(&self) -> Result<Vec<Lead>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let leads: Vec<Lead> = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed lead file {}", self.path.display()))?;
        info!(count = leads.len(), path = %self.path.display(), "Loaded leads");
        Ok(leads)
    }

    /// Write to a sibling temp file then rename over the target, so an
    /// interrupted save leaves the previous file intact.
    pub fn save(&self, leads: &[Lead]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(leads)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        debug!(count = leads.len(), path = %self.path.display(), "Leads checkpointed");
        Ok(())
    }
}

/// Append leads whose profile URL is not already present, also collapsing
/// duplicates inside `incoming`. Returns how many were added.
pub fn merge_new_leads(existing: &mut Vec<Lead>, incoming: Vec<Lead>) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|l| l.profile_url.clone()).collect();
    let before = existing.len();
    for lead in incoming {
        if lead.profile_url.is_empty() || !seen.insert(lead.profile_url.clone()) {
            continue;
        }
        existing.push(lead);
    }
    existing.len() - before
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Email,
    Replied,
    NonReplied,
    Proposal,
}

impl ArtifactKind {
    fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Email => "emails",
            ArtifactKind::Replied => "replied",
            ArtifactKind::NonReplied => "non_replied",
            ArtifactKind::Proposal => "proposals",
        }
    }
}

/// Root of the per-lead output tree (`outputs/` by default).
#[derive(Debug, Clone)]
pub struct Artifacts {
    root: PathBuf,
}

impl Artifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// `<root>/<kind>/<slug>.<ext>`, creating the directory.
    pub fn path_for(&self, kind: ArtifactKind, lead: &Lead, ext: &str) -> Result<PathBuf> {
        let dir = self.dir(kind);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir.join(format!("{}.{ext}", lead.artifact_slug())))
    }

    pub fn write_json<T: Serialize>(
        &self,
        kind: ArtifactKind,
        lead: &Lead,
        value: &T,
    ) -> Result<PathBuf> {
        let path = self.path_for(kind, lead, "json")?;
        std::fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
