//! Fixed sequence of named stages over one mutable state, checkpointed
//! to the lead store after every stage.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use salesflow_common::{Campaign, Lead};

use crate::stats::RunStats;
use crate::store::{Artifacts, LeadStore};

pub struct PipelineState {
    pub leads: Vec<Lead>,
    pub campaign: Campaign,
    pub artifacts: Artifacts,
    pub stats: RunStats,
    /// Text of the last summary report, set by the reporter stage.
    pub summary: Option<String>,
}

impl PipelineState {
    pub fn new(leads: Vec<Lead>, campaign: Campaign, artifacts: Artifacts) -> Self {
        Self {
            leads,
            campaign,
            artifacts,
            stats: RunStats::default(),
            summary: None,
        }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &mut PipelineState) -> Result<()>;
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    store: Option<LeadStore>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            store: None,
        }
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn checkpoint_to(mut self, store: LeadStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order. A failing stage is logged and counted;
    /// the remaining stages still run.
    pub async fn run(&self, state: &mut PipelineState) {
        for stage in &self.stages {
            let name = stage.name();
            info!(stage = name, leads = state.leads.len(), "Stage starting");
            match stage.run(state).await {
                Ok(()) => info!(stage = name, "Stage complete"),
                Err(e) => {
                    state.stats.stage_failures += 1;
                    error!(stage = name, error = format!("{e:#}"), "Stage failed");
                }
            }
            self.checkpoint(name, &state.leads);
        }
    }

    fn checkpoint(&self, stage: &str, leads: &[Lead]) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(leads) {
            warn!(stage, error = format!("{e:#}"), "Checkpoint failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct AddLead(&'static str);

    #[async_trait]
    impl Stage for AddLead {
        fn name(&self) -> &'static str {
            "add_lead"
        }
        async fn run(&self, state: &mut PipelineState) -> Result<()> {
            state.leads.push(Lead::new(self.0));
            Ok(())
        }
    }

    struct Fails(Arc<AtomicU32>);

    #[async_trait]
    impl Stage for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }
        async fn run(&self, _state: &mut PipelineState) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("boom")
        }
    }

    #[tokio::test]
    async fn failing_stage_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = LeadStore::new(dir.path().join("leads.json"));
        let calls = Arc::new(AtomicU32::new(0));
        let pipeline = Pipeline::new()
            .stage(AddLead("https://x/in/a"))
            .stage(Fails(calls.clone()))
            .stage(AddLead("https://x/in/b"))
            .checkpoint_to(store.clone());

        let mut state = PipelineState::new(
            Vec::new(),
            Campaign::default(),
            Artifacts::new(dir.path()),
        );
        pipeline.run(&mut state).await;

        assert_eq!(pipeline.stage_names(), vec!["add_lead", "fails", "add_lead"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.stats.stage_failures, 1);
        assert_eq!(store.load().unwrap().len(), 2);
    }
}
