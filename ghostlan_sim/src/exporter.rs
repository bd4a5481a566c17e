//! JSON export of a finished match.
//!
//! Bundles the configuration, the full event log, the detection log and the
//! final state into one document for offline review.

use crate::orchestrator::{MatchConfig, MatchOrchestrator, MatchSnapshot};
use crate::SimError;
use ghostlan_core::{Detection, Event, MatchStats};
use ghostlan_env::{MatchContext, MatchId};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete record of one match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchExport {
    /// Scenario name, when the match ran as part of one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,

    pub match_id: MatchId,
    pub seed: u64,
    pub config: MatchConfig,

    /// Present once the match has ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MatchStats>,

    pub events: Vec<Event>,
    pub detections: Vec<Detection>,
    pub final_state: MatchSnapshot,
}

impl MatchExport {
    /// Captures the current logs and state of a match.
    pub fn capture<Ctx: MatchContext>(orchestrator: &MatchOrchestrator<Ctx>) -> Self {
        Self {
            scenario: None,
            match_id: orchestrator.match_id(),
            seed: orchestrator.config().seed,
            config: orchestrator.config().clone(),
            stats: orchestrator.final_stats().cloned(),
            events: orchestrator.events().to_vec(),
            detections: orchestrator.detections().to_vec(),
            final_state: orchestrator.current_state(),
        }
    }

    pub fn with_scenario(mut self, name: &str) -> Self {
        self.scenario = Some(name.to_string());
        self
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
