//! GhostLAN SimWorld - synthetic LAN matches for testing anti-cheat.
//!
//! A match is a venue (`Environment`), a roster of scripted players, some
//! of them cheating, and an orchestrator that plays the match tick by tick
//! while the anti-cheat engine watches the event stream. Because the harness
//! knows who really cheats, every run doubles as a labelled test of the
//! detector.
//!
//! # Determinism
//!
//! All randomness is drawn from streams derived from one 64-bit seed, and
//! the default `SimContext` clock only moves when the match sleeps. The same
//! seed and configuration replay the same match event for event.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  MatchOrchestrator                   │
//! │   tick: update venue → agents act → match_state      │
//! │        │                   │                         │
//! │  ┌─────▼──────┐      ┌─────▼─────┐   ┌─────────────┐ │
//! │  │ Environment│◄─────│  Agents   │   │ AntiCheat   │ │
//! │  │ + network  │      │ (normal / │──►│ rules + ML  │ │
//! │  │ simulator  │      │  cheat)   │   │             │ │
//! │  └────────────┘      └───────────┘   └─────────────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ghostlan_sim::{MatchConfig, MatchOrchestrator, SimContext};
//!
//! let config = MatchConfig { seed: 42, ..Default::default() };
//! let mut orchestrator = MatchOrchestrator::new(config, SimContext::shared(42))?;
//! let stats = orchestrator.run().await?;
//! ```

pub mod agent;
mod context;
pub mod environment;
mod exporter;
pub mod network;
pub mod orchestrator;
pub mod runner;
pub mod scenarios;
pub mod seeds;

pub use agent::{Agent, AgentSnapshot, CheatProfile, NormalProfile, Policy};
pub use context::SimContext;
pub use environment::{
    AgentState, EnemyContact, EnemyQuery, Environment, EnvironmentConfig, EnvironmentSnapshot,
};
pub use exporter::MatchExport;
pub use network::{NetworkEventConfig, NetworkSimulator};
pub use orchestrator::{
    ClockMode, MapPreset, MatchConfig, MatchOrchestrator, MatchPhase, MatchSnapshot, StopHandle,
};
pub use runner::{ConfigOverrides, ScenarioMetrics, ScenarioResult, ScenarioRun, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use seeds::{seed_sweep, SeedStream};

use ghostlan_core::GeometryError;
use ghostlan_env::EnvError;

/// Errors that stop a match from being set up or reported.
///
/// Faults inside a running match (an agent acting on bad input, a detector
/// that fails to fit) are absorbed where they happen and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Match setup failed: {0}")]
    Setup(String),

    #[error("Invalid map: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Cannot {action} while the match is {phase:?}")]
    IllegalPhase {
        action: &'static str,
        phase: MatchPhase,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
