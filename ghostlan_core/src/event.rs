//! The match event log.
//!
//! Events are append-only and their order is the authoritative history of
//! a match. Field names follow the wire format existing consumers expect:
//! `{tick, type, data, timestamp}`.

use crate::action::{Action, ActionResult};
use ghostlan_env::{AgentId, Team};
use serde::{Deserialize, Serialize};

/// One entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Tick the event was produced in (monotonic, starts at 0)
    pub tick: u64,

    #[serde(flatten)]
    pub kind: EventKind,

    /// Match clock when the event was appended (seconds)
    pub timestamp: f64,
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    Network(NetworkEvent),
    AgentAction {
        agent_id: AgentId,
        action: Action,
        result: ActionResult,
    },
    MatchState(MatchStateSummary),
    MatchEnd(MatchStats),
}

impl EventKind {
    /// Wire name of the event type.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Network(_) => "network",
            EventKind::AgentAction { .. } => "agent_action",
            EventKind::MatchState(_) => "match_state",
            EventKind::MatchEnd(_) => "match_end",
        }
    }
}

impl Event {
    pub fn new(tick: u64, kind: EventKind, timestamp: f64) -> Self {
        Self { tick, kind, timestamp }
    }

    /// Borrows the pieces of an `agent_action` event.
    pub fn agent_action(&self) -> Option<(AgentId, &Action, &ActionResult)> {
        match &self.kind {
            EventKind::AgentAction { agent_id, action, result } => Some((*agent_id, action, result)),
            _ => None,
        }
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        self.agent_action().map(|(id, _, _)| id)
    }
}

/// A synthetic network disturbance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEvent {
    #[serde(flatten)]
    pub kind: NetworkEventKind,

    /// Match clock when the disturbance began (seconds)
    pub started_at: f64,

    /// How long the disturbance affects conditions (seconds)
    pub duration_secs: f64,
}

impl NetworkEvent {
    /// Returns true while the disturbance still affects conditions.
    pub fn is_active(&self, now_secs: f64) -> bool {
        now_secs < self.started_at + self.duration_secs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NetworkEventKind {
    PacketLoss {
        severity: f64,
        affected_agents: Vec<AgentId>,
    },
    LatencySpike {
        latency_increase_ms: f64,
    },
    BandwidthIssue {
        bandwidth_reduction: f64,
    },
}

/// Synthetic host telemetry reported alongside match state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub fps: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_health: f64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            fps: 60.0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            network_health: 1.0,
        }
    }
}

/// Once-per-tick summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStateSummary {
    pub elapsed_time: f64,
    pub agents_alive: usize,
    pub network_health: f64,
    pub performance_metrics: PerformanceMetrics,
}

/// Final statistics carried by the `match_end` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub winner: Team,
    pub cheaters_detected: usize,
    pub total_events: usize,
    pub match_duration: f64,
}
