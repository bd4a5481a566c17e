//! Synthetic network disturbances for the venue LAN.
//!
//! Each environment update may start packet-loss bursts, latency spikes and
//! bandwidth drops. While active they degrade the conditions actions are
//! resolved under; afterwards they stay in the history until retention
//! expires.

use ghostlan_core::{NetworkEvent, NetworkEventKind};
use ghostlan_env::{AgentId, NetworkConditions};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Disturbance generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkEventConfig {
    /// Per-update chance of a latency spike
    pub latency_spike_chance: f64,

    /// Per-update chance of a bandwidth issue
    pub bandwidth_issue_chance: f64,

    /// Agents hit by one packet-loss burst, at most
    pub max_affected_agents: usize,

    /// How long events stay in the history (seconds)
    pub retention_secs: f64,
}

impl Default for NetworkEventConfig {
    fn default() -> Self {
        Self {
            latency_spike_chance: 0.1,
            bandwidth_issue_chance: 0.05,
            max_affected_agents: 3,
            retention_secs: 60.0,
        }
    }
}

/// Generates disturbances and tracks the ones still in effect.
pub struct NetworkSimulator {
    config: NetworkEventConfig,
    rng: ChaCha8Rng,
    history: VecDeque<NetworkEvent>,
}

impl NetworkSimulator {
    pub fn new(config: NetworkEventConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            rng,
            history: VecDeque::new(),
        }
    }

    /// Rolls for new disturbances at `now_secs` and returns only the new ones.
    ///
    /// The packet-loss burst chance equals the configured packet loss, so a
    /// lossier link also sees more bursts.
    pub fn update(
        &mut self,
        now_secs: f64,
        base: &NetworkConditions,
        roster: &[AgentId],
    ) -> Vec<NetworkEvent> {
        self.expire(now_secs);

        let mut fresh = Vec::new();

        if self.rng.gen::<f64>() < base.packet_loss {
            let count = self.config.max_affected_agents.min(roster.len());
            let mut affected_agents: Vec<AgentId> =
                roster.choose_multiple(&mut self.rng, count).copied().collect();
            affected_agents.sort();

            fresh.push(NetworkEvent {
                kind: NetworkEventKind::PacketLoss {
                    severity: Uniform::new_inclusive(0.1, 0.5).sample(&mut self.rng),
                    affected_agents,
                },
                started_at: now_secs,
                duration_secs: Uniform::new_inclusive(0.5, 2.0).sample(&mut self.rng),
            });
        }

        if self.rng.gen::<f64>() < self.config.latency_spike_chance {
            fresh.push(NetworkEvent {
                kind: NetworkEventKind::LatencySpike {
                    latency_increase_ms: Uniform::new_inclusive(10.0, 50.0).sample(&mut self.rng),
                },
                started_at: now_secs,
                duration_secs: Uniform::new_inclusive(0.5, 2.0).sample(&mut self.rng),
            });
        }

        if self.rng.gen::<f64>() < self.config.bandwidth_issue_chance {
            fresh.push(NetworkEvent {
                kind: NetworkEventKind::BandwidthIssue {
                    bandwidth_reduction: Uniform::new_inclusive(0.2, 0.8).sample(&mut self.rng),
                },
                started_at: now_secs,
                duration_secs: Uniform::new_inclusive(1.0, 5.0).sample(&mut self.rng),
            });
        }

        self.history.extend(fresh.iter().cloned());
        fresh
    }

    fn expire(&mut self, now_secs: f64) {
        let cutoff = now_secs - self.config.retention_secs;
        while self
            .history
            .front()
            .is_some_and(|event| event.started_at <= cutoff)
        {
            self.history.pop_front();
        }
    }

    /// Events within the retention window, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &NetworkEvent> {
        self.history.iter()
    }

    pub fn active(&self, now_secs: f64) -> impl Iterator<Item = &NetworkEvent> {
        self.history.iter().filter(move |e| e.is_active(now_secs))
    }

    /// Venue-wide conditions with active spikes and bandwidth drops applied.
    pub fn effective_conditions(&self, base: &NetworkConditions, now_secs: f64) -> NetworkConditions {
        let mut effective = *base;
        for event in self.active(now_secs) {
            match &event.kind {
                NetworkEventKind::LatencySpike { latency_increase_ms } => {
                    effective.latency_ms += latency_increase_ms;
                }
                NetworkEventKind::BandwidthIssue { bandwidth_reduction } => {
                    effective.bandwidth_mbps *= 1.0 - bandwidth_reduction;
                }
                NetworkEventKind::PacketLoss { .. } => {}
            }
        }
        effective
    }

    /// Packet loss seen by one agent: base loss plus any burst hitting it.
    pub fn packet_loss_for(&self, agent: AgentId, base_loss: f64, now_secs: f64) -> f64 {
        let burst: f64 = self
            .active(now_secs)
            .filter_map(|event| match &event.kind {
                NetworkEventKind::PacketLoss {
                    severity,
                    affected_agents,
                } if affected_agents.contains(&agent) => Some(*severity),
                _ => None,
            })
            .sum();
        (base_loss + burst).clamp(0.0, 1.0)
    }
}
