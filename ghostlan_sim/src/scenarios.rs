//! Named match presets for exercising the anti-cheat pipeline.

use crate::orchestrator::{MapPreset, MatchConfig};
use ghostlan_env::NetworkConditions;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// No cheaters: every flag-based detection is a false positive
    CleanLobby,

    /// The default venue mix, 30% cheaters
    MixedLobby,

    /// Every player cheats
    CheaterLobby,

    /// Latency and jitter jump halfway through the match
    LagSpike,

    /// Heavy packet loss for the whole match
    PacketStorm,

    /// Long match at full tick rate on an ideal LAN
    LanFinal,
}

/// A change of venue network conditions partway through a match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkShift {
    /// Fraction of the tick budget after which the shift applies
    pub at_fraction: f64,
    pub conditions: NetworkConditions,
}

impl NetworkShift {
    pub fn at_tick(&self, max_ticks: u64) -> u64 {
        (max_ticks as f64 * self.at_fraction).floor() as u64
    }
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::CleanLobby,
            ScenarioId::MixedLobby,
            ScenarioId::CheaterLobby,
            ScenarioId::LagSpike,
            ScenarioId::PacketStorm,
            ScenarioId::LanFinal,
        ]
    }

    /// Scenarios cheap enough for every CI run.
    pub fn quick() -> Vec<ScenarioId> {
        Self::all().into_iter().filter(|s| !s.is_long()).collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::CleanLobby => "clean_lobby",
            ScenarioId::MixedLobby => "mixed_lobby",
            ScenarioId::CheaterLobby => "cheater_lobby",
            ScenarioId::LagSpike => "lag_spike",
            ScenarioId::PacketStorm => "packet_storm",
            ScenarioId::LanFinal => "lan_final",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::CleanLobby => "10 honest players, default network; no signature rule may fire",
            ScenarioId::MixedLobby => "10 players at 30% cheat probability, default network",
            ScenarioId::CheaterLobby => "10 cheaters on an ideal LAN; cheats must be caught",
            ScenarioId::LagSpike => "Mixed lobby whose latency jumps to 150ms +/- 40ms at half time",
            ScenarioId::PacketStorm => "Mixed lobby under 25% packet loss and frequent bursts",
            ScenarioId::LanFinal => "Two minutes at 60 Hz on an ideal LAN, 30% cheaters",
        }
    }

    /// True for scenarios that take noticeably longer to play out.
    pub fn is_long(&self) -> bool {
        matches!(self, ScenarioId::LanFinal)
    }

    /// True when the scenario must produce at least one detection.
    pub fn expects_detections(&self) -> bool {
        matches!(self, ScenarioId::CheaterLobby)
    }

    /// Builds the match configuration for this scenario.
    pub fn config(&self, seed: u64) -> MatchConfig {
        let base = MatchConfig {
            match_duration_seconds: 30.0,
            tick_rate_hz: 20.0,
            num_players: 10,
            seed,
            ..MatchConfig::default()
        };

        match self {
            ScenarioId::CleanLobby => MatchConfig {
                cheat_probability: 0.0,
                ..base
            },
            ScenarioId::MixedLobby => base,
            ScenarioId::CheaterLobby => MatchConfig {
                cheat_probability: 1.0,
                network_conditions: NetworkConditions::ideal(),
                ..base
            },
            ScenarioId::LagSpike => base,
            ScenarioId::PacketStorm => {
                let mut config = MatchConfig {
                    network_conditions: NetworkConditions {
                        packet_loss: 0.25,
                        ..NetworkConditions::default()
                    },
                    ..base
                };
                config.environment.network_events.latency_spike_chance = 0.2;
                config.environment.network_events.bandwidth_issue_chance = 0.1;
                config
            }
            ScenarioId::LanFinal => MatchConfig {
                match_duration_seconds: 120.0,
                tick_rate_hz: 60.0,
                network_conditions: NetworkConditions::ideal(),
                map: MapPreset::LanCafe,
                ..base
            },
        }
    }

    /// Mid-match change of network conditions, if the scenario has one.
    pub fn network_shift(&self) -> Option<NetworkShift> {
        match self {
            ScenarioId::LagSpike => Some(NetworkShift {
                at_fraction: 0.5,
                conditions: NetworkConditions {
                    latency_ms: 150.0,
                    jitter_ms: 40.0,
                    packet_loss: 0.05,
                    bandwidth_mbps: 20.0,
                },
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clean_lobby" | "clean" => Ok(ScenarioId::CleanLobby),
            "mixed_lobby" | "mixed" => Ok(ScenarioId::MixedLobby),
            "cheater_lobby" | "cheaters" => Ok(ScenarioId::CheaterLobby),
            "lag_spike" | "lagspike" | "lag" => Ok(ScenarioId::LagSpike),
            "packet_storm" | "packetstorm" | "storm" => Ok(ScenarioId::PacketStorm),
            "lan_final" | "lanfinal" | "final" => Ok(ScenarioId::LanFinal),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
