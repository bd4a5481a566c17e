//! Player actions and their resolved outcomes.

use ghostlan_env::AgentId;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// World-space position [x, y, z] in map units.
pub type Position = Vector3<f64>;

/// The catalog of simulated cheats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheatKind {
    Aimbot,
    Wallhack,
    Speedhack,
    Triggerbot,
    Esp,
    #[serde(rename = "bhop")]
    BunnyHop,
}

impl CheatKind {
    /// Every cheat in catalog order.
    pub const ALL: [CheatKind; 6] = [
        CheatKind::Aimbot,
        CheatKind::Wallhack,
        CheatKind::Speedhack,
        CheatKind::Triggerbot,
        CheatKind::Esp,
        CheatKind::BunnyHop,
    ];

    /// Returns the wire name.
    pub fn name(&self) -> &'static str {
        match self {
            CheatKind::Aimbot => "aimbot",
            CheatKind::Wallhack => "wallhack",
            CheatKind::Speedhack => "speedhack",
            CheatKind::Triggerbot => "triggerbot",
            CheatKind::Esp => "esp",
            CheatKind::BunnyHop => "bhop",
        }
    }
}

impl std::fmt::Display for CheatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Cheats an action openly advertises to the detector.
pub type CheatFlags = BTreeSet<CheatKind>;

/// Discriminant of [`Action`], used in rolling histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Shoot,
    Reload,
    Wait,
}

/// What an agent wants to do this tick.
///
/// Produced by a policy, consumed exactly once by the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move {
        target: Position,
        speed: f64,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        cheat_flags: CheatFlags,
    },
    Shoot {
        target_position: Position,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_agent: Option<AgentId>,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        cheat_flags: CheatFlags,
    },
    Reload,
    Wait,
}

impl Action {
    /// An honest move.
    pub fn move_to(target: Position, speed: f64) -> Self {
        Action::Move {
            target,
            speed,
            cheat_flags: CheatFlags::new(),
        }
    }

    /// An honest shot.
    pub fn shoot_at(target_position: Position, target_agent: Option<AgentId>) -> Self {
        Action::Shoot {
            target_position,
            target_agent,
            cheat_flags: CheatFlags::new(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Move { .. } => ActionKind::Move,
            Action::Shoot { .. } => ActionKind::Shoot,
            Action::Reload => ActionKind::Reload,
            Action::Wait => ActionKind::Wait,
        }
    }

    /// Returns true if the action advertises the given cheat.
    pub fn flags(&self, cheat: CheatKind) -> bool {
        match self {
            Action::Move { cheat_flags, .. } | Action::Shoot { cheat_flags, .. } => {
                cheat_flags.contains(&cheat)
            }
            Action::Reload | Action::Wait => false,
        }
    }

    /// Movement speed multiplier, for moves.
    pub fn speed(&self) -> Option<f64> {
        match self {
            Action::Move { speed, .. } => Some(*speed),
            _ => None,
        }
    }
}

/// Observable consequence of resolving an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Moved,
    Collision,
    Hit,
    DamageDealt,
    Eliminated,
    Miss,
    Obstructed,
    Reloaded,
}

/// Network conditions experienced while resolving one action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkImpact {
    /// Latency including jitter (ms)
    pub latency_ms: f64,

    /// Packet loss in effect
    pub packet_loss: f64,

    /// Simulated payload size (MB)
    pub bandwidth_used_mb: f64,
}

/// Outcome of `Environment::apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub effects: Vec<Effect>,
    pub network_impact: NetworkImpact,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_position: Option<Position>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<AgentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<f64>,

    /// Aim precision of a shot in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_probability: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload_time_secs: Option<f64>,
}

impl ActionResult {
    /// A successful result with the given effects.
    pub fn succeeded(effects: Vec<Effect>, network_impact: NetworkImpact) -> Self {
        Self {
            success: true,
            effects,
            network_impact,
            new_position: None,
            target: None,
            damage: None,
            accuracy: None,
            hit_probability: None,
            reload_time_secs: None,
        }
    }

    /// A rejected result. Rejection is a normal outcome, not an error.
    pub fn rejected(effect: Effect, network_impact: NetworkImpact) -> Self {
        Self {
            success: false,
            ..Self::succeeded(vec![effect], network_impact)
        }
    }

    pub fn has_effect(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }
}
