//! Player policies.
//!
//! An [`Agent`] owns a closed set of behaviours ([`Policy`]) and its own
//! random stream. It reads the venue only through [`EnemyQuery`] and
//! returns an [`Action`]; the venue decides the outcome.

use crate::environment::{AgentState, EnemyContact, EnemyQuery};
use ghostlan_core::{Action, CheatFlags, CheatKind, MapBounds, Position};
use ghostlan_env::{AgentId, EnvError, Team};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Movement speed gained from perfect jump timing.
const BHOP_SPEED_BONUS: f64 = 1.3;

/// Per-axis shot spread of a cheater aiming by hand.
const UNASSISTED_SPREAD: f64 = 5.0;

/// Behaviour parameters of an honest player.
#[derive(Debug, Clone, Serialize)]
pub struct NormalProfile {
    pub skill_level: f64,
    pub reaction_time: f64,
    pub aim_accuracy: f64,
}

impl NormalProfile {
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            skill_level: rng.gen_range(0.3..0.8),
            reaction_time: rng.gen_range(0.1..0.3),
            aim_accuracy: rng.gen_range(0.4..0.9),
        }
    }

    /// Per-axis shot spread: worse players scatter more.
    pub fn spread(&self) -> f64 {
        (1.0 - self.aim_accuracy * self.skill_level) * 10.0
    }
}

/// The cheats one player runs, and how strongly.
#[derive(Debug, Clone, Serialize)]
pub struct CheatProfile {
    #[serde(rename = "cheat_types")]
    pub cheats: CheatFlags,
    pub aimbot_strength: f64,
    pub wallhack_range: f64,
    pub speed_multiplier: f64,

    /// Set once the anti-cheat engine has flagged this player
    pub detected: bool,
}

impl CheatProfile {
    /// Draws 1 to 4 distinct cheats and their strengths.
    pub fn random(rng: &mut impl Rng) -> Self {
        let count = rng.gen_range(1..=4);
        let cheats: CheatFlags = CheatKind::ALL.choose_multiple(rng, count).copied().collect();

        Self {
            cheats,
            aimbot_strength: rng.gen_range(0.7..=1.0),
            wallhack_range: rng.gen_range(50.0..=100.0),
            speed_multiplier: rng.gen_range(1.2..=2.0),
            detected: false,
        }
    }

    pub fn uses(&self, cheat: CheatKind) -> bool {
        self.cheats.contains(&cheat)
    }

    /// Speedhack and bunny-hop stack multiplicatively.
    pub fn move_speed(&self) -> f64 {
        let mut speed = 1.0;
        if self.uses(CheatKind::Speedhack) {
            speed = self.speed_multiplier;
        }
        if self.uses(CheatKind::BunnyHop) {
            speed *= BHOP_SPEED_BONUS;
        }
        speed
    }

    /// Per-axis shot spread. An aimbot tightens it to a fraction of a unit.
    pub fn spread(&self) -> f64 {
        if self.uses(CheatKind::Aimbot) {
            (1.0 - self.aimbot_strength) * 2.0
        } else {
            UNASSISTED_SPREAD
        }
    }
}

/// Closed set of player behaviours.
#[derive(Debug, Clone)]
pub enum Policy {
    Normal(NormalProfile),
    Cheating(CheatProfile),
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::Normal(_) => "normal",
            Policy::Cheating(_) => "cheat",
        }
    }
}

/// Point-in-time view of one player, body and behaviour together.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    #[serde(flatten)]
    pub state: AgentState,
    pub behavior_pattern: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_profile: Option<NormalProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheat_signature: Option<CheatProfile>,
}

/// A decision-making player.
pub struct Agent {
    id: AgentId,
    team: Team,
    policy: Policy,
    rng: ChaCha8Rng,
}

impl Agent {
    pub fn new(id: AgentId, team: Team, policy: Policy, rng: ChaCha8Rng) -> Self {
        Self {
            id,
            team,
            policy,
            rng,
        }
    }

    /// An honest player with freshly drawn skill.
    pub fn normal(id: AgentId, team: Team, mut rng: ChaCha8Rng) -> Self {
        let profile = NormalProfile::random(&mut rng);
        Self::new(id, team, Policy::Normal(profile), rng)
    }

    /// A cheater with a freshly drawn cheat profile.
    pub fn cheater(id: AgentId, team: Team, mut rng: ChaCha8Rng) -> Self {
        let profile = CheatProfile::random(&mut rng);
        Self::new(id, team, Policy::Cheating(profile), rng)
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn team(&self) -> Team {
        self.team
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn is_cheater(&self) -> bool {
        matches!(self.policy, Policy::Cheating(_))
    }

    pub fn cheat_profile(&self) -> Option<&CheatProfile> {
        match &self.policy {
            Policy::Cheating(profile) => Some(profile),
            Policy::Normal(_) => None,
        }
    }

    /// Records that the anti-cheat engine caught this player. No-op for
    /// honest players.
    pub fn mark_detected(&mut self) {
        if let Policy::Cheating(profile) = &mut self.policy {
            profile.detected = true;
        }
    }

    pub fn snapshot(&self, state: &AgentState) -> AgentSnapshot {
        let (normal_profile, cheat_signature) = match &self.policy {
            Policy::Normal(p) => (Some(p.clone()), None),
            Policy::Cheating(p) => (None, Some(p.clone())),
        };
        AgentSnapshot {
            state: state.clone(),
            behavior_pattern: self.policy.name(),
            normal_profile,
            cheat_signature,
        }
    }

    /// Chooses the next action.
    ///
    /// Eliminated players and players with nobody to shoot at wait.
    pub fn decide(&mut self, world: &impl EnemyQuery) -> Result<Action, EnvError> {
        let me = world
            .agent_state(self.id)
            .ok_or(EnvError::UnknownAgent(self.id))?;
        if !me.alive {
            return Ok(Action::Wait);
        }

        let action = match &self.policy {
            Policy::Normal(profile) => {
                let spread = profile.spread();
                let roll: f64 = self.rng.gen();
                if roll < 0.4 {
                    let target = advance_target(self.team, world.bounds(), &mut self.rng);
                    Action::move_to(target, self.rng.gen_range(0.5..1.0))
                } else if roll < 0.7 {
                    let enemies = world.visible_enemies(self.id);
                    match enemies.choose(&mut self.rng) {
                        Some(enemy) => {
                            let aim = scatter(enemy.position, spread, &mut self.rng);
                            Action::shoot_at(aim, Some(enemy.id))
                        }
                        None => Action::Wait,
                    }
                } else if roll < 0.85 {
                    Action::Reload
                } else {
                    Action::Wait
                }
            }
            Policy::Cheating(profile) => {
                let profile = profile.clone();
                let roll: f64 = self.rng.gen();
                if roll < 0.3 {
                    self.cheat_move(profile, world)
                } else if roll < 0.8 {
                    self.cheat_shot(profile, world)
                } else {
                    Action::Wait
                }
            }
        };

        Ok(action)
    }

    fn cheat_move(&mut self, profile: CheatProfile, world: &impl EnemyQuery) -> Action {
        let mut cheat_flags = CheatFlags::new();

        let tracked = if profile.uses(CheatKind::Wallhack) {
            nearest(world.all_enemies(self.id, profile.wallhack_range))
        } else {
            None
        };
        let target = match tracked {
            Some(enemy) => {
                cheat_flags.insert(CheatKind::Wallhack);
                enemy.position
            }
            None => advance_target(self.team, world.bounds(), &mut self.rng),
        };

        for cheat in [CheatKind::Speedhack, CheatKind::BunnyHop] {
            if profile.uses(cheat) {
                cheat_flags.insert(cheat);
            }
        }

        Action::Move {
            target,
            speed: profile.move_speed(),
            cheat_flags,
        }
    }

    fn cheat_shot(&mut self, profile: CheatProfile, world: &impl EnemyQuery) -> Action {
        let enemies = if profile.uses(CheatKind::Wallhack) {
            world.all_enemies(self.id, profile.wallhack_range)
        } else {
            world.visible_enemies(self.id)
        };
        let Some(enemy) = enemies.choose(&mut self.rng) else {
            return Action::Wait;
        };

        let aim = scatter(enemy.position, profile.spread(), &mut self.rng);

        Action::Shoot {
            target_position: aim,
            target_agent: Some(enemy.id),
            cheat_flags: profile.cheats,
        }
    }
}

/// A noisy point in the enemy half, kept on the map.
fn advance_target(team: Team, bounds: &MapBounds, rng: &mut impl Rng) -> Position {
    let x = match team {
        Team::A => rng.gen_range(0.0..30.0),
        Team::B => rng.gen_range(-30.0..0.0),
    };
    let z = rng.gen_range(-30.0..30.0);
    let noisy = Position::new(
        x + rng.gen_range(-5.0..5.0),
        0.0,
        z + rng.gen_range(-5.0..5.0),
    );
    bounds.clamp(noisy)
}

/// Uniform per-axis scatter around `p`.
fn scatter(p: Position, spread: f64, rng: &mut impl Rng) -> Position {
    let spread = spread.max(0.0);
    p + Position::new(
        rng.gen_range(-spread..=spread),
        rng.gen_range(-spread..=spread),
        rng.gen_range(-spread..=spread),
    )
}

fn nearest(enemies: Vec<EnemyContact>) -> Option<EnemyContact> {
    enemies
        .into_iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}
