//! The LAN venue.
//!
//! The environment is the ground truth of a match:
//! - Map geometry and collision
//! - Every agent's body (position, health, score), stored in an arena
//! - Network conditions, disturbances and synthetic host telemetry
//!
//! Agents never touch their own state. They propose an [`Action`], and
//! [`Environment::apply`] decides what actually happens.

use crate::network::{NetworkEventConfig, NetworkSimulator};
use crate::seeds::SeedStream;
use crate::SimError;
use ghostlan_core::{
    Action, ActionResult, Effect, MapBounds, MapGeometry, NetworkEvent, NetworkImpact,
    PerformanceMetrics, Position,
};
use ghostlan_env::{AgentId, EnvError, MatchContext, NetworkConditions, NetworkController, Team};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Points for landing a hit.
pub const HIT_POINTS: u32 = 10;

/// Points for an elimination.
pub const KILL_POINTS: u32 = 100;

/// Misses farther than this from the target score zero precision.
const PRECISION_FALLOFF: f64 = 10.0;

/// Venue tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Enemies strictly closer than this are visible
    pub visibility_radius: f64,

    /// Hit probability before the packet-loss penalty
    pub base_hit_accuracy: f64,

    /// Hit probability never drops below this
    pub min_hit_accuracy: f64,

    /// Damage per hit is uniform in [damage_min, damage_max)
    pub damage_min: f64,
    pub damage_max: f64,

    /// Fixed reload delay (seconds)
    pub reload_secs: f64,

    pub network_events: NetworkEventConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            visibility_radius: 50.0,
            base_hit_accuracy: 0.8,
            min_hit_accuracy: 0.1,
            damage_min: 20.0,
            damage_max: 50.0,
            reload_secs: 2.0,
            network_events: NetworkEventConfig::default(),
        }
    }
}

impl EnvironmentConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.visibility_radius > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "visibility_radius {} must be > 0",
                self.visibility_radius
            )));
        }
        if !(0.0..=1.0).contains(&self.base_hit_accuracy)
            || !(0.0..=1.0).contains(&self.min_hit_accuracy)
        {
            return Err(SimError::InvalidConfig(
                "hit accuracies must lie in [0, 1]".to_string(),
            ));
        }
        if !(0.0 < self.damage_min && self.damage_min < self.damage_max) {
            return Err(SimError::InvalidConfig(format!(
                "damage range [{}, {}) is empty",
                self.damage_min, self.damage_max
            )));
        }
        if !(self.reload_secs >= 0.0 && self.reload_secs.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "reload_secs {} must be >= 0",
                self.reload_secs
            )));
        }
        Ok(())
    }
}

/// One agent's body as the venue sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub team: Team,
    pub position: Position,

    /// Always within [0, 100]
    pub health: f64,

    pub score: u32,
    pub kills: u32,
    pub deaths: u32,

    /// Mean aim precision over all shots fired
    pub accuracy: f64,
    pub shots_fired: u32,

    pub alive: bool,
}

impl AgentState {
    pub fn new(id: AgentId, team: Team, position: Position) -> Self {
        Self {
            id,
            team,
            position,
            health: 100.0,
            score: 0,
            kills: 0,
            deaths: 0,
            accuracy: 0.0,
            shots_fired: 0,
            alive: true,
        }
    }

    fn record_shot(&mut self, precision: f64) {
        self.shots_fired += 1;
        self.accuracy += (precision - self.accuracy) / self.shots_fired as f64;
    }
}

/// An enemy as reported to a querying agent.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyContact {
    pub id: AgentId,
    pub position: Position,
    pub health: f64,
    pub distance: f64,
}

/// What an agent may ask the venue while deciding.
pub trait EnemyQuery {
    fn agent_state(&self, id: AgentId) -> Option<&AgentState>;

    /// Alive enemies strictly within the visibility radius.
    fn visible_enemies(&self, id: AgentId) -> Vec<EnemyContact>;

    /// Alive enemies within `range`, obstacles ignored.
    fn all_enemies(&self, id: AgentId, range: f64) -> Vec<EnemyContact>;

    fn bounds(&self) -> &MapBounds;
}

/// Point-in-time view of the venue.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSnapshot {
    pub network_conditions: NetworkConditions,
    pub effective_conditions: NetworkConditions,
    pub performance_metrics: PerformanceMetrics,
    pub agents_count: usize,
    pub map_bounds: MapBounds,
    pub recent_network_events: Vec<NetworkEvent>,
}

/// The venue a match is played in.
pub struct Environment<Ctx: MatchContext> {
    ctx: Arc<Ctx>,
    config: EnvironmentConfig,
    geometry: MapGeometry,

    /// Base conditions; disturbances are layered on top
    conditions: NetworkConditions,
    network: NetworkSimulator,

    /// Agent bodies indexed by `AgentId`
    agents: Vec<AgentState>,

    rng: ChaCha8Rng,
    telemetry_rng: ChaCha8Rng,
    performance: PerformanceMetrics,
}

impl<Ctx: MatchContext> Environment<Ctx> {
    /// Builds the venue. Fails on unusable geometry, conditions or tunables.
    pub fn new(
        ctx: Arc<Ctx>,
        geometry: MapGeometry,
        conditions: NetworkConditions,
        config: EnvironmentConfig,
    ) -> Result<Self, SimError> {
        geometry.validate()?;
        conditions.validate()?;
        config.validate()?;

        let network = NetworkSimulator::new(
            config.network_events.clone(),
            SeedStream::NetworkEvents.rng(ctx.as_ref()),
        );
        let rng = SeedStream::Venue.rng(ctx.as_ref());
        let telemetry_rng = SeedStream::Telemetry.rng(ctx.as_ref());

        info!(
            "Venue ready: {} obstacles, {:.0} ms latency, {:.1}% loss",
            geometry.obstacles.len(),
            conditions.latency_ms,
            conditions.packet_loss * 100.0
        );

        Ok(Self {
            ctx,
            config,
            geometry,
            conditions,
            network,
            agents: Vec::new(),
            rng,
            telemetry_rng,
            performance: PerformanceMetrics {
                network_health: conditions.health(),
                ..PerformanceMetrics::default()
            },
        })
    }

    /// Places a new agent body and returns its handle.
    pub fn spawn(&mut self, team: Team, position: Position) -> AgentId {
        let id = AgentId(self.agents.len());
        let position = self.geometry.bounds.clamp(position);
        self.agents.push(AgentState::new(id, team, position));
        debug!("{} spawned for {} at {:?}", id, team, position.as_slice());
        id
    }

    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Result<&AgentState, EnvError> {
        self.agents.get(id.index()).ok_or(EnvError::UnknownAgent(id))
    }

    pub fn alive_count(&self, team: Team) -> usize {
        self.agents.iter().filter(|a| a.team == team && a.alive).count()
    }

    pub fn geometry(&self) -> &MapGeometry {
        &self.geometry
    }

    fn now_secs(&self) -> f64 {
        self.ctx.now().as_secs_f64()
    }

    /// Advances disturbances and telemetry. Returns newly started network events.
    pub fn update(&mut self, tick: u64) -> Vec<NetworkEvent> {
        let now = self.now_secs();
        let roster: Vec<AgentId> = self.agents.iter().map(|a| a.id).collect();
        let fresh = self.network.update(now, &self.conditions, &roster);
        if !fresh.is_empty() {
            debug!("Tick {}: {} new network event(s)", tick, fresh.len());
        }

        self.performance = PerformanceMetrics {
            fps: (60.0 - self.telemetry_rng.gen_range(0.0..20.0f64)).max(30.0),
            cpu_usage: self.telemetry_rng.gen_range(20.0..80.0f64).min(100.0),
            memory_usage: self.telemetry_rng.gen_range(30.0..70.0f64).min(100.0),
            network_health: self.conditions.health(),
        };

        fresh
    }

    pub fn network_health(&self) -> f64 {
        self.performance.network_health
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.performance
    }

    /// Conditions in effect right now, disturbances included.
    pub fn effective_conditions(&self) -> NetworkConditions {
        self.network.effective_conditions(&self.conditions, self.now_secs())
    }

    pub fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            network_conditions: self.conditions,
            effective_conditions: self.effective_conditions(),
            performance_metrics: self.performance,
            agents_count: self.agents.len(),
            map_bounds: self.geometry.bounds,
            recent_network_events: self.network.history().cloned().collect(),
        }
    }

    /// Resolves one action for `id`.
    ///
    /// A blocked move or a missed shot is a normal outcome (`success` may be
    /// false). Errors are reserved for actors that cannot act at all and
    /// malformed inputs.
    pub async fn apply(&mut self, id: AgentId, action: &Action) -> Result<ActionResult, EnvError> {
        // Eliminated players can only wait out the match
        let actor = self.agent(id)?;
        if !actor.alive && *action != Action::Wait {
            return Err(EnvError::AgentEliminated(id));
        }

        let impact = self.network_impact(id);

        match action {
            Action::Move { target, speed, .. } => self.resolve_move(id, target, *speed, impact).await,
            Action::Shoot {
                target_position,
                target_agent,
                ..
            } => self.resolve_shot(id, target_position, *target_agent, impact),
            Action::Reload => {
                let reload = Duration::try_from_secs_f64(self.config.reload_secs)
                    .unwrap_or(Duration::MAX);
                self.ctx.sleep(reload).await;
                Ok(ActionResult {
                    reload_time_secs: Some(self.config.reload_secs),
                    ..ActionResult::succeeded(vec![Effect::Reloaded], impact)
                })
            }
            Action::Wait => Ok(ActionResult::succeeded(Vec::new(), impact)),
        }
    }

    async fn resolve_move(
        &mut self,
        id: AgentId,
        target: &Position,
        speed: f64,
        impact: NetworkImpact,
    ) -> Result<ActionResult, EnvError> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(EnvError::invalid_action(format!("move speed {}", speed)));
        }
        if target.iter().any(|c| !c.is_finite()) {
            return Err(EnvError::invalid_action("move target is not finite"));
        }

        let start = self.agent(id)?.position;
        if !self.geometry.bounds.contains(target) || self.geometry.is_blocked(&start, target) {
            return Ok(ActionResult::rejected(Effect::Collision, impact));
        }

        let latency_ms = self.effective_conditions().latency_ms;
        let delay = Duration::try_from_secs_f64(latency_ms / 1000.0).unwrap_or(Duration::MAX);
        self.ctx.sleep(delay).await;

        self.agents[id.index()].position = *target;

        Ok(ActionResult {
            new_position: Some(*target),
            ..ActionResult::succeeded(vec![Effect::Moved], impact)
        })
    }

    fn resolve_shot(
        &mut self,
        id: AgentId,
        aim: &Position,
        target_agent: Option<AgentId>,
        impact: NetworkImpact,
    ) -> Result<ActionResult, EnvError> {
        if aim.iter().any(|c| !c.is_finite()) {
            return Err(EnvError::invalid_action("shot target is not finite"));
        }

        let shooter = self.agent(id)?;
        let shooter_pos = shooter.position;
        let shooter_team = shooter.team;

        let loss = self
            .network
            .packet_loss_for(id, self.conditions.packet_loss, self.now_secs());
        let hit_probability =
            (self.config.base_hit_accuracy - loss * 2.0).max(self.config.min_hit_accuracy);

        // Only an enemy is a legitimate target
        let target = target_agent
            .and_then(|t| self.agents.get(t.index()))
            .filter(|t| t.team != shooter_team)
            .map(|t| (t.id, t.position, t.alive));

        let accuracy = target.map(|(_, position, _)| {
            (1.0 - (aim - position).norm() / PRECISION_FALLOFF).clamp(0.0, 1.0)
        });
        if let Some(precision) = accuracy {
            self.agents[id.index()].record_shot(precision);
        }

        let mut result = ActionResult {
            accuracy,
            hit_probability: Some(hit_probability),
            target: target.map(|(t, _, _)| t),
            ..ActionResult::succeeded(Vec::new(), impact)
        };

        if self.geometry.is_blocked(&shooter_pos, aim) {
            result.effects.push(Effect::Obstructed);
            return Ok(result);
        }

        let roll: f64 = self.rng.gen();
        let Some((target_id, _, true)) = target else {
            result.effects.push(Effect::Miss);
            return Ok(result);
        };
        if roll >= hit_probability {
            result.effects.push(Effect::Miss);
            return Ok(result);
        }

        let damage = self
            .rng
            .gen_range(self.config.damage_min..self.config.damage_max);
        result.damage = Some(damage);
        result.effects.extend([Effect::Hit, Effect::DamageDealt]);

        let victim = &mut self.agents[target_id.index()];
        victim.health = (victim.health - damage).max(0.0);
        let eliminated = victim.health <= 0.0;
        if eliminated {
            victim.alive = false;
            victim.deaths += 1;
            result.effects.push(Effect::Eliminated);
        }

        let shooter = &mut self.agents[id.index()];
        shooter.score += HIT_POINTS;
        if eliminated {
            shooter.kills += 1;
            shooter.score += KILL_POINTS;
            debug!("{} eliminated {}", id, target_id);
        }

        Ok(result)
    }

    fn network_impact(&mut self, id: AgentId) -> NetworkImpact {
        let now = self.now_secs();
        let effective = self.network.effective_conditions(&self.conditions, now);
        let jitter = if effective.jitter_ms > 0.0 {
            self.rng.gen_range(-effective.jitter_ms..=effective.jitter_ms)
        } else {
            0.0
        };

        NetworkImpact {
            latency_ms: (effective.latency_ms + jitter).max(0.0),
            packet_loss: self
                .network
                .packet_loss_for(id, self.conditions.packet_loss, now),
            bandwidth_used_mb: self.rng.gen_range(0.1..1.0),
        }
    }

    fn enemies_where(
        &self,
        id: AgentId,
        within: impl Fn(f64) -> bool,
    ) -> Vec<EnemyContact> {
        let Some(me) = self.agents.get(id.index()) else {
            return Vec::new();
        };

        self.agents
            .iter()
            .filter(|other| other.alive && other.team != me.team)
            .filter_map(|other| {
                let distance = (other.position - me.position).norm();
                within(distance).then(|| EnemyContact {
                    id: other.id,
                    position: other.position,
                    health: other.health,
                    distance,
                })
            })
            .collect()
    }

    /// Drops every agent body. The venue is unusable afterwards.
    pub fn shutdown(&mut self) {
        info!("Shutting down venue ({} agent bodies)", self.agents.len());
        self.agents.clear();
    }
}

impl<Ctx: MatchContext> EnemyQuery for Environment<Ctx> {
    fn agent_state(&self, id: AgentId) -> Option<&AgentState> {
        self.agents.get(id.index())
    }

    fn visible_enemies(&self, id: AgentId) -> Vec<EnemyContact> {
        let radius = self.config.visibility_radius;
        self.enemies_where(id, |d| d < radius)
    }

    fn all_enemies(&self, id: AgentId, range: f64) -> Vec<EnemyContact> {
        self.enemies_where(id, |d| d <= range)
    }

    fn bounds(&self) -> &MapBounds {
        &self.geometry.bounds
    }
}

impl<Ctx: MatchContext> NetworkController for Environment<Ctx> {
    fn set_network_conditions(&mut self, conditions: NetworkConditions) -> Result<(), EnvError> {
        conditions.validate()?;
        info!(
            "Network conditions updated: {:.0} ms latency, {:.1}% loss",
            conditions.latency_ms,
            conditions.packet_loss * 100.0
        );
        self.conditions = conditions;
        self.performance.network_health = conditions.health();
        Ok(())
    }

    fn network_conditions(&self) -> NetworkConditions {
        self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use ghostlan_core::CheatFlags;
    use proptest::prelude::*;

    fn venue(conditions: NetworkConditions) -> (Arc<SimContext>, Environment<SimContext>) {
        let ctx = SimContext::shared(42);
        let env = Environment::new(
            ctx.clone(),
            MapGeometry::lan_cafe(),
            conditions,
            EnvironmentConfig::default(),
        )
        .unwrap();
        (ctx, env)
    }

    fn p(x: f64, y: f64, z: f64) -> Position {
        Position::new(x, y, z)
    }

    #[tokio::test]
    async fn test_move_commits_after_latency() {
        let (ctx, mut env) = venue(NetworkConditions::default());
        let id = env.spawn(Team::A, p(-80.0, 0.0, 0.0));

        let result = env
            .apply(id, &Action::move_to(p(-70.0, 0.0, 10.0), 1.0))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.effects, vec![Effect::Moved]);
        assert_eq!(env.agent(id).unwrap().position, p(-70.0, 0.0, 10.0));
        assert!((ctx.now().as_secs_f64() - 0.015).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_blocked_move_leaves_position() {
        let (ctx, mut env) = venue(NetworkConditions::default());
        let id = env.spawn(Team::A, p(-80.0, 0.0, 0.0));

        // Inside the centre wall
        let result = env
            .apply(id, &Action::move_to(p(0.0, 0.0, 0.0), 1.0))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.effects, vec![Effect::Collision]);
        assert_eq!(env.agent(id).unwrap().position, p(-80.0, 0.0, 0.0));
        // Rejected before the latency delay
        assert_eq!(ctx.now(), Duration::ZERO);

        let outside = env
            .apply(id, &Action::move_to(p(-150.0, 0.0, 0.0), 1.0))
            .await
            .unwrap();
        assert!(outside.has_effect(Effect::Collision));
    }

    #[tokio::test]
    async fn test_move_onto_face_is_accepted() {
        let (_, mut env) = venue(NetworkConditions::ideal());
        let id = env.spawn(Team::A, p(-10.0, 0.0, 0.0));

        // Centre wall spans x in [-1, 1]
        let result = env
            .apply(id, &Action::move_to(p(-1.0, 0.0, 0.0), 1.0))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_errors() {
        let (_, mut env) = venue(NetworkConditions::default());
        let id = env.spawn(Team::A, p(-80.0, 0.0, 0.0));

        let err = env
            .apply(id, &Action::move_to(p(-70.0, 0.0, 0.0), -1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvError::InvalidAction(_)));

        let err = env.apply(AgentId(9), &Action::Wait).await.unwrap_err();
        assert!(matches!(err, EnvError::UnknownAgent(AgentId(9))));
    }

    #[tokio::test]
    async fn test_reload_delay() {
        let (ctx, mut env) = venue(NetworkConditions::default());
        let id = env.spawn(Team::B, p(80.0, 0.0, 0.0));

        let result = env.apply(id, &Action::Reload).await.unwrap();
        assert_eq!(result.effects, vec![Effect::Reloaded]);
        assert_eq!(result.reload_time_secs, Some(2.0));
        assert_eq!(ctx.now(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_extreme_delays_saturate() {
        let mut conditions = NetworkConditions::ideal();
        conditions.latency_ms = 1e23;
        assert!(conditions.validate().is_ok());

        let (ctx, mut env) = venue(conditions);
        let id = env.spawn(Team::A, p(-80.0, 0.0, 0.0));
        let result = env
            .apply(id, &Action::move_to(p(-70.0, 0.0, 10.0), 1.0))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(ctx.time_ns(), u64::MAX);

        let config = EnvironmentConfig {
            reload_secs: 1e300,
            ..EnvironmentConfig::default()
        };
        let ctx = SimContext::shared(42);
        let mut env = Environment::new(
            ctx.clone(),
            MapGeometry::lan_cafe(),
            NetworkConditions::ideal(),
            config,
        )
        .unwrap();
        let id = env.spawn(Team::B, p(80.0, 0.0, 0.0));
        let result = env.apply(id, &Action::Reload).await.unwrap();
        assert_eq!(result.reload_time_secs, Some(1e300));
        assert_eq!(ctx.time_ns(), u64::MAX);
    }

    #[tokio::test]
    async fn test_perfect_shots_eliminate() {
        let (_, mut env) = venue(NetworkConditions::ideal());
        let shooter = env.spawn(Team::A, p(-40.0, 0.0, 60.0));
        let victim = env.spawn(Team::B, p(-30.0, 0.0, 80.0));

        let mut shots = 0;
        while env.agent(victim).unwrap().alive {
            let aim = env.agent(victim).unwrap().position;
            let result = env
                .apply(shooter, &Action::shoot_at(aim, Some(victim)))
                .await
                .unwrap();
            assert_eq!(result.accuracy, Some(1.0));
            assert_eq!(result.hit_probability, Some(0.8));
            shots += 1;
            assert!(shots < 200);
        }

        let dead = env.agent(victim).unwrap();
        assert_eq!(dead.health, 0.0);
        assert_eq!(dead.deaths, 1);

        let killer = env.agent(shooter).unwrap();
        assert_eq!(killer.kills, 1);
        assert!(killer.score >= KILL_POINTS + HIT_POINTS * 2);
        assert_eq!(killer.accuracy, 1.0);

        let err = env.apply(victim, &Action::Reload).await.unwrap_err();
        assert!(matches!(err, EnvError::AgentEliminated(_)));
        assert!(env.apply(victim, &Action::Wait).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_shot_precision_and_loss_penalty() {
        let lossy = NetworkConditions {
            packet_loss: 0.5,
            ..NetworkConditions::default()
        };
        let (_, mut env) = venue(lossy);
        let shooter = env.spawn(Team::A, p(-40.0, 0.0, 60.0));
        let victim = env.spawn(Team::B, p(-30.0, 0.0, 80.0));

        let aim = p(-30.0, 0.0, 85.0);
        let action = Action::Shoot {
            target_position: aim,
            target_agent: Some(victim),
            cheat_flags: CheatFlags::new(),
        };
        let result = env.apply(shooter, &action).await.unwrap();

        assert_eq!(result.accuracy, Some(0.5));
        assert_eq!(result.hit_probability, Some(0.1));
        assert!(result.network_impact.packet_loss >= 0.5);
    }

    #[tokio::test]
    async fn test_friendly_target_is_a_miss() {
        let (_, mut env) = venue(NetworkConditions::ideal());
        let a = env.spawn(Team::A, p(-80.0, 0.0, 0.0));
        let mate = env.spawn(Team::A, p(-80.0, 0.0, 40.0));

        let aim = env.agent(mate).unwrap().position;
        let result = env.apply(a, &Action::shoot_at(aim, Some(mate))).await.unwrap();

        assert_eq!(result.effects, vec![Effect::Miss]);
        assert_eq!(result.accuracy, None);
        assert_eq!(env.agent(mate).unwrap().health, 100.0);
    }

    #[tokio::test]
    async fn test_network_impact_on_every_result() {
        let (_, mut env) = venue(NetworkConditions::default());
        let id = env.spawn(Team::A, p(-80.0, 0.0, 0.0));

        for action in [Action::Wait, Action::Reload] {
            let result = env.apply(id, &action).await.unwrap();
            let impact = result.network_impact;
            assert!((10.0..=20.0).contains(&impact.latency_ms));
            assert!((0.1..1.0).contains(&impact.bandwidth_used_mb));
        }
    }

    #[test]
    fn test_visibility_excludes_teammates_and_dead() {
        let (_, mut env) = venue(NetworkConditions::default());
        let me = env.spawn(Team::A, p(-80.0, 0.0, 0.0));
        env.spawn(Team::A, p(-80.0, 0.0, 10.0));
        let near = env.spawn(Team::B, p(-40.0, 0.0, 0.0));
        let far = env.spawn(Team::B, p(80.0, 0.0, 0.0));
        let dead = env.spawn(Team::B, p(-70.0, 0.0, 0.0));
        env.agents[dead.index()].alive = false;

        let visible: Vec<AgentId> = env.visible_enemies(me).iter().map(|e| e.id).collect();
        assert_eq!(visible, vec![near]);

        let all: Vec<AgentId> = env.all_enemies(me, 200.0).iter().map(|e| e.id).collect();
        assert_eq!(all, vec![near, far]);
    }

    #[test]
    fn test_visibility_radius_is_strict() {
        let (_, mut env) = venue(NetworkConditions::default());
        let me = env.spawn(Team::A, p(-80.0, 0.0, 0.0));
        env.spawn(Team::B, p(-30.0, 0.0, 0.0));

        assert!(env.visible_enemies(me).is_empty());
        assert_eq!(env.all_enemies(me, 50.0).len(), 1);
    }

    #[test]
    fn test_set_network_conditions() {
        let (_, mut env) = venue(NetworkConditions::default());
        let bad = NetworkConditions {
            packet_loss: 1.5,
            ..NetworkConditions::default()
        };
        assert!(env.set_network_conditions(bad).is_err());
        assert_eq!(env.network_conditions(), NetworkConditions::default());

        env.set_network_conditions(NetworkConditions::ideal()).unwrap();
        assert_eq!(env.network_health(), 1.0);
    }

    #[test]
    fn test_update_telemetry_ranges() {
        let (_, mut env) = venue(NetworkConditions::default());
        for tick in 0..50 {
            env.update(tick);
            let m = env.performance_metrics();
            assert!((40.0..=60.0).contains(&m.fps));
            assert!((20.0..80.0).contains(&m.cpu_usage));
            assert!((30.0..70.0).contains(&m.memory_usage));
            assert!((m.network_health - 0.91).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_setup_is_fatal() {
        let ctx = SimContext::shared(1);
        let bad = NetworkConditions {
            bandwidth_mbps: 0.0,
            ..NetworkConditions::default()
        };
        let result = Environment::new(
            ctx,
            MapGeometry::lan_cafe(),
            bad,
            EnvironmentConfig::default(),
        );
        assert!(matches!(result, Err(SimError::Env(_))));
    }

    proptest! {
        #[test]
        fn prop_all_enemies_covers_visible(
            positions in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 2..12),
            range in 0.0f64..300.0,
        ) {
            let (_, mut env) = venue(NetworkConditions::default());
            for (i, (x, z)) in positions.iter().enumerate() {
                let team = if i % 2 == 0 { Team::A } else { Team::B };
                env.spawn(team, p(*x, 0.0, *z));
            }

            for agent in env.agents().iter().map(|a| a.id).collect::<Vec<_>>() {
                let all: Vec<AgentId> = env.all_enemies(agent, range).iter().map(|e| e.id).collect();
                for visible in env.visible_enemies(agent).iter().filter(|v| v.distance <= range) {
                    prop_assert!(all.contains(&visible.id));
                }
            }
        }
    }
}
