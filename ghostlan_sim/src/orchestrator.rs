//! MatchOrchestrator - runs one match from spawn to final whistle.
//!
//! Each tick, strictly in order:
//! 1. `Environment::update` (network disturbances become `network` events)
//! 2. For every agent in arena order: decide, apply, log `agent_action`,
//!    hand the event to the anti-cheat engine
//! 3. One `match_state` event
//!
//! The match ends when a team is wiped out or the tick budget
//! (`duration × tick_rate`, rounded up) is spent, and always closes with a
//! single `match_end` event.

use crate::agent::{Agent, AgentSnapshot};
use crate::environment::{Environment, EnvironmentConfig, EnvironmentSnapshot};
use crate::seeds::SeedStream;
use crate::SimError;

use ghostlan_core::{
    AntiCheatConfig, AntiCheatEngine, Detection, Event, EventKind, MapGeometry, MatchStateSummary,
    MatchStats, Position,
};
use ghostlan_env::{MatchContext, MatchId, NetworkConditions, Team};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How far a spawn may be jittered from its spawn point on x and z.
const SPAWN_OFFSET: f64 = 5.0;

/// Which clock paces the match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Logical clock: as fast as possible, timestamps still reflect pacing
    #[default]
    Simulated,

    /// Wall clock: every delay really waits
    RealTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapPreset {
    #[default]
    LanCafe,
    OpenFloor,
}

impl MapPreset {
    pub fn geometry(&self) -> MapGeometry {
        match self {
            MapPreset::LanCafe => MapGeometry::lan_cafe(),
            MapPreset::OpenFloor => MapGeometry::open_floor(),
        }
    }
}

/// Configuration for one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub match_duration_seconds: f64,
    pub tick_rate_hz: f64,

    /// Split evenly into two teams
    pub num_players: usize,

    /// Chance each player is a cheater
    pub cheat_probability: f64,

    pub network_conditions: NetworkConditions,

    /// Master seed for determinism. The orchestrator draws from the seed
    /// of the context it is handed, so this must match `ctx.seed()`.
    pub seed: u64,

    /// Read by whoever builds the context ([`crate::ScenarioRunner`], the
    /// CLI). The orchestrator paces on the context it is handed.
    pub clock: ClockMode,
    pub map: MapPreset,
    pub environment: EnvironmentConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            match_duration_seconds: 300.0,
            tick_rate_hz: 60.0,
            num_players: 10,
            cheat_probability: 0.3,
            network_conditions: NetworkConditions::default(),
            seed: 42,
            clock: ClockMode::Simulated,
            map: MapPreset::LanCafe,
            environment: EnvironmentConfig::default(),
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_players == 0 || self.num_players % 2 != 0 {
            return Err(SimError::InvalidConfig(format!(
                "num_players must be a positive even number, got {}",
                self.num_players
            )));
        }
        if !(self.match_duration_seconds > 0.0 && self.match_duration_seconds.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "match_duration_seconds must be > 0, got {}",
                self.match_duration_seconds
            )));
        }
        if !(self.tick_rate_hz > 0.0 && self.tick_rate_hz.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "tick_rate_hz must be > 0, got {}",
                self.tick_rate_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.cheat_probability) {
            return Err(SimError::InvalidConfig(format!(
                "cheat_probability {} outside [0, 1]",
                self.cheat_probability
            )));
        }
        self.network_conditions.validate()?;
        self.environment.validate()
    }

    /// Tick budget: `ceil(duration × tick_rate)`.
    pub fn max_ticks(&self) -> u64 {
        (self.match_duration_seconds * self.tick_rate_hz).ceil() as u64
    }

    /// Pause between ticks. Saturates at `Duration::MAX` for subnormal rates.
    pub fn tick_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.tick_rate_hz).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Idle,
    Running,
    Ended,
}

/// Asks a match to stop after its current tick.
///
/// A stop requested before the match starts ends it at tick 0.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Point-in-time view of a match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub phase: MatchPhase,
    pub is_running: bool,
    pub current_tick: u64,
    pub elapsed_time: f64,
    pub agents: Vec<AgentSnapshot>,
    pub environment: EnvironmentSnapshot,
}

/// Owns the venue, the players and the logs of one match.
pub struct MatchOrchestrator<Ctx: MatchContext> {
    config: MatchConfig,
    ctx: Arc<Ctx>,
    match_id: MatchId,

    environment: Environment<Ctx>,
    agents: Vec<Agent>,
    anticheat: AntiCheatEngine,

    events: Vec<Event>,
    phase: MatchPhase,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    current_tick: u64,
    final_stats: Option<MatchStats>,
}

impl<Ctx: MatchContext> MatchOrchestrator<Ctx> {
    /// Validates the configuration and builds the venue.
    pub fn new(config: MatchConfig, ctx: Arc<Ctx>) -> Result<Self, SimError> {
        Self::with_anticheat(config, ctx, AntiCheatEngine::new(AntiCheatConfig::default()))
    }

    /// Like [`MatchOrchestrator::new`] with a custom detection engine.
    pub fn with_anticheat(
        config: MatchConfig,
        ctx: Arc<Ctx>,
        anticheat: AntiCheatEngine,
    ) -> Result<Self, SimError> {
        config.validate()?;
        if config.seed != ctx.seed() {
            warn!(
                "Match config seed {} differs from context seed {}; the context seed wins",
                config.seed,
                ctx.seed()
            );
        }

        let environment = Environment::new(
            ctx.clone(),
            config.map.geometry(),
            config.network_conditions,
            config.environment.clone(),
        )?;

        Ok(Self {
            match_id: MatchId::from_seed(ctx.seed()),
            config,
            ctx,
            environment,
            agents: Vec::new(),
            anticheat,
            events: Vec::new(),
            phase: MatchPhase::Idle,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            current_tick: 0,
            final_stats: None,
        })
    }

    fn require(&self, phase: MatchPhase, action: &'static str) -> Result<(), SimError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SimError::IllegalPhase {
                action,
                phase: self.phase,
            })
        }
    }

    /// Spawns both teams and starts the match.
    pub fn initialize(&mut self) -> Result<(), SimError> {
        self.require(MatchPhase::Idle, "initialize")?;
        self.events.clear();

        let mut roster_rng = SeedStream::Roster.rng(self.ctx.as_ref());
        let per_team = self.config.num_players / 2;

        for team in [Team::A, Team::B] {
            let spawns: Vec<Position> = self.environment.geometry().spawn_points(team).to_vec();
            if spawns.is_empty() {
                return Err(SimError::Setup(format!("{} has no spawn points", team)));
            }

            for slot in 0..per_team {
                let offset = Position::new(
                    roster_rng.gen_range(-SPAWN_OFFSET..SPAWN_OFFSET),
                    0.0,
                    roster_rng.gen_range(-SPAWN_OFFSET..SPAWN_OFFSET),
                );
                let id = self.environment.spawn(team, spawns[slot % spawns.len()] + offset);

                let rng = SeedStream::Agent(id).rng(self.ctx.as_ref());
                let agent = if roster_rng.gen::<f64>() < self.config.cheat_probability {
                    Agent::cheater(id, team, rng)
                } else {
                    Agent::normal(id, team, rng)
                };
                self.agents.push(agent);
            }
        }

        let cheaters = self.agents.iter().filter(|a| a.is_cheater()).count();
        info!(
            "Match {} initialized: {} players ({} cheaters), seed {}",
            self.match_id,
            self.agents.len(),
            cheaters,
            self.ctx.seed()
        );

        self.phase = MatchPhase::Running;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn timestamp(&self) -> f64 {
        self.ctx.now().as_secs_f64()
    }

    /// Plays one tick. Returns the phase afterwards.
    pub async fn step(&mut self) -> Result<MatchPhase, SimError> {
        self.require(MatchPhase::Running, "step")?;
        let tick = self.current_tick;

        for network_event in self.environment.update(tick) {
            let event = Event::new(tick, EventKind::Network(network_event), self.timestamp());
            self.events.push(event);
        }

        for index in 0..self.agents.len() {
            let id = self.agents[index].id();

            let action = match self.agents[index].decide(&self.environment) {
                Ok(action) => action,
                Err(e) => {
                    warn!("{} failed to decide at tick {}: {}", id, tick, e);
                    continue;
                }
            };
            let result = match self.environment.apply(id, &action).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("{} action rejected at tick {}: {}", id, tick, e);
                    continue;
                }
            };

            let event = Event::new(
                tick,
                EventKind::AgentAction {
                    agent_id: id,
                    action,
                    result,
                },
                self.timestamp(),
            );
            if let Some(detection) = self.anticheat.analyze(&event) {
                if let Some(suspect) = self.agents.get_mut(detection.agent_id.index()) {
                    suspect.mark_detected();
                }
            }
            self.events.push(event);
        }

        let summary = MatchStateSummary {
            elapsed_time: tick as f64 / self.config.tick_rate_hz,
            agents_alive: self.environment.agents().iter().filter(|a| a.alive).count(),
            network_health: self.environment.network_health(),
            performance_metrics: self.environment.performance_metrics(),
        };
        self.events
            .push(Event::new(tick, EventKind::MatchState(summary), self.timestamp()));

        self.current_tick += 1;
        if self.current_tick % (self.config.tick_rate_hz.ceil() as u64).max(1) == 0 {
            debug!(
                "Tick {}/{}: {} events, {} detections",
                self.current_tick,
                self.config.max_ticks(),
                self.events.len(),
                self.anticheat.detections().len()
            );
        }

        let wiped_out = [Team::A, Team::B]
            .into_iter()
            .find(|team| self.environment.alive_count(*team) == 0);
        if let Some(team) = wiped_out {
            info!("{} eliminated at tick {}", team, self.current_tick);
            self.end_match();
        } else if self.current_tick >= self.config.max_ticks() {
            self.end_match();
        }

        Ok(self.phase)
    }

    /// Plays ticks until `tick` is reached, the match ends, or a
    /// [`StopHandle`] stops it. Starts the match if it is still idle.
    ///
    /// Ticks are paced at `1 / tick_rate` through the context, on top of
    /// whatever latency the actions themselves incurred.
    pub async fn run_until(&mut self, tick: u64) -> Result<MatchPhase, SimError> {
        if self.phase == MatchPhase::Idle {
            self.initialize()?;
        }

        let interval = self.config.tick_interval();
        while self.phase == MatchPhase::Running && self.current_tick < tick {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!("Match {} stopped at tick {}", self.match_id, self.current_tick);
                self.end_match();
                break;
            }
            if self.step().await? == MatchPhase::Running {
                self.ctx.sleep(interval).await;
            }
        }
        Ok(self.phase)
    }

    /// Runs until the match ends or a [`StopHandle`] stops it.
    pub async fn run(&mut self) -> Result<MatchStats, SimError> {
        if self.phase == MatchPhase::Idle {
            self.initialize()?;
        }
        info!(
            "Match {} running: {} ticks at {} Hz",
            self.match_id,
            self.config.max_ticks(),
            self.config.tick_rate_hz
        );

        self.run_until(u64::MAX).await?;

        self.final_stats
            .clone()
            .ok_or(SimError::IllegalPhase {
                action: "report",
                phase: self.phase,
            })
    }

    fn end_match(&mut self) {
        let team_score = |team: Team| -> u32 {
            self.environment
                .agents()
                .iter()
                .filter(|a| a.team == team)
                .map(|a| a.score)
                .sum()
        };
        let team_a_score = team_score(Team::A);
        let team_b_score = team_score(Team::B);

        let stats = MatchStats {
            team_a_score,
            team_b_score,
            winner: if team_a_score > team_b_score {
                Team::A
            } else {
                Team::B
            },
            cheaters_detected: self
                .agents
                .iter()
                .filter(|a| a.cheat_profile().is_some_and(|p| p.detected))
                .count(),
            total_events: self.events.len(),
            match_duration: self.current_tick as f64 / self.config.tick_rate_hz,
        };

        info!(
            "Match {} ended at tick {}: {} {}-{}, {} cheater(s) detected",
            self.match_id,
            self.current_tick,
            stats.winner,
            stats.team_a_score,
            stats.team_b_score,
            stats.cheaters_detected
        );

        self.events.push(Event::new(
            self.current_tick,
            EventKind::MatchEnd(stats.clone()),
            self.timestamp(),
        ));
        self.final_stats = Some(stats);
        self.phase = MatchPhase::Ended;
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stops the match, then tears down the players and the venue.
    pub fn shutdown(&mut self) {
        info!("Shutting down match {}", self.match_id);
        self.stop_requested.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        if self.phase == MatchPhase::Running {
            self.end_match();
        }
        self.agents.clear();
        self.environment.shutdown();
        info!("Match {} shutdown complete", self.match_id);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            stop_requested: Arc::clone(&self.stop_requested),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn detections(&self) -> &[Detection] {
        self.anticheat.detections()
    }

    pub fn anticheat(&self) -> &AntiCheatEngine {
        &self.anticheat
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn environment(&self) -> &Environment<Ctx> {
        &self.environment
    }

    /// Mutable venue access, e.g. to change network conditions mid-match.
    pub fn environment_mut(&mut self) -> &mut Environment<Ctx> {
        &mut self.environment
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn final_stats(&self) -> Option<&MatchStats> {
        self.final_stats.as_ref()
    }

    pub fn current_state(&self) -> MatchSnapshot {
        let agents = self
            .agents
            .iter()
            .filter_map(|agent| {
                self.environment
                    .agent(agent.id())
                    .ok()
                    .map(|state| agent.snapshot(state))
            })
            .collect();

        MatchSnapshot {
            match_id: self.match_id,
            phase: self.phase,
            is_running: self.phase == MatchPhase::Running && self.running.load(Ordering::SeqCst),
            current_tick: self.current_tick,
            elapsed_time: self.current_tick as f64 / self.config.tick_rate_hz,
            agents,
            environment: self.environment.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use ghostlan_core::{Action, DetectionRule, AIMBOT_ACCURACY_THRESHOLD};
    use ghostlan_env::NetworkController;

    fn config(duration: f64, rate: f64, players: usize, cheat_probability: f64) -> MatchConfig {
        MatchConfig {
            match_duration_seconds: duration,
            tick_rate_hz: rate,
            num_players: players,
            cheat_probability,
            network_conditions: NetworkConditions::ideal(),
            seed: 7,
            ..MatchConfig::default()
        }
    }

    fn orchestrator(config: MatchConfig) -> MatchOrchestrator<SimContext> {
        let ctx = SimContext::shared(config.seed);
        MatchOrchestrator::new(config, ctx).unwrap()
    }

    fn count(events: &[Event], name: &str) -> usize {
        events.iter().filter(|e| e.kind.name() == name).count()
    }

    #[tokio::test]
    async fn test_one_second_at_two_hz_is_two_ticks() {
        let mut m = orchestrator(config(1.0, 2.0, 2, 0.0));
        let stats = m.run().await.unwrap();

        assert_eq!(m.current_tick(), 2);
        assert_eq!(count(m.events(), "match_state"), 2);
        assert_eq!(count(m.events(), "match_end"), 1);
        assert_eq!(stats.match_duration, 1.0);
        assert_eq!(m.phase(), MatchPhase::Ended);

        // Ties go to Team B
        let expected = if stats.team_a_score > stats.team_b_score { Team::A } else { Team::B };
        assert_eq!(stats.winner, expected);
        assert_eq!(stats.total_events, m.events().len() - 1);
    }

    #[tokio::test]
    async fn test_event_order_within_tick() {
        let mut m = orchestrator(config(0.5, 4.0, 4, 0.5));
        m.run().await.unwrap();

        let events = m.events();
        assert!(events.windows(2).all(|w| w[0].tick <= w[1].tick));
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(events.last().unwrap().kind.name(), "match_end");

        for tick in 0..m.current_tick() {
            let in_tick: Vec<&Event> = events.iter().filter(|e| e.tick == tick).collect();
            assert_eq!(in_tick.last().unwrap().kind.name(), "match_state");

            // Agents act in arena order
            let actors: Vec<usize> = in_tick.iter().filter_map(|e| e.agent_id()).map(|a| a.index()).collect();
            assert_eq!(actors, vec![0, 1, 2, 3]);
        }
    }

    #[tokio::test]
    async fn test_pacing_compounds_on_logical_clock() {
        let ctx = SimContext::shared(3);
        let mut cfg = config(1.0, 2.0, 2, 0.0);
        cfg.network_conditions = NetworkConditions {
            jitter_ms: 0.0,
            packet_loss: 0.0,
            ..NetworkConditions::default()
        };
        cfg.environment.network_events.latency_spike_chance = 0.0;
        let mut m = MatchOrchestrator::new(cfg, ctx.clone()).unwrap();
        m.run().await.unwrap();

        // One inter-tick sleep plus any move latency and reload delays
        assert!(ctx.now() >= Duration::from_millis(500));
        let latency_sleeps: f64 = m
            .events()
            .iter()
            .filter_map(|e| e.agent_action())
            .map(|(_, action, result)| match action {
                Action::Move { .. } if result.success => 0.015,
                Action::Reload => 2.0,
                _ => 0.0,
            })
            .sum();
        assert!((ctx.now().as_secs_f64() - (0.5 + latency_sleeps)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_phase_guards() {
        let mut m = orchestrator(config(1.0, 2.0, 2, 0.0));
        assert!(matches!(
            m.step().await,
            Err(SimError::IllegalPhase { phase: MatchPhase::Idle, .. })
        ));

        m.initialize().unwrap();
        assert!(matches!(m.initialize(), Err(SimError::IllegalPhase { .. })));
        assert_eq!(m.agents().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_handle_ends_match() {
        let mut m = orchestrator(config(10.0, 10.0, 4, 0.0));
        m.initialize().unwrap();
        m.step().await.unwrap();

        let handle = m.stop_handle();
        assert!(handle.is_running());
        handle.stop();

        let stats = m.run().await.unwrap();
        assert_eq!(m.current_tick(), 1);
        assert_eq!(stats.match_duration, 0.1);
        assert!(!m.current_state().is_running);
    }

    #[tokio::test]
    async fn test_stop_before_run_is_kept() {
        let mut m = orchestrator(config(10.0, 10.0, 4, 0.0));
        m.stop_handle().stop();

        let stats = m.run().await.unwrap();
        assert_eq!(m.current_tick(), 0);
        assert_eq!(stats.match_duration, 0.0);
        assert_eq!(count(m.events(), "match_end"), 1);
        assert_eq!(m.phase(), MatchPhase::Ended);
        assert!(!m.stop_handle().is_running());
    }

    #[tokio::test]
    async fn test_run_until_pauses_then_resumes() {
        let ctx = SimContext::shared(7);
        let cfg = config(1.0, 10.0, 6, 0.0);
        let mut m = MatchOrchestrator::new(cfg.clone(), ctx.clone()).unwrap();

        assert_eq!(m.run_until(4).await.unwrap(), MatchPhase::Running);
        assert_eq!(m.current_tick(), 4);
        assert_eq!(count(m.events(), "match_state"), 4);

        // Already there
        assert_eq!(m.run_until(4).await.unwrap(), MatchPhase::Running);
        assert_eq!(m.current_tick(), 4);

        let stats = m.run().await.unwrap();
        assert_eq!(m.phase(), MatchPhase::Ended);
        assert!(m.current_tick() > 4 && m.current_tick() <= 10);
        assert_eq!(count(m.events(), "match_end"), 1);

        // Splitting the run changes neither the log nor the clock
        let straight_ctx = SimContext::shared(7);
        let mut straight = MatchOrchestrator::new(cfg, straight_ctx.clone()).unwrap();
        assert_eq!(straight.run().await.unwrap(), stats);
        assert_eq!(straight.events(), m.events());
        assert_eq!(straight_ctx.now(), ctx.now());
    }

    #[test]
    fn test_tick_interval_saturates() {
        let mut cfg = config(1.0, 2.0, 2, 0.0);
        assert_eq!(cfg.tick_interval(), Duration::from_millis(500));

        cfg.tick_rate_hz = f64::MIN_POSITIVE / 4.0;
        assert!(cfg.tick_rate_hz > 0.0);
        assert_eq!(cfg.tick_interval(), Duration::MAX);
    }

    #[tokio::test]
    async fn test_shutdown_tears_down() {
        let mut m = orchestrator(config(10.0, 10.0, 4, 0.5));
        m.initialize().unwrap();
        m.step().await.unwrap();
        m.shutdown();

        assert_eq!(m.phase(), MatchPhase::Ended);
        assert_eq!(count(m.events(), "match_end"), 1);
        let state = m.current_state();
        assert!(state.agents.is_empty());
        assert_eq!(state.environment.agents_count, 0);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let ctx = SimContext::shared(1);
        for bad in [
            config(1.0, 2.0, 3, 0.0),
            config(1.0, 0.0, 2, 0.0),
            config(-1.0, 2.0, 2, 0.0),
            config(1.0, 2.0, 2, 1.5),
        ] {
            assert!(matches!(
                MatchOrchestrator::new(bad, ctx.clone()),
                Err(SimError::InvalidConfig(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_initialize_spawns_equal_teams() {
        let mut m = orchestrator(config(1.0, 2.0, 10, 0.3));
        m.initialize().unwrap();

        let state = m.current_state();
        let team_a = state.agents.iter().filter(|a| a.state.team == Team::A).count();
        assert_eq!(team_a, 5);
        assert_eq!(state.agents.len(), 10);

        for agent in &state.agents {
            let spawns = m.environment().geometry().spawn_points(agent.state.team);
            let near_spawn = spawns.iter().any(|s| {
                (s.x - agent.state.position.x).abs() <= SPAWN_OFFSET
                    && (s.z - agent.state.position.z).abs() <= SPAWN_OFFSET
            });
            assert!(near_spawn);
            assert_eq!(agent.state.health, 100.0);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_match() {
        let mut a = orchestrator(config(2.0, 10.0, 6, 0.5));
        let mut b = orchestrator(config(2.0, 10.0, 6, 0.5));
        a.run().await.unwrap();
        b.run().await.unwrap();

        assert_eq!(a.events(), b.events());
        assert_eq!(a.detections(), b.detections());
    }

    #[tokio::test]
    async fn test_detections_append_only_across_ticks() {
        let mut m = orchestrator(config(3.0, 10.0, 10, 1.0));
        m.initialize().unwrap();

        let mut previous: Vec<Detection> = Vec::new();
        while m.step().await.unwrap() == MatchPhase::Running {
            let current = m.detections();
            assert_eq!(&current[..previous.len()], previous.as_slice());
            previous = current.to_vec();
        }
    }

    #[tokio::test]
    async fn test_network_conditions_update_mid_match() {
        let mut m = orchestrator(config(2.0, 10.0, 2, 0.0));
        m.initialize().unwrap();
        m.step().await.unwrap();

        let lossy = NetworkConditions {
            packet_loss: 0.4,
            ..NetworkConditions::default()
        };
        m.environment_mut().set_network_conditions(lossy).unwrap();
        m.step().await.unwrap();

        let last_state = m
            .events()
            .iter()
            .rev()
            .find_map(|e| match &e.kind {
                EventKind::MatchState(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert!((last_state.network_health - 0.15).abs() < 1e-9);
    }

    /// Every cheater, clean network: every shot precise enough to trip the
    /// aimbot rule must be in the detection log for that agent and tick.
    #[tokio::test]
    async fn test_all_cheaters_aimbot_coverage() {
        let mut m = orchestrator(config(5.0, 10.0, 10, 1.0));
        m.run().await.unwrap();

        assert!(m.current_tick() <= 50);
        assert!(m.agents().iter().all(|a| a.is_cheater()));

        let mut precise_shots = 0;
        for event in m.events() {
            let Some((agent_id, Action::Shoot { .. }, result)) = event.agent_action() else {
                continue;
            };
            if result.accuracy.unwrap_or(0.0) > AIMBOT_ACCURACY_THRESHOLD {
                precise_shots += 1;
                assert!(m.detections().iter().any(|d| d.agent_id == agent_id
                    && d.tick == event.tick
                    && d.rule == DetectionRule::Aimbot));
            }
        }

        let aimbot_detections = m
            .detections()
            .iter()
            .filter(|d| d.rule == DetectionRule::Aimbot)
            .count();
        assert_eq!(aimbot_detections, precise_shots);
    }
}
