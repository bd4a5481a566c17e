//! Scenario runner - plays a preset match and checks the detector against
//! ground truth.
//!
//! The harness knows which players really cheat, so it can hold the
//! anti-cheat engine to a few hard guarantees:
//! - honest players never trip a flag or speed rule
//! - every shot above the aimbot accuracy threshold is in the detection log
//!   for that agent and tick
//! - the event and detection logs are in tick order and the match closes
//!   with exactly one `match_end`

use crate::context::SimContext;
use crate::exporter::MatchExport;
use crate::orchestrator::{ClockMode, MatchConfig, MatchOrchestrator, MatchPhase};
use crate::scenarios::ScenarioId;
use crate::SimError;

use ghostlan_core::{
    Action, Detection, DetectionRule, Effect, Event, EventKind, AIMBOT_ACCURACY_THRESHOLD,
};
use ghostlan_env::{AgentId, MatchContext, NetworkController, TokioContext};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all checks
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Match clock at the end of the run, in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    pub events: usize,
    pub agent_actions: usize,
    pub network_events: usize,

    pub detections: usize,
    pub detections_by_rule: BTreeMap<DetectionRule, usize>,

    /// Detections whose agent really cheats
    pub true_positives: usize,

    /// Detections whose agent is honest
    pub false_positives: usize,

    pub cheaters: usize,
    pub cheaters_detected: usize,

    /// Honest players with at least one detection
    pub honest_flagged: usize,

    /// Shots above the aimbot accuracy threshold
    pub precise_shots: usize,

    pub eliminations: usize,

    /// Worst action latency observed (ms)
    pub max_latency_ms: f64,

    /// Engine fell back to rules only at some point
    pub detector_degraded: bool,
}

impl ScenarioMetrics {
    /// Share of detections that hit a cheater.
    pub fn precision(&self) -> Option<f64> {
        (self.detections > 0).then(|| self.true_positives as f64 / self.detections as f64)
    }

    /// Share of cheaters caught at least once.
    pub fn recall(&self) -> Option<f64> {
        (self.cheaters > 0).then(|| self.cheaters_detected as f64 / self.cheaters as f64)
    }
}

/// A scenario result together with the full match record.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub result: ScenarioResult,
    pub export: MatchExport,
}

/// Field overrides layered on top of a scenario preset.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces the preset entirely (the runner's seed still applies)
    pub base: Option<MatchConfig>,

    pub duration_secs: Option<f64>,
    pub tick_rate_hz: Option<f64>,
    pub num_players: Option<usize>,
    pub cheat_probability: Option<f64>,
    pub packet_loss: Option<f64>,
    pub clock: Option<ClockMode>,
}

impl ConfigOverrides {
    pub fn apply(&self, preset: MatchConfig) -> MatchConfig {
        let mut config = match &self.base {
            Some(base) => MatchConfig {
                seed: preset.seed,
                ..base.clone()
            },
            None => preset,
        };

        if let Some(duration) = self.duration_secs {
            config.match_duration_seconds = duration;
        }
        if let Some(rate) = self.tick_rate_hz {
            config.tick_rate_hz = rate;
        }
        if let Some(players) = self.num_players {
            config.num_players = players;
        }
        if let Some(probability) = self.cheat_probability {
            config.cheat_probability = probability;
        }
        if let Some(loss) = self.packet_loss {
            config.network_conditions.packet_loss = loss;
        }
        if let Some(clock) = self.clock {
            config.clock = clock;
        }
        config
    }
}

/// Runs named scenarios.
pub struct ScenarioRunner {
    /// Master seed
    seed: u64,

    overrides: ConfigOverrides,
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.overrides.duration_secs = Some(secs);
        self
    }

    pub fn with_tick_rate(mut self, hz: f64) -> Self {
        self.overrides.tick_rate_hz = Some(hz);
        self
    }

    pub fn with_players(mut self, players: usize) -> Self {
        self.overrides.num_players = Some(players);
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The configuration `scenario` will run with.
    pub fn config_for(&self, scenario: ScenarioId) -> MatchConfig {
        self.overrides.apply(scenario.config(self.seed))
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> Result<ScenarioResult, SimError> {
        Ok(self.run_recorded(scenario).await?.result)
    }

    /// Runs a scenario and keeps the full match record.
    pub async fn run_recorded(&self, scenario: ScenarioId) -> Result<ScenarioRun, SimError> {
        let config = self.config_for(scenario);
        info!(
            "Starting scenario: {} (seed={}) - {}",
            scenario.name(),
            self.seed,
            scenario.description()
        );

        match config.clock {
            ClockMode::Simulated => self.play(scenario, config, SimContext::shared(self.seed)).await,
            ClockMode::RealTime => {
                self.play(scenario, config, Arc::new(TokioContext::seeded(self.seed)))
                    .await
            }
        }
    }

    async fn play<Ctx: MatchContext>(
        &self,
        scenario: ScenarioId,
        config: MatchConfig,
        ctx: Arc<Ctx>,
    ) -> Result<ScenarioRun, SimError> {
        let max_ticks = config.max_ticks();
        let mut orchestrator = MatchOrchestrator::new(config, ctx.clone())?;
        orchestrator.initialize()?;

        if let Some(shift) = scenario.network_shift() {
            let at = shift.at_tick(max_ticks);
            if orchestrator.run_until(at).await? == MatchPhase::Running {
                orchestrator
                    .environment_mut()
                    .set_network_conditions(shift.conditions)?;
                info!(
                    "Network shift at tick {}: latency {}ms, jitter {}ms, loss {}",
                    at, shift.conditions.latency_ms, shift.conditions.jitter_ms, shift.conditions.packet_loss
                );
            }
        }

        let stats = orchestrator.run().await?;

        let cheaters: BTreeSet<AgentId> = orchestrator
            .agents()
            .iter()
            .filter(|a| a.is_cheater())
            .map(|a| a.id())
            .collect();
        let mut metrics = collect_metrics(orchestrator.events(), orchestrator.detections(), &cheaters);
        metrics.cheaters_detected = stats.cheaters_detected;
        metrics.detector_degraded = orchestrator.anticheat().is_degraded();

        let mut failures = check_logs(orchestrator.events(), orchestrator.detections(), &cheaters);
        if stats.total_events + 1 != orchestrator.events().len() {
            failures.push(format!(
                "match_end reports {} events, log holds {} before it",
                stats.total_events,
                orchestrator.events().len().saturating_sub(1)
            ));
        }
        if scenario.expects_detections() && metrics.detections == 0 {
            failures.push(format!("{} cheater(s) played without a single detection", metrics.cheaters));
        }

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failures.is_empty(),
            total_ticks: orchestrator.current_tick(),
            final_time_secs: ctx.now().as_secs_f64(),
            failure_reason: (!failures.is_empty()).then(|| failures.join("; ")),
            metrics,
        };

        if result.passed {
            debug!(
                "{}: {} detections ({} true, {} false), {}/{} cheaters caught",
                scenario.name(),
                result.metrics.detections,
                result.metrics.true_positives,
                result.metrics.false_positives,
                result.metrics.cheaters_detected,
                result.metrics.cheaters
            );
        } else {
            warn!(
                "{} (seed={}) failed: {}",
                scenario.name(),
                self.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }

        let export = MatchExport::capture(&orchestrator).with_scenario(scenario.name());
        orchestrator.shutdown();

        Ok(ScenarioRun { result, export })
    }
}

/// Tallies detector and match metrics from the logs.
pub fn collect_metrics(
    events: &[Event],
    detections: &[Detection],
    cheaters: &BTreeSet<AgentId>,
) -> ScenarioMetrics {
    let mut metrics = ScenarioMetrics {
        events: events.len(),
        detections: detections.len(),
        cheaters: cheaters.len(),
        ..ScenarioMetrics::default()
    };

    for event in events {
        match &event.kind {
            EventKind::Network(_) => metrics.network_events += 1,
            EventKind::AgentAction { action, result, .. } => {
                metrics.agent_actions += 1;
                metrics.max_latency_ms = metrics.max_latency_ms.max(result.network_impact.latency_ms);
                if result.has_effect(Effect::Eliminated) {
                    metrics.eliminations += 1;
                }
                if matches!(action, Action::Shoot { .. })
                    && result.accuracy.is_some_and(|a| a > AIMBOT_ACCURACY_THRESHOLD)
                {
                    metrics.precise_shots += 1;
                }
            }
            _ => {}
        }
    }

    let mut honest_flagged = BTreeSet::new();
    for detection in detections {
        *metrics.detections_by_rule.entry(detection.rule).or_insert(0) += 1;
        if cheaters.contains(&detection.agent_id) {
            metrics.true_positives += 1;
        } else {
            metrics.false_positives += 1;
            honest_flagged.insert(detection.agent_id);
        }
    }
    metrics.honest_flagged = honest_flagged.len();

    metrics
}

/// Rules that only fire on cheat flags or impossible speeds.
fn is_signature_only(rule: DetectionRule) -> bool {
    matches!(
        rule,
        DetectionRule::Wallhack
            | DetectionRule::Speedhack
            | DetectionRule::Triggerbot
            | DetectionRule::Esp
            | DetectionRule::BunnyHop
    )
}

/// Checks the logs against ground truth. Returns one message per violation.
pub fn check_logs(
    events: &[Event],
    detections: &[Detection],
    cheaters: &BTreeSet<AgentId>,
) -> Vec<String> {
    let mut failures = Vec::new();

    let match_ends = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::MatchEnd(_)))
        .count();
    if match_ends != 1 {
        failures.push(format!("expected one match_end, found {}", match_ends));
    } else if !matches!(events.last().map(|e| &e.kind), Some(EventKind::MatchEnd(_))) {
        failures.push("match_end is not the last event".to_string());
    }

    if let Some(pair) = events.windows(2).find(|w| w[0].tick > w[1].tick) {
        failures.push(format!("event log goes back from tick {} to {}", pair[0].tick, pair[1].tick));
    }
    if let Some(pair) = detections.windows(2).find(|w| w[0].tick > w[1].tick) {
        failures.push(format!(
            "detection log goes back from tick {} to {}",
            pair[0].tick, pair[1].tick
        ));
    }

    for detection in detections {
        if is_signature_only(detection.rule) && !cheaters.contains(&detection.agent_id) {
            failures.push(format!(
                "honest {} tripped {} at tick {}",
                detection.agent_id, detection.rule, detection.tick
            ));
        }
    }

    let aimbot_hits: HashSet<(AgentId, u64)> = detections
        .iter()
        .filter(|d| d.rule == DetectionRule::Aimbot)
        .map(|d| (d.agent_id, d.tick))
        .collect();
    for event in events {
        let Some((agent_id, Action::Shoot { .. }, result)) = event.agent_action() else {
            continue;
        };
        let Some(accuracy) = result.accuracy else {
            continue;
        };
        if accuracy > AIMBOT_ACCURACY_THRESHOLD && !aimbot_hits.contains(&(agent_id, event.tick)) {
            failures.push(format!(
                "{} shot with accuracy {:.3} at tick {} without an aimbot detection",
                agent_id, accuracy, event.tick
            ));
        }
    }

    failures
}
