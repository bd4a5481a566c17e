//! Cheat detection over the match event stream.
//!
//! The engine consumes `agent_action` events one at a time. For each event it
//! updates the acting agent's rolling statistics, runs the signature rules
//! (first hit wins) and, once enough observations exist, asks the anomaly
//! model for an opinion on the agent's feature vector.
//!
//! Model failures never stop analysis: the engine falls back to rules only
//! until the model recovers.

pub mod anomaly;
pub mod rules;
pub mod stats;

pub use anomaly::{
    AnomalyDetector, AnomalyVerdict, DetectorError, FeatureVector, IsolationForest,
    IsolationForestConfig,
};
pub use rules::{RuleVerdict, AIMBOT_ACCURACY_THRESHOLD, RULE_PIPELINE, SPEEDHACK_THRESHOLD};
pub use stats::{AgentStats, HISTORY_WINDOW};

use crate::action::CheatKind;
use crate::event::Event;
use ghostlan_env::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, warn};

/// What tripped a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionRule {
    Aimbot,
    Wallhack,
    Speedhack,
    Triggerbot,
    Esp,
    #[serde(rename = "bhop")]
    BunnyHop,
    Anomaly,
}

impl DetectionRule {
    pub fn name(&self) -> &'static str {
        match self {
            DetectionRule::Aimbot => "aimbot",
            DetectionRule::Wallhack => "wallhack",
            DetectionRule::Speedhack => "speedhack",
            DetectionRule::Triggerbot => "triggerbot",
            DetectionRule::Esp => "esp",
            DetectionRule::BunnyHop => "bhop",
            DetectionRule::Anomaly => "anomaly",
        }
    }

    /// The cheat a signature rule looks for. `None` for the anomaly model.
    pub fn cheat(&self) -> Option<CheatKind> {
        match self {
            DetectionRule::Aimbot => Some(CheatKind::Aimbot),
            DetectionRule::Wallhack => Some(CheatKind::Wallhack),
            DetectionRule::Speedhack => Some(CheatKind::Speedhack),
            DetectionRule::Triggerbot => Some(CheatKind::Triggerbot),
            DetectionRule::Esp => Some(CheatKind::Esp),
            DetectionRule::BunnyHop => Some(CheatKind::BunnyHop),
            DetectionRule::Anomaly => None,
        }
    }
}

impl std::fmt::Display for DetectionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Supporting details of a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    Accuracy { accuracy: f64 },
    Speed { speed: f64 },
    CheatFlag { cheat: CheatKind },
    Anomaly { model: String, score: f64, features: [f64; 6] },
}

/// One entry of the detection log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub rule: DetectionRule,
    pub confidence: f64,
    pub agent_id: AgentId,

    /// Tick of the analyzed event
    pub tick: u64,

    pub details: Evidence,
}

#[derive(Debug, Clone)]
pub struct AntiCheatConfig {
    /// Observations required before the model is consulted (strictly more than this)
    pub min_observations: usize,

    /// Training buffer cap; oldest observations are evicted first
    pub max_observations: usize,

    /// Observations between model refits
    pub refit_interval: usize,

    /// Confidence attached to anomaly detections
    pub anomaly_confidence: f64,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            min_observations: 10,
            max_observations: 512,
            refit_interval: 25,
            anomaly_confidence: 0.8,
        }
    }
}

/// Rule + anomaly detection over `agent_action` events.
pub struct AntiCheatEngine {
    config: AntiCheatConfig,
    detector: Box<dyn AnomalyDetector>,

    stats: BTreeMap<AgentId, AgentStats>,
    observations: VecDeque<FeatureVector>,
    since_fit: usize,
    fitted: bool,
    degraded: bool,

    detections: Vec<Detection>,
    events_analyzed: u64,
}

impl AntiCheatEngine {
    /// Engine with the default isolation forest.
    pub fn new(config: AntiCheatConfig) -> Self {
        Self::with_detector(config, Box::new(IsolationForest::default()))
    }

    pub fn with_detector(config: AntiCheatConfig, detector: Box<dyn AnomalyDetector>) -> Self {
        Self {
            config,
            detector,
            stats: BTreeMap::new(),
            observations: VecDeque::new(),
            since_fit: 0,
            fitted: false,
            degraded: false,
            detections: Vec::new(),
            events_analyzed: 0,
        }
    }

    /// Analyzes one event and returns the authoritative detection, if any.
    ///
    /// At most one rule detection is recorded per event. Whenever the anomaly
    /// model flags the event it records a second one, which is returned
    /// instead of the rule hit only when its confidence beats the rule's.
    pub fn analyze(&mut self, event: &Event) -> Option<Detection> {
        let (agent_id, action, result) = event.agent_action()?;
        self.events_analyzed += 1;

        let stats = self.stats.entry(agent_id).or_default();
        stats.record(action, result);
        let features = stats.features();

        let rule_hit = rules::evaluate(action, result).map(|verdict| Detection {
            rule: verdict.rule,
            confidence: verdict.confidence,
            agent_id,
            tick: event.tick,
            details: verdict.evidence,
        });
        if let Some(detection) = &rule_hit {
            debug!(
                "{} flagged by {} (confidence {:.2}) at tick {}",
                agent_id, detection.rule, detection.confidence, event.tick
            );
            self.detections.push(detection.clone());
        }
        let rule_confidence = rule_hit.as_ref().map_or(0.0, |d| d.confidence);

        self.observe(features);

        match self.check_anomaly(&features) {
            Ok(Some(verdict)) if verdict.is_anomaly => {
                let detection = Detection {
                    rule: DetectionRule::Anomaly,
                    confidence: self.config.anomaly_confidence,
                    agent_id,
                    tick: event.tick,
                    details: Evidence::Anomaly {
                        model: self.detector.name().to_string(),
                        score: verdict.score,
                        features: std::array::from_fn(|i| features[i]),
                    },
                };
                debug!(
                    "{} flagged as anomalous (score {:.3}) at tick {}",
                    agent_id, verdict.score, event.tick
                );
                self.detections.push(detection.clone());
                if self.config.anomaly_confidence > rule_confidence {
                    return Some(detection);
                }
            }
            Ok(_) => {}
            Err(e) => self.degrade(e),
        }

        rule_hit
    }

    fn observe(&mut self, features: FeatureVector) {
        if self.observations.len() == self.config.max_observations {
            self.observations.pop_front();
        }
        self.observations.push_back(features);
        self.since_fit += 1;
    }

    fn check_anomaly(
        &mut self,
        features: &FeatureVector,
    ) -> Result<Option<AnomalyVerdict>, DetectorError> {
        if self.observations.len() <= self.config.min_observations {
            return Ok(None);
        }

        if !self.fitted || self.since_fit >= self.config.refit_interval {
            self.fitted = false;
            self.detector.fit(self.observations.make_contiguous())?;
            self.fitted = true;
            self.since_fit = 0;
            debug!(
                "{} refit on {} observations",
                self.detector.name(),
                self.observations.len()
            );
        }

        let verdict = self.detector.score(features)?;
        if self.degraded {
            info!("{} recovered, anomaly detection re-enabled", self.detector.name());
            self.degraded = false;
        }
        Ok(Some(verdict))
    }

    fn degrade(&mut self, error: DetectorError) {
        if self.degraded {
            debug!("{} still unavailable: {}", self.detector.name(), error);
        } else {
            warn!(
                "{} failed, continuing with rules only: {}",
                self.detector.name(),
                error
            );
            self.degraded = true;
        }
    }

    /// The full detection log, in order.
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn detections_for(&self, agent_id: AgentId) -> Vec<&Detection> {
        self.detections
            .iter()
            .filter(|d| d.agent_id == agent_id)
            .collect()
    }

    /// Agents with at least one detection.
    pub fn flagged_agents(&self) -> BTreeSet<AgentId> {
        self.detections.iter().map(|d| d.agent_id).collect()
    }

    pub fn agent_stats(&self, agent_id: AgentId) -> Option<&AgentStats> {
        self.stats.get(&agent_id)
    }

    /// True while the anomaly model is unavailable.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn events_analyzed(&self) -> u64 {
        self.events_analyzed
    }
}

impl Default for AntiCheatEngine {
    fn default() -> Self {
        Self::new(AntiCheatConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionResult, CheatFlags, NetworkImpact, Position};
    use crate::event::EventKind;

    struct FixedDetector {
        is_anomaly: bool,
    }

    impl AnomalyDetector for FixedDetector {
        fn fit(&mut self, _samples: &[FeatureVector]) -> Result<(), DetectorError> {
            Ok(())
        }

        fn score(&self, _sample: &FeatureVector) -> Result<AnomalyVerdict, DetectorError> {
            Ok(AnomalyVerdict {
                is_anomaly: self.is_anomaly,
                score: if self.is_anomaly { 0.9 } else { 0.3 },
            })
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    struct FailingDetector;

    impl AnomalyDetector for FailingDetector {
        fn fit(&mut self, samples: &[FeatureVector]) -> Result<(), DetectorError> {
            Err(DetectorError::InsufficientSamples {
                needed: 1000,
                got: samples.len(),
            })
        }

        fn score(&self, _sample: &FeatureVector) -> Result<AnomalyVerdict, DetectorError> {
            Err(DetectorError::NotFitted)
        }

        fn name(&self) -> &str {
            "Failing"
        }
    }

    fn impact() -> NetworkImpact {
        NetworkImpact {
            latency_ms: 15.0,
            packet_loss: 0.02,
            bandwidth_used_mb: 0.4,
        }
    }

    fn action_event(tick: u64, agent: usize, action: Action, accuracy: Option<f64>) -> Event {
        let result = ActionResult {
            accuracy,
            ..ActionResult::succeeded(vec![], impact())
        };
        Event::new(
            tick,
            EventKind::AgentAction {
                agent_id: AgentId(agent),
                action,
                result,
            },
            tick as f64 * 0.1,
        )
    }

    fn honest_move(tick: u64, agent: usize) -> Event {
        action_event(tick, agent, Action::move_to(Position::zeros(), 0.8), None)
    }

    fn engine_with(detector: Box<dyn AnomalyDetector>) -> AntiCheatEngine {
        AntiCheatEngine::with_detector(AntiCheatConfig::default(), detector)
    }

    #[test]
    fn test_rule_detection_is_recorded() {
        let mut engine = engine_with(Box::new(FixedDetector { is_anomaly: false }));
        let event = action_event(3, 2, Action::shoot_at(Position::zeros(), None), Some(0.99));

        let detection = engine.analyze(&event).unwrap();
        assert_eq!(detection.rule, DetectionRule::Aimbot);
        assert_eq!(detection.agent_id, AgentId(2));
        assert_eq!(detection.tick, 3);
        assert_eq!(engine.detections().len(), 1);
        assert_eq!(engine.detections_for(AgentId(2)).len(), 1);
        assert!(engine.detections_for(AgentId(1)).is_empty());
    }

    #[test]
    fn test_non_action_events_are_ignored() {
        let mut engine = AntiCheatEngine::default();
        let event = Event::new(0, EventKind::MatchState(Default::default()), 0.0);

        assert!(engine.analyze(&event).is_none());
        assert_eq!(engine.events_analyzed(), 0);
    }

    #[test]
    fn test_one_rule_detection_per_event() {
        let mut engine = engine_with(Box::new(FixedDetector { is_anomaly: false }));
        let flags: CheatFlags = CheatKind::ALL.iter().copied().collect();
        let event = action_event(
            0,
            0,
            Action::Shoot {
                target_position: Position::zeros(),
                target_agent: None,
                cheat_flags: flags,
            },
            Some(0.99),
        );

        engine.analyze(&event);
        assert_eq!(engine.detections().len(), 1);
    }

    #[test]
    fn test_anomaly_waits_for_observations() {
        let mut engine = engine_with(Box::new(FixedDetector { is_anomaly: true }));

        for tick in 0..10 {
            assert!(engine.analyze(&honest_move(tick, 0)).is_none());
        }
        let detection = engine.analyze(&honest_move(10, 0)).unwrap();
        assert_eq!(detection.rule, DetectionRule::Anomaly);
        assert_eq!(detection.confidence, 0.8);
    }

    #[test]
    fn test_anomaly_authority() {
        let mut engine = engine_with(Box::new(FixedDetector { is_anomaly: true }));
        for tick in 0..11 {
            engine.analyze(&honest_move(tick, 1));
        }
        let before = engine.detections().len();

        // Aimbot (0.9) outranks the model, which still records its verdict
        let aimbot = action_event(11, 0, Action::shoot_at(Position::zeros(), None), Some(0.99));
        assert_eq!(engine.analyze(&aimbot).unwrap().rule, DetectionRule::Aimbot);
        assert_eq!(engine.detections().len(), before + 2);

        // Speedhack (0.7) does not
        let fast = action_event(12, 0, Action::move_to(Position::zeros(), 1.8), None);
        assert_eq!(engine.analyze(&fast).unwrap().rule, DetectionRule::Anomaly);
        let log = engine.detections();
        assert_eq!(log[log.len() - 2].rule, DetectionRule::Speedhack);
        assert_eq!(log[log.len() - 1].rule, DetectionRule::Anomaly);
    }

    #[test]
    fn test_anomaly_recorded_alongside_rule_hit() {
        let mut engine = engine_with(Box::new(FixedDetector { is_anomaly: true }));
        for tick in 0..11 {
            engine.analyze(&honest_move(tick, 0));
        }
        let before = engine.detections().len();

        let aimbot = action_event(11, 0, Action::shoot_at(Position::zeros(), None), Some(0.99));
        let authoritative = engine.analyze(&aimbot).unwrap();
        assert_eq!(authoritative.rule, DetectionRule::Aimbot);
        assert_eq!(authoritative.confidence, 0.9);

        let added = &engine.detections()[before..];
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].rule, DetectionRule::Aimbot);
        assert_eq!(added[1].rule, DetectionRule::Anomaly);
        assert_eq!(added[1].tick, 11);
        assert_eq!(added[1].agent_id, AgentId(0));
        assert!(matches!(
            added[1].details,
            Evidence::Anomaly { score, .. } if score == 0.9
        ));
    }

    #[test]
    fn test_detector_failure_degrades_to_rules() {
        let mut engine = engine_with(Box::new(FailingDetector));
        for tick in 0..20 {
            engine.analyze(&honest_move(tick, 0));
        }
        assert!(engine.is_degraded());
        assert!(engine.detections().is_empty());

        let aimbot = action_event(20, 0, Action::shoot_at(Position::zeros(), None), Some(0.97));
        assert_eq!(engine.analyze(&aimbot).unwrap().rule, DetectionRule::Aimbot);
    }

    #[test]
    fn test_detection_log_is_append_only() {
        let mut engine = AntiCheatEngine::default();
        let mut previous: Vec<Detection> = Vec::new();

        for tick in 0..60u64 {
            let accuracy = if tick % 3 == 0 { 0.99 } else { 0.5 };
            let event = action_event(
                tick,
                (tick % 4) as usize,
                Action::shoot_at(Position::zeros(), None),
                Some(accuracy),
            );
            engine.analyze(&event);

            let current = engine.detections();
            assert!(current.len() >= previous.len());
            assert_eq!(&current[..previous.len()], previous.as_slice());
            assert!(current.windows(2).all(|w| w[0].tick <= w[1].tick));
            previous = current.to_vec();
        }
    }

    #[test]
    fn test_stats_tracked_per_agent() {
        let mut engine = AntiCheatEngine::default();
        engine.analyze(&honest_move(0, 0));
        engine.analyze(&honest_move(0, 1));
        engine.analyze(&honest_move(1, 1));

        assert_eq!(engine.agent_stats(AgentId(0)).unwrap().actions.len(), 1);
        assert_eq!(engine.agent_stats(AgentId(1)).unwrap().actions.len(), 2);
        assert!(engine.agent_stats(AgentId(7)).is_none());
    }
}
