//! Signature rules.
//!
//! Each rule inspects one resolved action. The engine runs them in
//! [`RULE_PIPELINE`] order and keeps the first hit. Flag rules fire on
//! any action kind that carries the flag.

use super::{DetectionRule, Evidence};
use crate::action::{Action, ActionResult, CheatKind};

/// Shots with aim precision strictly above this are considered assisted.
pub const AIMBOT_ACCURACY_THRESHOLD: f64 = 0.95;

/// Moves faster than this multiplier are considered assisted.
pub const SPEEDHACK_THRESHOLD: f64 = 1.5;

/// A rule hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleVerdict {
    pub rule: DetectionRule,
    pub confidence: f64,
    pub evidence: Evidence,
}

pub type RuleFn = fn(&Action, &ActionResult) -> Option<RuleVerdict>;

/// Rules in evaluation order.
pub const RULE_PIPELINE: [(DetectionRule, RuleFn); 6] = [
    (DetectionRule::Aimbot, detect_aimbot),
    (DetectionRule::Wallhack, detect_wallhack),
    (DetectionRule::Speedhack, detect_speedhack),
    (DetectionRule::Triggerbot, detect_triggerbot),
    (DetectionRule::Esp, detect_esp),
    (DetectionRule::BunnyHop, detect_bhop),
];

fn flagged(rule: DetectionRule, cheat: CheatKind, confidence: f64) -> RuleVerdict {
    RuleVerdict {
        rule,
        confidence,
        evidence: Evidence::CheatFlag { cheat },
    }
}

pub fn detect_aimbot(action: &Action, result: &ActionResult) -> Option<RuleVerdict> {
    if !matches!(action, Action::Shoot { .. }) {
        return None;
    }
    let accuracy = result.accuracy?;
    (accuracy > AIMBOT_ACCURACY_THRESHOLD).then(|| RuleVerdict {
        rule: DetectionRule::Aimbot,
        confidence: 0.9,
        evidence: Evidence::Accuracy { accuracy },
    })
}

pub fn detect_wallhack(action: &Action, _result: &ActionResult) -> Option<RuleVerdict> {
    action
        .flags(CheatKind::Wallhack)
        .then(|| flagged(DetectionRule::Wallhack, CheatKind::Wallhack, 0.8))
}

pub fn detect_speedhack(action: &Action, _result: &ActionResult) -> Option<RuleVerdict> {
    let speed = action.speed()?;
    (speed > SPEEDHACK_THRESHOLD).then(|| RuleVerdict {
        rule: DetectionRule::Speedhack,
        confidence: 0.7,
        evidence: Evidence::Speed { speed },
    })
}

pub fn detect_triggerbot(action: &Action, _result: &ActionResult) -> Option<RuleVerdict> {
    action
        .flags(CheatKind::Triggerbot)
        .then(|| flagged(DetectionRule::Triggerbot, CheatKind::Triggerbot, 0.75))
}

pub fn detect_esp(action: &Action, _result: &ActionResult) -> Option<RuleVerdict> {
    action
        .flags(CheatKind::Esp)
        .then(|| flagged(DetectionRule::Esp, CheatKind::Esp, 0.8))
}

pub fn detect_bhop(action: &Action, _result: &ActionResult) -> Option<RuleVerdict> {
    action
        .flags(CheatKind::BunnyHop)
        .then(|| flagged(DetectionRule::BunnyHop, CheatKind::BunnyHop, 0.6))
}

/// Runs the pipeline and returns the first hit.
pub fn evaluate(action: &Action, result: &ActionResult) -> Option<RuleVerdict> {
    RULE_PIPELINE.iter().find_map(|(_, rule)| rule(action, result))
}
