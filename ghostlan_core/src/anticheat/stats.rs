//! Rolling per-agent behaviour statistics.

use super::anomaly::FeatureVector;
use crate::action::{Action, ActionKind, ActionResult};
use serde::Serialize;
use std::collections::VecDeque;

/// Number of recent entries kept per history.
pub const HISTORY_WINDOW: usize = 50;

/// Rolling window of what one agent has been doing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    /// Recent action types
    pub actions: VecDeque<ActionKind>,

    /// Aim precision of recent shots
    pub accuracy_history: VecDeque<f64>,

    /// Speed multiplier of recent moves
    pub speed_history: VecDeque<f64>,
}

fn push_bounded<T>(buf: &mut VecDeque<T>, value: T) {
    if buf.len() == HISTORY_WINDOW {
        buf.pop_front();
    }
    buf.push_back(value);
}

/// (mean, population std, max) or the fallback when empty.
fn summarize(values: &VecDeque<f64>, fallback: (f64, f64, f64)) -> (f64, f64, f64) {
    if values.is_empty() {
        return fallback;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (mean, var.sqrt(), max)
}

impl AgentStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one resolved action into the windows.
    pub fn record(&mut self, action: &Action, result: &ActionResult) {
        push_bounded(&mut self.actions, action.kind());

        match action {
            Action::Shoot { .. } => {
                if let Some(accuracy) = result.accuracy {
                    push_bounded(&mut self.accuracy_history, accuracy);
                }
            }
            Action::Move { speed, .. } => push_bounded(&mut self.speed_history, *speed),
            Action::Reload | Action::Wait => {}
        }
    }

    /// Six-dimensional feature vector:
    /// `[acc_mean, acc_std, acc_max, speed_mean, speed_std, speed_max]`.
    ///
    /// Agents with no shots (or no moves) get neutral defaults for that half.
    pub fn features(&self) -> FeatureVector {
        let (am, asd, amax) = summarize(&self.accuracy_history, (0.5, 0.1, 0.5));
        let (sm, ssd, smax) = summarize(&self.speed_history, (1.0, 0.1, 1.0));
        FeatureVector::new(am, asd, amax, sm, ssd, smax)
    }

    /// Fraction of recent actions that were shots.
    pub fn shot_ratio(&self) -> f64 {
        if self.actions.is_empty() {
            return 0.0;
        }
        let shots = self.actions.iter().filter(|k| **k == ActionKind::Shoot).count();
        shots as f64 / self.actions.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{NetworkImpact, Position};
    use approx::assert_relative_eq;

    fn impact() -> NetworkImpact {
        NetworkImpact {
            latency_ms: 0.0,
            packet_loss: 0.0,
            bandwidth_used_mb: 0.1,
        }
    }

    fn shot_result(accuracy: f64) -> ActionResult {
        ActionResult {
            accuracy: Some(accuracy),
            ..ActionResult::succeeded(vec![], impact())
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let stats = AgentStats::new();
        let f = stats.features();
        assert_eq!(f.as_slice(), &[0.5, 0.1, 0.5, 1.0, 0.1, 1.0]);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = AgentStats::new();
        for i in 0..120 {
            let action = Action::move_to(Position::zeros(), i as f64);
            stats.record(&action, &ActionResult::succeeded(vec![], impact()));
        }
        assert_eq!(stats.actions.len(), HISTORY_WINDOW);
        assert_eq!(stats.speed_history.len(), HISTORY_WINDOW);
        // Oldest entries were evicted
        assert_eq!(stats.speed_history.front(), Some(&70.0));
    }

    #[test]
    fn test_accuracy_features() {
        let mut stats = AgentStats::new();
        let shot = Action::shoot_at(Position::zeros(), None);
        stats.record(&shot, &shot_result(0.2));
        stats.record(&shot, &shot_result(0.6));

        let f = stats.features();
        assert_relative_eq!(f[0], 0.4);
        assert_relative_eq!(f[1], 0.2);
        assert_relative_eq!(f[2], 0.6);
        assert_relative_eq!(stats.shot_ratio(), 1.0);
    }
}
