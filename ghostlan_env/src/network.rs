//! Network condition model shared by the venue and its controllers.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// Link quality applied to every action resolved in a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkConditions {
    /// Fraction of packets lost (0.0 - 1.0)
    pub packet_loss: f64,

    /// One-way latency in milliseconds
    pub latency_ms: f64,

    /// Latency jitter in milliseconds (uniform +/-)
    pub jitter_ms: f64,

    /// Available bandwidth in Mbps
    pub bandwidth_mbps: f64,
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self {
            packet_loss: 0.02,
            latency_ms: 15.0,
            jitter_ms: 5.0,
            bandwidth_mbps: 100.0,
        }
    }
}

impl NetworkConditions {
    /// A perfect LAN: no loss, no latency.
    pub fn ideal() -> Self {
        Self {
            packet_loss: 0.0,
            latency_ms: 0.0,
            jitter_ms: 0.0,
            bandwidth_mbps: 1000.0,
        }
    }

    /// Checks every field against its legal range.
    pub fn validate(&self) -> Result<(), EnvError> {
        if !(0.0..=1.0).contains(&self.packet_loss) {
            return Err(EnvError::invalid_conditions(format!(
                "packet_loss {} outside [0, 1]",
                self.packet_loss
            )));
        }
        if !(self.latency_ms >= 0.0 && self.latency_ms.is_finite()) {
            return Err(EnvError::invalid_conditions(format!(
                "latency_ms {} must be >= 0",
                self.latency_ms
            )));
        }
        if !(self.jitter_ms >= 0.0 && self.jitter_ms.is_finite()) {
            return Err(EnvError::invalid_conditions(format!(
                "jitter_ms {} must be >= 0",
                self.jitter_ms
            )));
        }
        if !(self.bandwidth_mbps > 0.0 && self.bandwidth_mbps.is_finite()) {
            return Err(EnvError::invalid_conditions(format!(
                "bandwidth_mbps {} must be > 0",
                self.bandwidth_mbps
            )));
        }
        Ok(())
    }

    /// Scalar link health in [0, 1] derived from loss and jitter.
    pub fn health(&self) -> f64 {
        (1.0 - self.packet_loss * 2.0 - self.jitter_ms / 100.0).clamp(0.0, 1.0)
    }
}

/// Anything whose network conditions can be reconfigured mid-match.
pub trait NetworkController {
    /// Replaces the base conditions after validating them.
    fn set_network_conditions(&mut self, conditions: NetworkConditions) -> Result<(), EnvError>;

    /// Returns the base conditions currently configured.
    fn network_conditions(&self) -> NetworkConditions;
}
