//! Error types for the GhostLAN environment abstraction.

use crate::types::AgentId;
use thiserror::Error;

/// Errors raised while resolving a single agent's turn.
///
/// None of these are fatal to a match: the orchestrator treats them as
/// the agent doing nothing for the tick.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The handle does not refer to an agent in the arena
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// An eliminated agent tried to do something other than wait
    #[error("Agent {0} has been eliminated")]
    AgentEliminated(AgentId),

    /// Action payload cannot be resolved (non-finite target, bad speed, ...)
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Network conditions outside their legal ranges
    #[error("Invalid network conditions: {0}")]
    InvalidConditions(String),
}

impl EnvError {
    /// Creates an invalid-action error.
    pub fn invalid_action(msg: impl Into<String>) -> Self {
        Self::InvalidAction(msg.into())
    }

    /// Creates an invalid-conditions error.
    pub fn invalid_conditions(msg: impl Into<String>) -> Self {
        Self::InvalidConditions(msg.into())
    }
}
