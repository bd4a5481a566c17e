//! GhostLAN Environment Abstraction Layer
//!
//! This crate provides the abstraction that lets the GhostLAN match engine
//! run against **real time** (tokio) or a **simulated clock** (test harness).
//!
//! # Core Concept: Controlled Non-Determinism
//!
//! Everything that would make a match unreproducible is routed through
//! a [`MatchContext`]:
//! - Time (`now()`, `sleep()`)
//! - Randomness (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed, any suspicious
//! detection outcome can be replayed from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use ghostlan_env::{MatchContext, TokioContext};
//!
//! async fn pace<Ctx: MatchContext>(ctx: &Ctx, tick_rate_hz: f64) {
//!     ctx.sleep(Duration::from_secs_f64(1.0 / tick_rate_hz)).await;
//! }
//! ```

mod context;
mod network;
mod types;
mod error;
mod tokio_impl;

pub use context::{MatchContext, mix_seed};
pub use network::{NetworkConditions, NetworkController};
pub use types::{AgentId, MatchId, Team};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
