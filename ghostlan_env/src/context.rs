//! Core environment context trait for GhostLAN matches.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, SystemTime};

/// The central interface for time and entropy.
///
/// This trait abstracts the "real world" so that the match engine can run
/// paced by the wall clock or as fast as possible on a logical clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, seeded or OS entropy
/// - **Simulation**: `SimContext` - virtual clock, always seeded
///
/// # Compounding delays
///
/// Tick pacing and per-action latency both go through [`MatchContext::sleep`].
/// On the wall clock they consume real time; on the logical clock they only
/// advance it. Either way the two delays add up on the same timeline.
#[async_trait]
pub trait MatchContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for event timestamps. In simulation, this is the virtual clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time corresponding to `now()`.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Derives an independent random stream.
    ///
    /// The implementation combines the global seed with `stream` so that
    /// every subsystem (venue, each agent, the anomaly model) draws from
    /// its own reproducible sequence.
    fn derive_rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// An unseeded production context returns 0.
    fn seed(&self) -> u64;
}

/// Mixes a master seed with a stream number.
pub fn mix_seed(seed: u64, stream: u64) -> u64 {
    seed.wrapping_mul(0x9e3779b97f4a7c15)
        .wrapping_add(stream.wrapping_mul(0x517cc1b727220a95))
}
