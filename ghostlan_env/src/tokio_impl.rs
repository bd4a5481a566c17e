//! Production implementation of MatchContext using Tokio.

use crate::context::{mix_seed, MatchContext};
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant, SystemTime};

/// Wall-clock context backed by Tokio.
///
/// Every `sleep` really waits, so tick pacing and simulated latency slow
/// the match down exactly as they would in a venue. Randomness comes from
/// the seed when one is given, otherwise from OS entropy.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Optional master seed
    seed: Option<u64>,
}

impl TokioContext {
    /// Creates an unseeded TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            seed: None,
        }
    }

    /// Creates a TokioContext whose random streams are reproducible.
    pub fn seeded(seed: u64) -> Self {
        Self {
            start: Instant::now(),
            seed: Some(seed),
        }
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(mix_seed(seed, stream)),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or(0)
    }
}
