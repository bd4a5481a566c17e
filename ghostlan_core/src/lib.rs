//! GhostLAN core: the match data model and the engines that run on it.
//!
//! - [`action`]: what agents do and what the venue reports back
//! - [`event`]: the append-only match log
//! - [`geometry`]: venue layout and collision
//! - [`anticheat`]: rule and anomaly detection over the event stream

pub mod action;
pub mod anticheat;
pub mod event;
pub mod geometry;

pub use action::{
    Action, ActionKind, ActionResult, CheatFlags, CheatKind, Effect, NetworkImpact, Position,
};
pub use anticheat::{
    AntiCheatConfig, AntiCheatEngine, AnomalyDetector, Detection, DetectionRule, DetectorError,
    Evidence, IsolationForest, AIMBOT_ACCURACY_THRESHOLD,
};
pub use event::{
    Event, EventKind, MatchStateSummary, MatchStats, NetworkEvent, NetworkEventKind,
    PerformanceMetrics,
};
pub use geometry::{GeometryError, MapBounds, MapGeometry, Obstacle, ObstacleKind, SpawnPoints};
