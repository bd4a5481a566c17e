//! Venue geometry: bounds, box obstacles and team spawn pools.
//!
//! Collision is an intentionally coarse swept-point test: a path is blocked
//! when either endpoint lies strictly inside an obstacle's box. Points on a
//! box face are outside (open interval).

use crate::action::Position;
use ghostlan_env::Team;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometry that cannot host a match.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Map bounds are empty")]
    EmptyBounds,

    #[error("No spawn points for {0}")]
    NoSpawnPoints(Team),

    #[error("Spawn point {index} of {team} lies inside an obstacle")]
    SpawnInsideObstacle { team: Team, index: usize },
}

/// Horizontal extent of the map (the y axis is unbounded).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl MapBounds {
    pub fn contains(&self, p: &Position) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.z >= self.z_min && p.z <= self.z_max
    }

    /// Clamps a point onto the playable area.
    pub fn clamp(&self, p: Position) -> Position {
        Position::new(
            p.x.clamp(self.x_min, self.x_max),
            p.y,
            p.z.clamp(self.z_min, self.z_max),
        )
    }

    /// Midpoint along x; team A holds x < center.
    pub fn center_x(&self) -> f64 {
        (self.x_min + self.x_max) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Wall,
    Cover,
    Station,
}

/// Axis-aligned box centred on `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub position: Position,
    pub size: Vector3<f64>,
}

impl Obstacle {
    pub fn new(kind: ObstacleKind, position: [f64; 3], size: [f64; 3]) -> Self {
        Self {
            kind,
            position: Position::from(position),
            size: Vector3::from(size),
        }
    }

    pub fn half_extents(&self) -> Vector3<f64> {
        self.size / 2.0
    }

    /// Strict containment on all three axes.
    pub fn contains(&self, p: &Position) -> bool {
        let half = self.half_extents();
        let d = p - self.position;
        d.x.abs() < half.x && d.y.abs() < half.y && d.z.abs() < half.z
    }
}

/// Spawn pools per team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoints {
    pub team_a: Vec<Position>,
    pub team_b: Vec<Position>,
}

/// Immutable map description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapGeometry {
    pub bounds: MapBounds,
    pub obstacles: Vec<Obstacle>,
    pub spawn_points: SpawnPoints,
}

impl MapGeometry {
    /// The default café LAN venue: a 200x200 floor split by a centre wall,
    /// four cover blocks and six rows of computer stations.
    pub fn lan_cafe() -> Self {
        let obstacles = vec![
            Obstacle::new(ObstacleKind::Wall, [0.0, 0.0, 0.0], [2.0, 10.0, 50.0]),
            Obstacle::new(ObstacleKind::Cover, [-30.0, 0.0, -20.0], [5.0, 3.0, 5.0]),
            Obstacle::new(ObstacleKind::Cover, [30.0, 0.0, 20.0], [5.0, 3.0, 5.0]),
            Obstacle::new(ObstacleKind::Cover, [-20.0, 0.0, 30.0], [5.0, 3.0, 5.0]),
            Obstacle::new(ObstacleKind::Cover, [20.0, 0.0, -30.0], [5.0, 3.0, 5.0]),
            Obstacle::new(ObstacleKind::Station, [-60.0, 0.0, -60.0], [10.0, 2.0, 10.0]),
            Obstacle::new(ObstacleKind::Station, [-60.0, 0.0, 0.0], [10.0, 2.0, 10.0]),
            Obstacle::new(ObstacleKind::Station, [-60.0, 0.0, 60.0], [10.0, 2.0, 10.0]),
            Obstacle::new(ObstacleKind::Station, [60.0, 0.0, -60.0], [10.0, 2.0, 10.0]),
            Obstacle::new(ObstacleKind::Station, [60.0, 0.0, 0.0], [10.0, 2.0, 10.0]),
            Obstacle::new(ObstacleKind::Station, [60.0, 0.0, 60.0], [10.0, 2.0, 10.0]),
        ];

        let lane = |x: f64| -> Vec<Position> {
            [-80.0, -40.0, 0.0, 40.0, 80.0]
                .iter()
                .map(|&z| Position::new(x, 0.0, z))
                .collect()
        };

        Self {
            bounds: MapBounds {
                x_min: -100.0,
                x_max: 100.0,
                z_min: -100.0,
                z_max: 100.0,
            },
            obstacles,
            spawn_points: SpawnPoints {
                team_a: lane(-80.0),
                team_b: lane(80.0),
            },
        }
    }

    /// An empty arena with the same bounds and spawns (no obstacles).
    pub fn open_floor() -> Self {
        Self {
            obstacles: Vec::new(),
            ..Self::lan_cafe()
        }
    }

    pub fn spawn_points(&self, team: Team) -> &[Position] {
        match team {
            Team::A => &self.spawn_points.team_a,
            Team::B => &self.spawn_points.team_b,
        }
    }

    /// Returns the first obstacle containing the point.
    pub fn obstacle_at(&self, p: &Position) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.contains(p))
    }

    /// Coarse path test used for moves and shots.
    pub fn is_blocked(&self, start: &Position, end: &Position) -> bool {
        self.obstacle_at(start).is_some() || self.obstacle_at(end).is_some()
    }

    /// Checks the map can host a match.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.bounds.x_min >= self.bounds.x_max || self.bounds.z_min >= self.bounds.z_max {
            return Err(GeometryError::EmptyBounds);
        }
        for team in [Team::A, Team::B] {
            let spawns = self.spawn_points(team);
            if spawns.is_empty() {
                return Err(GeometryError::NoSpawnPoints(team));
            }
            if let Some(index) = spawns.iter().position(|p| self.obstacle_at(p).is_some()) {
                return Err(GeometryError::SpawnInsideObstacle { team, index });
            }
        }
        Ok(())
    }
}

impl Default for MapGeometry {
    fn default() -> Self {
        Self::lan_cafe()
    }
}
