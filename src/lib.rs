//! Flow Runner - runtime core of a side-scrolling action runner
//!
//! Core modules:
//! - `sim`: Deterministic simulation (action physics, collisions, rewards, flow, difficulty)
//! - `perf`: Performance governor, quality tiers and transient object pools
//! - `persistence`: Save snapshots offered to / seeded from storage
//! - `settings`: Player preferences
//! - `tuning`: Data-driven game balance

pub mod perf;
pub mod persistence;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use perf::{PerformanceGovernor, QualityTier};
pub use persistence::SaveSnapshot;
pub use settings::Settings;
pub use sim::{Simulation, TickInput};
pub use tuning::Tuning;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 5;

    /// Lane layout: lanes are -1, 0, 1
    pub const MIN_LANE: i8 = -1;
    pub const MAX_LANE: i8 = 1;
    /// Lateral distance between lane centers (metres)
    pub const LANE_WIDTH: f32 = 1.2;

    /// Player body
    pub const PLAYER_WIDTH: f32 = 0.6;
    pub const PLAYER_HEIGHT: f32 = 1.8;
    /// Hitbox height while sliding
    pub const PLAYER_SLIDE_HEIGHT: f32 = 0.8;

    /// Nominal gravity (m/s², pulls toward -y)
    pub const GRAVITY: f32 = 30.0;
    pub const JUMP_VELOCITY: f32 = 11.0;
    pub const DOUBLE_JUMP_VELOCITY: f32 = 9.0;
    /// Downward velocity forced by a mid-air slide
    pub const FAST_FALL_VELOCITY: f32 = 14.0;
    pub const SLIDE_DURATION: f32 = 0.8;

    /// Wall running
    pub const WALL_RUN_MAX: f32 = 1.2;
    pub const WALL_KICK_VELOCITY: f32 = 7.0;

    /// Forward run speed (m/s)
    pub const BASE_SPEED: f32 = 10.0;
    pub const MAX_SPEED: f32 = 22.0;
    /// Speed gained per second of running
    pub const SPEED_RAMP: f32 = 0.08;

    /// Obstacle depth along the track
    pub const OBSTACLE_DEPTH: f32 = 1.0;
    /// Feet above this fraction of a hurdle's height clear it
    pub const VAULT_FRACTION: f32 = 0.85;

    /// Spawn frontier ahead of the player
    pub const SPAWN_AHEAD: f32 = 80.0;
    /// Entities this far behind the player are despawned
    pub const DESPAWN_BEHIND: f32 = 5.0;
}

use consts::{LANE_WIDTH, MAX_LANE, MIN_LANE};

/// Clamp a lane index into the track
#[inline]
pub fn clamp_lane(lane: i8) -> i8 {
    lane.clamp(MIN_LANE, MAX_LANE)
}

/// Lateral center of a lane (metres from track center)
#[inline]
pub fn lane_center(lane: i8) -> f32 {
    f32::from(lane) * LANE_WIDTH
}
