//! Game state and core simulation types
//!
//! All state that the tick loop mutates for a single run lives here.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use crate::consts::*;
use crate::lane_center;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// Run ended by a fatal collision
    GameOver,
}

/// Discrete action mode of the player; exactly one is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActionMode {
    #[default]
    Running,
    Jumping,
    Sliding,
    WallRunning,
}

/// Which side of the track a wall stands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallSide {
    Left,
    Right,
}

/// Player kinematic state, mutated only by the physics step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    /// Feet height above the ground
    pub y: f32,
    /// Vertical velocity (+ is up)
    pub vy: f32,
    pub lane: i8,
    pub mode: ActionMode,
    /// Side and id of the wall being run on (WallRunning only)
    pub wall_side: Option<WallSide>,
    pub wall_id: Option<u32>,
    /// Wall left during this airborne cycle; cannot be grabbed again before landing
    #[serde(default)]
    pub last_wall: Option<u32>,
    /// Seconds spent on the current wall
    pub wall_time: f32,
    /// Seconds of slide remaining
    pub slide_time: f32,
    pub double_jump_used: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            y: 0.0,
            vy: 0.0,
            lane: 0,
            mode: ActionMode::Running,
            wall_side: None,
            wall_id: None,
            last_wall: None,
            wall_time: 0.0,
            slide_time: 0.0,
            double_jump_used: false,
        }
    }
}

impl PlayerState {
    /// Hitbox height for the current mode
    pub fn body_height(&self) -> f32 {
        match self.mode {
            ActionMode::Sliding => PLAYER_SLIDE_HEIGHT,
            _ => PLAYER_HEIGHT,
        }
    }

    /// Hitbox at a given feet height (used for forward simulation)
    pub fn hitbox_at(&self, y: f32) -> Aabb {
        Aabb::standing(
            0.0,
            lane_center(self.lane),
            y,
            PLAYER_WIDTH,
            PLAYER_WIDTH,
            self.body_height(),
        )
    }

    pub fn hitbox(&self) -> Aabb {
        self.hitbox_at(self.y)
    }

    pub fn is_grounded(&self) -> bool {
        self.y <= 0.0 && self.mode != ActionMode::WallRunning
    }
}

/// How an obstacle can be avoided once the player is in contact with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Avoidance {
    /// Feet must be above the vault threshold at contact
    Jump,
    /// Must be Sliding and clear of the box
    Duck,
    /// Only changing lane avoids it
    LaneChange,
}

/// Closed set of obstacle kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObstacleKind {
    /// Low barrier that can be jumped
    Hurdle { height: f32 },
    /// Beam overhead that must be slid under; box starts at `clearance`
    Overhang { clearance: f32 },
    /// Full-height block, dodge by lane
    Barricade { height: f32 },
}

impl ObstacleKind {
    /// Vertical extent (bottom, top) of the obstacle
    pub fn vertical_extent(&self) -> (f32, f32) {
        match *self {
            ObstacleKind::Hurdle { height } => (0.0, height),
            ObstacleKind::Overhang { clearance } => (clearance, clearance + 2.0),
            ObstacleKind::Barricade { height } => (0.0, height),
        }
    }

    pub fn avoidance(&self) -> Avoidance {
        match self {
            ObstacleKind::Hurdle { .. } => Avoidance::Jump,
            ObstacleKind::Overhang { .. } => Avoidance::Duck,
            ObstacleKind::Barricade { .. } => Avoidance::LaneChange,
        }
    }

    /// Feet height needed to vault a jumpable obstacle
    pub fn vault_height(&self) -> Option<f32> {
        match *self {
            ObstacleKind::Hurdle { height } => Some(height * VAULT_FRACTION),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObstacleKind::Hurdle { .. } => "hurdle",
            ObstacleKind::Overhang { .. } => "overhang",
            ObstacleKind::Barricade { .. } => "barricade",
        }
    }
}

/// An obstacle entity, advected toward the player each frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    /// Track position of the obstacle center
    pub x: f32,
    pub lane: i8,
    pub kind: ObstacleKind,
    /// Already rewarded as a near miss
    #[serde(default)]
    pub near_miss_flagged: bool,
}

impl Obstacle {
    pub fn new(id: u32, x: f32, lane: i8, kind: ObstacleKind) -> Self {
        Self {
            id,
            x,
            lane: crate::clamp_lane(lane),
            kind,
            near_miss_flagged: false,
        }
    }

    pub fn hitbox(&self) -> Aabb {
        let (bottom, top) = self.kind.vertical_extent();
        Aabb::standing(
            self.x,
            lane_center(self.lane),
            bottom,
            OBSTACLE_DEPTH,
            LANE_WIDTH * 0.8,
            top - bottom,
        )
    }

    /// Trailing edge has gone behind the player's back edge
    pub fn is_behind_player(&self) -> bool {
        self.x + OBSTACLE_DEPTH / 2.0 < -PLAYER_WIDTH / 2.0
    }
}

/// A wall beside the track that can be run on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wall {
    pub id: u32,
    /// Track position of the wall's leading end
    pub x: f32,
    pub length: f32,
    /// Vertical span that can be run on
    pub base: f32,
    pub top: f32,
    pub side: WallSide,
}

impl Wall {
    /// True while the wall spans the player's track position
    pub fn spans_player(&self) -> bool {
        self.x <= 0.0 && self.x + self.length >= 0.0
    }

    /// Only the lane next to the wall can touch it
    pub fn reachable_from(&self, lane: i8) -> bool {
        match self.side {
            WallSide::Left => lane == MIN_LANE,
            WallSide::Right => lane == MAX_LANE,
        }
    }

    pub fn contains_height(&self, y: f32) -> bool {
        y >= self.base && y <= self.top
    }

    pub fn is_behind_player(&self) -> bool {
        self.x + self.length < -PLAYER_WIDTH / 2.0
    }

    pub fn end_x(&self) -> f32 {
        self.x + self.length
    }

    pub fn center(&self) -> Vec3 {
        let z = match self.side {
            WallSide::Left => crate::lane_center(MIN_LANE) - LANE_WIDTH,
            WallSide::Right => crate::lane_center(MAX_LANE) + LANE_WIDTH,
        };
        Vec3::new(self.x + self.length / 2.0, (self.base + self.top) / 2.0, z)
    }
}

/// Timed scale applied to gravity (e.g. a low-gravity event)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityModifier {
    pub scale: f32,
    /// Seconds remaining
    pub remaining: f32,
}

/// Active capabilities and timed effects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveEffects {
    pub shield_active: bool,
    pub double_jump_unlocked: bool,
    pub gravity: Option<GravityModifier>,
}

impl ActiveEffects {
    pub fn gravity_scale(&self) -> f32 {
        self.gravity.map(|g| g.scale).unwrap_or(1.0)
    }

    /// Count down timed effects
    pub fn advance(&mut self, dt: f32) {
        if let Some(modifier) = self.gravity.as_mut() {
            modifier.remaining -= dt;
            if modifier.remaining <= 0.0 {
                self.gravity = None;
            }
        }
    }
}

/// End-of-run summary, always surfaced when a run ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub score: u64,
    pub distance: f32,
    pub duration: f32,
    pub max_combo: u32,
    pub max_near_miss_streak: u32,
    pub max_escape_streak: u32,
    pub peak_flow_level: usize,
    /// Obstacle that ended the run
    pub cause: Option<ObstacleKind>,
}

/// Per-run world state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Accumulated simulated seconds
    pub elapsed: f32,
    pub phase: GamePhase,
    pub player: PlayerState,
    /// Current forward speed
    pub speed: f32,
    /// Metres travelled this run
    pub distance: f32,
    pub score: u64,
    /// Obstacles cleared in a row without a hit
    pub combo: u32,
    pub max_combo: u32,
    /// Live obstacles (sorted by id for determinism)
    pub obstacles: Vec<Obstacle>,
    /// Live walls (sorted by id for determinism)
    pub walls: Vec<Wall>,
    pub effects: ActiveEffects,
    /// Next entity ID
    next_id: u32,
}

impl GameState {
    /// Create a fresh run with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            time_ticks: 0,
            elapsed: 0.0,
            phase: GamePhase::Playing,
            player: PlayerState::default(),
            speed: BASE_SPEED,
            distance: 0.0,
            score: 0,
            combo: 0,
            max_combo: 0,
            obstacles: Vec::new(),
            walls: Vec::new(),
            effects: ActiveEffects::default(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn spawn_obstacle(&mut self, x: f32, lane: i8, kind: ObstacleKind) -> u32 {
        let id = self.next_entity_id();
        self.obstacles.push(Obstacle::new(id, x, lane, kind));
        id
    }

    pub fn spawn_wall(&mut self, x: f32, length: f32, base: f32, top: f32, side: WallSide) -> u32 {
        let id = self.next_entity_id();
        self.walls.push(Wall {
            id,
            x,
            length: length.max(0.0),
            base: base.min(top),
            top: base.max(top),
            side,
        });
        id
    }

    pub fn obstacle(&self, id: u32) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.id == id)
    }

    pub fn wall(&self, id: u32) -> Option<&Wall> {
        self.walls.iter().find(|w| w.id == id)
    }

    /// Furthest spawned track position
    pub fn frontier(&self) -> f32 {
        let obstacles = self.obstacles.iter().map(|o| o.x);
        let walls = self.walls.iter().map(Wall::end_x);
        obstacles.chain(walls).fold(0.0, f32::max)
    }

    /// Increment combo after an obstacle is cleared
    pub fn bump_combo(&mut self) {
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
    }

    /// Ensure entities are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.obstacles.sort_by_key(|o| o.id);
        self.walls.sort_by_key(|w| w.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_shrinks_hitbox() {
        let mut player = PlayerState::default();
        let standing = player.hitbox();
        player.mode = ActionMode::Sliding;
        let sliding = player.hitbox();
        assert!((standing.size().y - PLAYER_HEIGHT).abs() < 1e-6);
        assert!((sliding.size().y - PLAYER_SLIDE_HEIGHT).abs() < 1e-6);
    }

    #[test]
    fn test_obstacle_extents() {
        let overhang = Obstacle::new(1, 5.0, 0, ObstacleKind::Overhang { clearance: 1.1 });
        let hb = overhang.hitbox();
        assert!((hb.min.y - 1.1).abs() < 1e-6);
        assert_eq!(overhang.kind.avoidance(), Avoidance::Duck);

        let hurdle = ObstacleKind::Hurdle { height: 1.0 };
        assert_eq!(hurdle.vault_height(), Some(VAULT_FRACTION));
        assert_eq!(ObstacleKind::Barricade { height: 2.5 }.vault_height(), None);
    }

    #[test]
    fn test_obstacle_lane_clamped() {
        let obstacle = Obstacle::new(1, 5.0, 7, ObstacleKind::Barricade { height: 2.5 });
        assert_eq!(obstacle.lane, MAX_LANE);
    }

    #[test]
    fn test_gravity_modifier_expires() {
        let mut effects = ActiveEffects {
            gravity: Some(GravityModifier {
                scale: 0.5,
                remaining: 0.1,
            }),
            ..Default::default()
        };
        assert_eq!(effects.gravity_scale(), 0.5);
        effects.advance(0.05);
        assert_eq!(effects.gravity_scale(), 0.5);
        effects.advance(0.06);
        assert_eq!(effects.gravity_scale(), 1.0);
    }

    #[test]
    fn test_entity_ids_and_frontier() {
        let mut state = GameState::new(1);
        let a = state.spawn_obstacle(30.0, 0, ObstacleKind::Hurdle { height: 1.0 });
        let w = state.spawn_wall(40.0, 10.0, 1.0, 4.0, WallSide::Left);
        assert!(w > a);
        assert_eq!(state.frontier(), 50.0);
        assert!(state.obstacle(a).is_some());
        assert!(state.wall(w).is_some());
    }
}
