//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or storage calls; side effects leave as `GameEvent`s

pub mod aabb;
pub mod adaptive;
pub mod autopilot;
pub mod collision;
pub mod events;
pub mod flow;
pub mod physics;
pub mod reward;
pub mod spawner;
pub mod state;
pub mod tick;

pub use aabb::Aabb;
pub use adaptive::{AdaptiveAi, DifficultyParams, EmotionalState};
pub use collision::{Contact, Outcome};
pub use events::{EffectKind, EffectRequest, GameEvent, SoundCue};
pub use flow::FlowState;
pub use physics::{PhysicsReport, ProjectedPose};
pub use reward::{EscapeUpdate, LastSecondEscapeTracker, NearMissEvent, NearMissTracker, Prediction};
pub use spawner::{PatternSpawner, SpawnDescriptor, SpawnRequest, Spawner};
pub use state::{
    ActionMode, ActiveEffects, GamePhase, GameState, GravityModifier, Obstacle, ObstacleKind,
    PlayerState, RunSummary, Wall, WallSide,
};
pub use tick::{Simulation, TickInput};
