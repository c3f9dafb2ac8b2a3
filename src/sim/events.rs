//! Outbound events drained once per frame by the host
//!
//! The simulation never calls into rendering, audio or storage directly.
//! Collaborators may drop anything they cannot afford; nothing is confirmed.

use glam::Vec3;

use super::state::{ObstacleKind, RunSummary};
use crate::perf::QualityTier;
use crate::persistence::SaveSnapshot;

/// Visual effect classes the renderer knows how to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Dust kicked up on takeoff
    JumpDust,
    LandingDust,
    /// Sparks along a wall run
    WallSparks,
    NearMissStreak,
    EscapeFlash,
    ShieldBreak,
    /// Celebratory burst on flow level-up
    FlowBurst,
    Crash,
}

/// Request to spawn a visual effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectRequest {
    pub kind: EffectKind,
    pub position: Vec3,
    /// 0..1, scaled by the current particle multiplier
    pub intensity: f32,
}

/// Sound classes; the audio collaborator picks the actual sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCue {
    Jump,
    DoubleJump,
    Slide,
    Land,
    WallRun,
    NearMiss,
    Escape,
    ShieldBreak,
    FlowLevelUp,
    Crash,
    QualityNotice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Effect(EffectRequest),
    Sound(SoundCue),
    FlowLevelUp {
        level: usize,
        multiplier: f32,
    },
    NearMiss {
        obstacle_id: u32,
        bonus: u64,
        streak: u32,
    },
    Escape {
        obstacle_id: u32,
        bonus: u64,
        streak: u32,
    },
    /// Shield absorbed a hit from this obstacle
    ShieldConsumed {
        obstacle_id: u32,
        kind: ObstacleKind,
    },
    QualityChanged {
        from: QualityTier,
        to: QualityTier,
    },
    /// Brief, non-blocking notice that optional visuals were disabled
    EmergencyNotice,
    SnapshotOffered(SaveSnapshot),
    /// Emitted exactly once per run
    RunEnded(RunSummary),
}

impl GameEvent {
    pub fn is_presentation(&self) -> bool {
        matches!(self, GameEvent::Effect(_) | GameEvent::Sound(_))
    }
}
