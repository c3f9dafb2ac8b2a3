//! Obstacle spawning collaborator
//!
//! The tick loop asks for a new wave whenever the furthest entity is inside
//! the spawn horizon. Spacing and complexity come from the adaptive AI; the
//! spawner decides the layout.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::state::{ObstacleKind, WallSide};
use crate::consts::*;

/// Wave request shaped by the current difficulty
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    /// Track position of the wave's first row
    pub spawn_x: f32,
    pub spacing: f32,
    pub complexity: f32,
    pub speed: f32,
}

/// One entity the spawner wants placed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnDescriptor {
    Obstacle {
        kind: ObstacleKind,
        lane: i8,
        x: f32,
    },
    Wall {
        side: WallSide,
        x: f32,
        length: f32,
        base: f32,
        top: f32,
    },
}

pub trait Spawner {
    fn spawn(&mut self, request: &SpawnRequest) -> Vec<SpawnDescriptor>;

    /// Called when a new run starts
    fn reseed(&mut self, _seed: u64) {}
}

/// Deterministic row-based spawner
///
/// Every row leaves at least one lane with an avoidable obstacle or nothing
/// at all, so a wave is always survivable.
#[derive(Debug, Clone)]
pub struct PatternSpawner {
    rng: Pcg32,
    waves: u32,
}

impl PatternSpawner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            waves: 0,
        }
    }

    pub fn waves(&self) -> u32 {
        self.waves
    }

    fn random_kind(&mut self, complexity: f32) -> ObstacleKind {
        let roll: f32 = self.rng.random();
        // Barricades get likelier as the game hardens
        let barricade_chance = 0.15 + 0.35 * complexity;
        if roll < barricade_chance {
            ObstacleKind::Barricade { height: 2.5 }
        } else if roll < barricade_chance + (1.0 - barricade_chance) / 2.0 {
            ObstacleKind::Hurdle {
                height: self.rng.random_range(0.6..1.0),
            }
        } else {
            ObstacleKind::Overhang {
                clearance: self.rng.random_range(1.0..1.2),
            }
        }
    }

    fn avoidable_kind(&mut self) -> ObstacleKind {
        if self.rng.random_bool(0.5) {
            ObstacleKind::Hurdle {
                height: self.rng.random_range(0.6..1.0),
            }
        } else {
            ObstacleKind::Overhang {
                clearance: self.rng.random_range(1.0..1.2),
            }
        }
    }

    /// One row at `x`; blocks up to `blocked` lanes, never all with barricades
    fn row(&mut self, x: f32, blocked: usize, complexity: f32, out: &mut Vec<SpawnDescriptor>) {
        let open = self.rng.random_range(MIN_LANE..=MAX_LANE);
        let mut lanes: Vec<i8> = (MIN_LANE..=MAX_LANE).filter(|&l| l != open).collect();
        if self.rng.random_bool(0.5) {
            lanes.reverse();
        }
        let extra = blocked.saturating_sub(lanes.len());
        for &lane in lanes.iter().take(blocked) {
            let kind = self.random_kind(complexity);
            out.push(SpawnDescriptor::Obstacle { kind, lane, x });
        }
        if extra > 0 {
            let kind = self.avoidable_kind();
            out.push(SpawnDescriptor::Obstacle {
                kind,
                lane: open,
                x,
            });
        }
    }
}

impl Spawner for PatternSpawner {
    fn spawn(&mut self, request: &SpawnRequest) -> Vec<SpawnDescriptor> {
        let complexity = if request.complexity.is_finite() {
            request.complexity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let x = request.spawn_x;
        let mut out = Vec::new();
        self.waves += 1;

        let blocked = match complexity {
            c if c > 0.8 => 3,
            c if c > 0.35 => 2,
            _ => 1,
        };
        self.row(x, blocked, complexity, &mut out);

        // Staggered follow-up row for denser waves
        if complexity > 0.6 && self.rng.random_bool(complexity as f64) {
            // Far enough behind the first row to land and react at this speed
            let gap = (request.speed * 0.6).max(OBSTACLE_DEPTH * 4.0);
            self.row(x + gap, blocked.min(2), complexity, &mut out);
        }

        if complexity > 0.25 && self.rng.random_bool(0.15) {
            let side = if self.rng.random_bool(0.5) {
                WallSide::Left
            } else {
                WallSide::Right
            };
            out.push(SpawnDescriptor::Wall {
                side,
                x,
                length: self.rng.random_range(10.0..20.0),
                base: 0.8,
                top: 3.5,
            });
        }

        log::debug!(
            "Wave {} at x={:.1}: {} entities (complexity {:.2})",
            self.waves,
            x,
            out.len(),
            complexity
        );
        out
    }

    fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }
}
