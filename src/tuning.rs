//! Data-driven game balance
//!
//! Every knob has a default taken from `consts`; a JSON document only needs
//! the fields it wants to override.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Action physics knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    pub gravity: f32,
    pub jump_velocity: f32,
    pub double_jump_velocity: f32,
    pub fast_fall_velocity: f32,
    pub slide_duration: f32,
    pub wall_run_max: f32,
    pub wall_kick_velocity: f32,
    pub base_speed: f32,
    pub max_speed: f32,
    pub speed_ramp: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            jump_velocity: JUMP_VELOCITY,
            double_jump_velocity: DOUBLE_JUMP_VELOCITY,
            fast_fall_velocity: FAST_FALL_VELOCITY,
            slide_duration: SLIDE_DURATION,
            wall_run_max: WALL_RUN_MAX,
            wall_kick_velocity: WALL_KICK_VELOCITY,
            base_speed: BASE_SPEED,
            max_speed: MAX_SPEED,
            speed_ramp: SPEED_RAMP,
        }
    }
}

/// Near-miss, escape and scoring knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardTuning {
    /// Obstacles considered by the predictive checks: x in [-behind, lookahead]
    pub lookahead: f32,
    pub behind: f32,
    pub danger_distance: f32,
    pub near_miss_bonus: f32,
    /// Multiplier growth per streak step
    pub near_miss_step: f32,
    pub near_miss_max_multiplier: f32,
    /// Seconds without a near miss before the streak resets
    pub near_miss_cooldown: f32,
    /// Time-to-contact under which a collision is predicted
    pub escape_horizon: f32,
    /// Seconds after a prediction in which an input counts as an escape
    pub escape_window: f32,
    pub escape_bonus: f32,
    /// Score for an obstacle passing behind the player
    pub clear_bonus: f32,
    /// Score per metre travelled
    pub distance_score: f32,
    /// Momentum credits
    pub jump_credit: f32,
    pub combo_credit: f32,
    pub near_miss_credit: f32,
    pub escape_credit: f32,
}

impl Default for RewardTuning {
    fn default() -> Self {
        Self {
            lookahead: 30.0,
            behind: DESPAWN_BEHIND,
            danger_distance: 0.5,
            near_miss_bonus: 50.0,
            near_miss_step: 0.5,
            near_miss_max_multiplier: 5.0,
            near_miss_cooldown: 0.5,
            escape_horizon: 0.5,
            escape_window: 0.3,
            escape_bonus: 100.0,
            clear_bonus: 10.0,
            distance_score: 1.0,
            jump_credit: 1.0,
            combo_credit: 2.0,
            near_miss_credit: 4.0,
            escape_credit: 6.0,
        }
    }
}

/// Flow momentum knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowTuning {
    pub cap: f32,
    /// Multiplicative decay applied every frame
    pub decay: f32,
    /// Ascending momentum thresholds; index is the level
    pub thresholds: Vec<f32>,
    /// Score multiplier per level
    pub multipliers: Vec<f32>,
    /// Extra credit fraction per level
    pub gain_amplification: f32,
}

impl Default for FlowTuning {
    fn default() -> Self {
        Self {
            cap: 100.0,
            decay: 0.995,
            thresholds: vec![0.0, 15.0, 35.0, 60.0, 85.0],
            multipliers: vec![1.0, 1.25, 1.5, 2.0, 3.0],
            gain_amplification: 0.1,
        }
    }
}

/// Skill estimator and difficulty adaptation knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveTuning {
    pub skill_min: f32,
    pub skill_max: f32,
    pub initial_skill: f32,
    pub learning_rate: f32,
    /// Length of the rolling success buffer
    pub history_len: usize,
    pub frustration_threshold: f32,
    pub engagement_floor: f32,
    /// Confidence and engagement above this ramp difficulty up
    pub challenge_threshold: f32,
    /// Fractional spacing/complexity change per second while adapting
    pub adapt_rate: f32,
    pub spacing_min: f32,
    pub spacing_max: f32,
    pub initial_spacing: f32,
    pub complexity_min: f32,
    pub complexity_max: f32,
    pub initial_complexity: f32,
}

impl Default for AdaptiveTuning {
    fn default() -> Self {
        Self {
            skill_min: 0.0,
            skill_max: 1.0,
            initial_skill: 0.3,
            learning_rate: 0.5,
            history_len: 20,
            frustration_threshold: 0.7,
            engagement_floor: 0.3,
            challenge_threshold: 0.7,
            adapt_rate: 0.1,
            spacing_min: 8.0,
            spacing_max: 30.0,
            initial_spacing: 18.0,
            complexity_min: 0.1,
            complexity_max: 1.0,
            initial_complexity: 0.3,
        }
    }
}

/// Performance governor knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfTuning {
    /// Seconds of recorded frame time per measurement window
    pub measurement_interval: f32,
    /// Exponential smoothing factor for frame time
    pub smoothing: f32,
    /// A frame slower than this multiple of the target counts as dropped
    pub drop_factor: f32,
    pub downgrade_windows: u32,
    pub upgrade_windows: u32,
    pub severe_windows: u32,
    pub recovery_windows: u32,
    /// Hard pool capacities
    pub particle_capacity: usize,
    pub trail_capacity: usize,
    /// Floor for the continuous particle multiplier
    pub min_multiplier: f32,
}

impl Default for PerfTuning {
    fn default() -> Self {
        Self {
            measurement_interval: 1.0,
            smoothing: 0.1,
            drop_factor: 1.5,
            downgrade_windows: 2,
            upgrade_windows: 3,
            severe_windows: 5,
            recovery_windows: 3,
            particle_capacity: 1024,
            trail_capacity: 64,
            min_multiplier: 0.25,
        }
    }
}

/// Complete balance document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub physics: PhysicsTuning,
    pub reward: RewardTuning,
    pub flow: FlowTuning,
    pub adaptive: AdaptiveTuning,
    pub perf: PerfTuning,
    /// Seconds between persistence snapshot offers
    pub snapshot_interval: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            physics: PhysicsTuning::default(),
            reward: RewardTuning::default(),
            flow: FlowTuning::default(),
            adaptive: AdaptiveTuning::default(),
            perf: PerfTuning::default(),
            snapshot_interval: 30.0,
        }
    }
}

impl Tuning {
    /// Parse a tuning document, falling back to defaults on malformed input
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Tuning>(json) {
            Ok(tuning) => tuning.sanitized(),
            Err(e) => {
                log::warn!("Malformed tuning ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Repair values that would break invariants
    pub fn sanitized(mut self) -> Self {
        let defaults = Tuning::default();

        let flow = &mut self.flow;
        if flow.thresholds.is_empty() || flow.thresholds.windows(2).any(|w| w[0] > w[1]) {
            log::warn!("Flow thresholds must be ascending, using defaults");
            flow.thresholds = defaults.flow.thresholds.clone();
        }
        if flow.multipliers.len() != flow.thresholds.len() {
            flow.multipliers.resize(flow.thresholds.len(), 1.0);
        }
        if !(0.0..=1.0).contains(&flow.decay) {
            flow.decay = defaults.flow.decay;
        }
        flow.cap = flow.cap.max(0.0);

        let adaptive = &mut self.adaptive;
        if adaptive.skill_min > adaptive.skill_max {
            std::mem::swap(&mut adaptive.skill_min, &mut adaptive.skill_max);
        }
        if adaptive.spacing_min > adaptive.spacing_max {
            std::mem::swap(&mut adaptive.spacing_min, &mut adaptive.spacing_max);
        }
        if adaptive.complexity_min > adaptive.complexity_max {
            std::mem::swap(&mut adaptive.complexity_min, &mut adaptive.complexity_max);
        }
        adaptive.history_len = adaptive.history_len.max(1);

        let perf = &mut self.perf;
        if perf.measurement_interval <= 0.0 {
            perf.measurement_interval = defaults.perf.measurement_interval;
        }
        perf.smoothing = perf.smoothing.clamp(0.01, 1.0);
        perf.min_multiplier = perf.min_multiplier.clamp(0.0, 1.0);

        if self.snapshot_interval <= 0.0 {
            self.snapshot_interval = defaults.snapshot_interval;
        }
        self
    }
}
