//! Flow momentum and its stepped level
//!
//! Momentum grows only through explicit credits and otherwise decays
//! geometrically. The level is recomputed from momentum every frame.

use serde::{Deserialize, Serialize};

use crate::tuning::FlowTuning;

/// Momentum below this snaps to zero
const MOMENTUM_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowState {
    pub momentum: f32,
    pub level: usize,
    /// Highest level reached this run
    pub peak_level: usize,
    cap: f32,
    decay: f32,
    thresholds: Vec<f32>,
    multipliers: Vec<f32>,
    gain_amplification: f32,
}

impl FlowState {
    pub fn new(tuning: &FlowTuning) -> Self {
        Self {
            momentum: 0.0,
            level: 0,
            peak_level: 0,
            cap: tuning.cap,
            decay: tuning.decay,
            thresholds: tuning.thresholds.clone(),
            multipliers: tuning.multipliers.clone(),
            gain_amplification: tuning.gain_amplification,
        }
    }

    /// Start a run with momentum carried over from a snapshot
    pub fn seeded(tuning: &FlowTuning, momentum: f32) -> Self {
        let mut flow = Self::new(tuning);
        if momentum.is_finite() {
            flow.momentum = momentum.clamp(0.0, flow.cap);
        }
        flow.level = flow.level_for(flow.momentum);
        flow.peak_level = flow.level;
        flow
    }

    pub fn cap(&self) -> f32 {
        self.cap
    }

    /// Highest threshold index not exceeding `momentum`
    pub fn level_for(&self, momentum: f32) -> usize {
        self.thresholds
            .iter()
            .rposition(|&t| momentum >= t)
            .unwrap_or(0)
    }

    /// Score multiplier for the current level
    pub fn multiplier(&self) -> f32 {
        self.multipliers.get(self.level).copied().unwrap_or(1.0)
    }

    /// Momentum as a fraction of the cap
    pub fn normalized(&self) -> f32 {
        if self.cap > 0.0 {
            (self.momentum / self.cap).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Add momentum for a scoring event; higher levels amplify the gain
    pub fn credit(&mut self, amount: f32) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        let gain = amount * (1.0 + self.level as f32 * self.gain_amplification);
        self.momentum = (self.momentum + gain).min(self.cap);
    }

    /// Decay momentum and recompute the level.
    ///
    /// Returns the new level on a level-up. Dropping a level is silent.
    pub fn update(&mut self) -> Option<usize> {
        self.momentum *= self.decay;
        if self.momentum < MOMENTUM_EPSILON {
            self.momentum = 0.0;
        }

        let previous = self.level;
        self.level = self.level_for(self.momentum);
        self.peak_level = self.peak_level.max(self.level);
        if self.level > previous {
            log::info!("Flow level {} (momentum {:.1})", self.level, self.momentum);
            Some(self.level)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.momentum = 0.0;
        self.level = 0;
        self.peak_level = 0;
    }
}
