//! Skill estimator, emotional model and difficulty adaptation
//!
//! Runs once per frame after the reward engine. The result is a
//! `DifficultyParams` pair read by the spawner when it builds the next wave.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::tuning::AdaptiveTuning;

/// Seconds for the reaction-event counter to decay by 1/e
const REACTION_MEMORY: f32 = 2.0;
/// Reaction events that saturate the estimator's reaction term
const REACTION_SATURATION: f32 = 5.0;

/// Each value in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub frustration: f32,
    pub confidence: f32,
    pub engagement: f32,
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self {
            frustration: 0.0,
            confidence: 0.5,
            engagement: 0.5,
        }
    }
}

/// Parameters the spawner shapes waves with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyParams {
    /// Metres between waves
    pub spacing: f32,
    /// 0..1, how dense and mixed a wave is
    pub complexity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveAi {
    pub skill_level: f32,
    pub emotion: EmotionalState,
    pub difficulty: DifficultyParams,
    pub adaptation_needed: bool,
    /// Rolling action outcomes, oldest first
    history: VecDeque<bool>,
    /// Decaying count of near misses and escapes
    reactions: f32,
    tuning: AdaptiveTuning,
}

impl AdaptiveAi {
    pub fn new(tuning: &AdaptiveTuning) -> Self {
        Self {
            skill_level: tuning.initial_skill.clamp(tuning.skill_min, tuning.skill_max),
            emotion: EmotionalState::default(),
            difficulty: DifficultyParams {
                spacing: tuning
                    .initial_spacing
                    .clamp(tuning.spacing_min, tuning.spacing_max),
                complexity: tuning
                    .initial_complexity
                    .clamp(tuning.complexity_min, tuning.complexity_max),
            },
            adaptation_needed: false,
            history: VecDeque::with_capacity(tuning.history_len),
            reactions: 0.0,
            tuning: tuning.clone(),
        }
    }

    /// Start from a persisted skill level; non-finite values are ignored
    pub fn seeded(tuning: &AdaptiveTuning, skill: f32) -> Self {
        let mut ai = Self::new(tuning);
        if skill.is_finite() {
            ai.skill_level = skill.clamp(tuning.skill_min, tuning.skill_max);
        } else {
            log::warn!("Ignoring non-finite seeded skill level");
        }
        ai
    }

    /// Push an action outcome, evicting the oldest when full
    pub fn record_outcome(&mut self, success: bool) {
        if self.history.len() >= self.tuning.history_len {
            self.history.pop_front();
        }
        self.history.push_back(success);
    }

    /// Count a reaction-based event (near miss or escape)
    pub fn record_reaction(&mut self) {
        self.reactions += 1.0;
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Fraction of successes in the buffer; neutral when empty
    pub fn success_rate(&self) -> f32 {
        if self.history.is_empty() {
            return 0.5;
        }
        let wins = self.history.iter().filter(|&&s| s).count();
        wins as f32 / self.history.len() as f32
    }

    fn normalized(value: f32, min: f32, max: f32) -> f32 {
        if max > min {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Complexity relative to skill; positive means the game is too hard
    pub fn mismatch(&self) -> f32 {
        let t = &self.tuning;
        let complexity =
            Self::normalized(self.difficulty.complexity, t.complexity_min, t.complexity_max);
        let skill = Self::normalized(self.skill_level, t.skill_min, t.skill_max);
        complexity - skill
    }

    /// Per-frame update from the flow level (normalized 0..1)
    pub fn update(&mut self, flow_norm: f32, dt: f32) {
        let t = &self.tuning;
        let flow_norm = if flow_norm.is_finite() {
            flow_norm.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let success = self.success_rate();
        let reaction = (self.reactions / REACTION_SATURATION).min(1.0);
        self.reactions *= (-dt / REACTION_MEMORY).exp();

        let target = 0.5 * success + 0.3 * flow_norm + 0.2 * reaction;
        let target_skill = t.skill_min + target * (t.skill_max - t.skill_min);
        let rate = (t.learning_rate * dt).clamp(0.0, 1.0);
        self.skill_level = (self.skill_level + rate * (target_skill - self.skill_level))
            .clamp(t.skill_min, t.skill_max);

        let mismatch = self.mismatch();
        let skill = Self::normalized(self.skill_level, t.skill_min, t.skill_max);
        let too_hard = mismatch.max(0.0);
        self.emotion = EmotionalState {
            frustration: ((1.0 - success) * 0.8 + too_hard * 0.6).clamp(0.0, 1.0),
            confidence: (success * 0.6 + skill * 0.4 - too_hard * 0.3).clamp(0.0, 1.0),
            engagement: (0.6 * (1.0 - mismatch.abs() * 2.0) + 0.4 * flow_norm).clamp(0.0, 1.0),
        };

        let needed = self.emotion.frustration > t.frustration_threshold
            || self.emotion.engagement < t.engagement_floor;
        if needed != self.adaptation_needed {
            log::debug!(
                "Adaptation {} (frustration {:.2}, engagement {:.2})",
                if needed { "needed" } else { "settled" },
                self.emotion.frustration,
                self.emotion.engagement
            );
        }
        self.adaptation_needed = needed;

        let step = t.adapt_rate * dt;
        let difficulty = &mut self.difficulty;
        if needed {
            difficulty.spacing *= 1.0 + step;
            difficulty.complexity *= 1.0 - step;
        } else if self.emotion.confidence > t.challenge_threshold
            && self.emotion.engagement > t.challenge_threshold
        {
            difficulty.spacing *= 1.0 - step;
            difficulty.complexity *= 1.0 + step;
        }
        difficulty.spacing = difficulty.spacing.clamp(t.spacing_min, t.spacing_max);
        difficulty.complexity = difficulty
            .complexity
            .clamp(t.complexity_min, t.complexity_max);
    }

    /// Back to the starting profile, keeping the learned skill
    pub fn reset(&mut self, skill: f32) {
        let tuning = self.tuning.clone();
        *self = Self::seeded(&tuning, skill);
    }
}
