//! Predictive collision checks that reward risky play
//!
//! Two independent trackers run every frame against obstacles inside the
//! lookahead window:
//! - near misses: passing an obstacle within the danger distance
//! - last-second escapes: a predicted collision avoided by a late input
//!
//! The escape check is two-phase: a prediction is raised first, then an
//! input inside the reaction window verifies it. Any state-changing input
//! counts as long as the boxes do not overlap at that moment; whether the
//! input actually caused the avoidance is not re-simulated.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collision::{Contact, is_handled};
use super::physics::project_pose;
use super::state::{GameState, Obstacle};
use crate::tuning::{PhysicsTuning, RewardTuning};

/// A rewarded near miss
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearMissEvent {
    pub obstacle_id: u32,
    pub bonus: f32,
    pub streak: u32,
    pub position: Vec3,
}

/// Tracks near-miss streaks and their cooldown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearMissTracker {
    pub danger_distance: f32,
    pub base_bonus: f32,
    pub multiplier_step: f32,
    pub max_multiplier: f32,
    /// Seconds without a near miss before the streak resets
    pub cooldown: f32,
    pub streak: u32,
    pub max_streak: u32,
    /// Simulated time of the last qualifying event
    pub last_event: Option<f32>,
}

impl NearMissTracker {
    pub fn new(tuning: &RewardTuning) -> Self {
        Self {
            danger_distance: tuning.danger_distance,
            base_bonus: tuning.near_miss_bonus,
            multiplier_step: tuning.near_miss_step,
            max_multiplier: tuning.near_miss_max_multiplier,
            cooldown: tuning.near_miss_cooldown,
            streak: 0,
            max_streak: 0,
            last_event: None,
        }
    }

    /// Reward multiplier for the current streak
    pub fn multiplier(&self) -> f32 {
        let steps = self.streak.saturating_sub(1) as f32;
        (1.0 + steps * self.multiplier_step).min(self.max_multiplier)
    }

    /// Reset the streak if the cooldown elapsed without a new event
    pub fn expire(&mut self, now: f32) -> bool {
        match self.last_event {
            Some(t) if self.streak > 0 && now - t >= self.cooldown => {
                log::debug!("Near-miss streak of {} expired", self.streak);
                self.streak = 0;
                true
            }
            _ => false,
        }
    }

    /// Count a qualifying event, returning the bonus it earns
    pub fn record(&mut self, now: f32) -> f32 {
        self.streak += 1;
        self.max_streak = self.max_streak.max(self.streak);
        self.last_event = Some(now);
        self.base_bonus * self.multiplier()
    }

    /// Flag and reward every obstacle passing within the danger distance
    pub fn scan(&mut self, state: &mut GameState, tuning: &RewardTuning, now: f32) -> Vec<NearMissEvent> {
        self.expire(now);

        let hitbox = state.player.hitbox();
        let mut events = Vec::new();
        for obstacle in state
            .obstacles
            .iter_mut()
            .filter(|o| in_window(o, tuning) && !o.near_miss_flagged)
        {
            let other = obstacle.hitbox();
            if !hitbox.overlaps_x(&other) || hitbox.overlaps(&other) {
                continue;
            }
            let separation = hitbox.separation(&other);
            if separation.is_finite() && separation <= self.danger_distance {
                obstacle.near_miss_flagged = true;
                let bonus = self.record(now);
                events.push(NearMissEvent {
                    obstacle_id: obstacle.id,
                    bonus,
                    streak: self.streak,
                    position: other.center(),
                });
            }
        }
        events
    }

    pub fn reset(&mut self) {
        self.streak = 0;
        self.max_streak = 0;
        self.last_event = None;
    }
}

/// A collision predicted under the horizon; refers to the obstacle by id
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub obstacle_id: u32,
    pub raised_at: f32,
    pub time_to_contact: f32,
}

/// What the escape tracker did this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EscapeUpdate {
    Idle,
    Raised(Prediction),
    Escaped {
        obstacle_id: u32,
        bonus: f32,
        streak: u32,
    },
    /// Reaction window ran out without input; streak reset
    Expired { obstacle_id: u32 },
    /// Obstacle passed or vanished before the window closed
    Cleared { obstacle_id: u32 },
}

/// Two-phase predict-then-verify tracker for last-second escapes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastSecondEscapeTracker {
    pub horizon: f32,
    pub reaction_window: f32,
    pub base_bonus: f32,
    pub prediction: Option<Prediction>,
    pub streak: u32,
    pub max_streak: u32,
}

impl LastSecondEscapeTracker {
    pub fn new(tuning: &RewardTuning) -> Self {
        Self {
            horizon: tuning.escape_horizon,
            reaction_window: tuning.escape_window,
            base_bonus: tuning.escape_bonus,
            prediction: None,
            streak: 0,
            max_streak: 0,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.prediction.is_some()
    }

    /// Verify an active prediction, or look for a new one
    pub fn update(
        &mut self,
        state: &GameState,
        physics: &PhysicsTuning,
        tuning: &RewardTuning,
        acted: bool,
        now: f32,
    ) -> EscapeUpdate {
        match self.prediction {
            Some(prediction) => self.verify(state, prediction, acted, now),
            None => match self.predict(state, physics, tuning) {
                Some((obstacle_id, time_to_contact)) => {
                    let prediction = Prediction {
                        obstacle_id,
                        raised_at: now,
                        time_to_contact,
                    };
                    log::debug!(
                        "Collision predicted with obstacle {} in {:.3}s",
                        obstacle_id,
                        time_to_contact
                    );
                    self.prediction = Some(prediction);
                    EscapeUpdate::Raised(prediction)
                }
                None => EscapeUpdate::Idle,
            },
        }
    }

    fn verify(
        &mut self,
        state: &GameState,
        prediction: Prediction,
        acted: bool,
        now: f32,
    ) -> EscapeUpdate {
        let obstacle_id = prediction.obstacle_id;
        let Some(obstacle) = state
            .obstacle(obstacle_id)
            .filter(|o| !o.is_behind_player())
        else {
            self.prediction = None;
            return EscapeUpdate::Cleared { obstacle_id };
        };

        let elapsed = now - prediction.raised_at;
        if acted && elapsed <= self.reaction_window {
            if state.player.hitbox().overlaps(&obstacle.hitbox()) {
                return EscapeUpdate::Idle;
            }
            self.prediction = None;
            self.streak += 1;
            self.max_streak = self.max_streak.max(self.streak);
            return EscapeUpdate::Escaped {
                obstacle_id,
                bonus: self.base_bonus * self.streak as f32,
                streak: self.streak,
            };
        }

        if elapsed > self.reaction_window {
            self.prediction = None;
            self.streak = 0;
            return EscapeUpdate::Expired { obstacle_id };
        }
        EscapeUpdate::Idle
    }

    /// Earliest obstacle the player would hit without further input
    fn predict(
        &self,
        state: &GameState,
        physics: &PhysicsTuning,
        tuning: &RewardTuning,
    ) -> Option<(u32, f32)> {
        let player = &state.player;
        let hitbox = player.hitbox();
        let closing_speed = state.speed;
        if !closing_speed.is_finite() || closing_speed <= 0.0 {
            return None;
        }
        let gravity_scale = state.effects.gravity_scale();

        let mut best: Option<(u32, f32)> = None;
        for obstacle in state.obstacles.iter().filter(|o| in_window(o, tuning)) {
            let other = obstacle.hitbox();
            let gap = other.min.x - hitbox.max.x;
            let ttc = gap / closing_speed;
            // Invalid or already-touching predictions are discarded this frame
            if !ttc.is_finite() || ttc < 0.0 || ttc >= self.horizon {
                continue;
            }
            if best.is_some_and(|(_, t)| t <= ttc) {
                continue;
            }

            // Sample the pass: contact, middle, and trailing edge
            let pass = (other.size().x + hitbox.size().x) / closing_speed;
            let hits = [ttc, ttc + pass * 0.5, ttc + pass].into_iter().any(|t| {
                project_pose(player, gravity_scale, physics, t)
                    .is_some_and(|pose| would_collide(state, obstacle, pose.y, pose.mode))
            });
            if hits {
                best = Some((obstacle.id, ttc));
            }
        }
        best
    }

    /// Clear a prediction on collision with its obstacle
    pub fn on_collision(&mut self, obstacle_id: u32) {
        if self
            .prediction
            .is_some_and(|p| p.obstacle_id == obstacle_id)
        {
            self.prediction = None;
            self.streak = 0;
        }
    }

    pub fn reset(&mut self) {
        self.prediction = None;
        self.streak = 0;
        self.max_streak = 0;
    }
}

fn in_window(obstacle: &Obstacle, tuning: &RewardTuning) -> bool {
    obstacle.x >= -tuning.behind && obstacle.x <= tuning.lookahead
}

/// Would a player in this pose, alongside the obstacle, suffer an unhandled hit
fn would_collide(
    state: &GameState,
    obstacle: &Obstacle,
    y: f32,
    mode: super::state::ActionMode,
) -> bool {
    let mut projected = state.player.clone();
    projected.mode = mode;
    let body = projected.hitbox_at(y);
    let other = obstacle.hitbox();
    // Lined up along the track at contact; only height and lane matter
    let aligned = body.translated(Vec3::new(other.center().x - body.center().x, 0.0, 0.0));
    if !aligned.overlaps(&other) {
        return false;
    }
    let contact = Contact {
        obstacle_id: obstacle.id,
        kind: obstacle.kind,
        mode,
        feet_y: y,
    };
    !is_handled(&contact)
}
