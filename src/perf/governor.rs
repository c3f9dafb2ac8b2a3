//! Frame-time governor and the transient-object pools it budgets
//!
//! Frames are recorded every tick; classification only happens once per
//! measurement window, and a tier change needs several windows in a row that
//! agree. Between tier changes a continuous multiplier trims particle counts
//! from the smoothed FPS ratio.

use glam::Vec3;

use super::pool::Pool;
use super::tier::{QualityTier, TierBudget};
use crate::sim::events::{EffectKind, EffectRequest};
use crate::tuning::PerfTuning;

/// Particle gravity, m/s²
const PARTICLE_GRAVITY: f32 = 9.0;
const PARTICLE_LIFE: f32 = 0.6;
const TRAIL_LIFE: f32 = 0.25;

/// A tier transition decided at the end of a measurement window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    pub from: QualityTier,
    pub to: QualityTier,
}

impl TierChange {
    pub fn entered_emergency(&self) -> bool {
        self.to == QualityTier::Emergency && self.from != QualityTier::Emergency
    }
}

/// Result of one measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSample {
    pub fps: f32,
    /// Smoothed frame time at the end of the window
    pub avg_frame_ms: f32,
    pub drops: u32,
    pub classified: QualityTier,
    pub severe: bool,
}

#[derive(Debug, Clone)]
pub struct PerformanceGovernor {
    target_fps: f32,
    tier: QualityTier,
    /// Richest tier the player allows
    max_tier: QualityTier,
    budget: TierBudget,
    smoothed_ms: Option<f32>,
    window_secs: f32,
    window_frames: u32,
    window_drops: u32,
    /// Total dropped frames since the governor started
    pub frame_drops: u64,
    windows: u64,
    lower_streak: u32,
    higher_streak: u32,
    severe_streak: u32,
    recovery_streak: u32,
    /// Window number of the most recent downgrade
    last_downgrade: Option<u64>,
    particle_multiplier: f32,
    last_sample: Option<WindowSample>,
    tuning: PerfTuning,
}

impl PerformanceGovernor {
    pub fn new(tuning: &PerfTuning, target_fps: f32, max_tier: QualityTier) -> Self {
        let target_fps = if target_fps.is_finite() && target_fps > 0.0 {
            target_fps
        } else {
            log::warn!("Invalid target FPS {}, using 60", target_fps);
            60.0
        };
        let max_tier = max_tier.max(QualityTier::Low);
        let tier = QualityTier::High.min(max_tier);
        Self {
            target_fps,
            tier,
            max_tier,
            budget: tier.budget(),
            smoothed_ms: None,
            window_secs: 0.0,
            window_frames: 0,
            window_drops: 0,
            frame_drops: 0,
            windows: 0,
            lower_streak: 0,
            higher_streak: 0,
            severe_streak: 0,
            recovery_streak: 0,
            last_downgrade: None,
            particle_multiplier: 1.0,
            last_sample: None,
            tuning: tuning.clone(),
        }
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    pub fn budget(&self) -> &TierBudget {
        &self.budget
    }

    pub fn particle_multiplier(&self) -> f32 {
        self.particle_multiplier
    }

    /// Particle cap after the continuous multiplier
    pub fn particle_limit(&self) -> usize {
        (self.budget.max_particles as f32 * self.particle_multiplier) as usize
    }

    pub fn target_frame_ms(&self) -> f32 {
        1000.0 / self.target_fps
    }

    pub fn smoothed_frame_ms(&self) -> Option<f32> {
        self.smoothed_ms
    }

    pub fn last_sample(&self) -> Option<&WindowSample> {
        self.last_sample.as_ref()
    }

    /// Completed measurement windows
    pub fn windows(&self) -> u64 {
        self.windows
    }

    /// Record one frame's render duration
    pub fn record_frame(&mut self, frame_ms: f32) -> Option<TierChange> {
        if !frame_ms.is_finite() || frame_ms <= 0.0 {
            log::debug!("Ignoring invalid frame time {}", frame_ms);
            return None;
        }

        let alpha = self.tuning.smoothing;
        let smoothed = match self.smoothed_ms {
            Some(prev) => prev + alpha * (frame_ms - prev),
            None => frame_ms,
        };
        self.smoothed_ms = Some(smoothed);

        let target_ms = self.target_frame_ms();
        if frame_ms > target_ms * self.tuning.drop_factor {
            self.window_drops += 1;
            self.frame_drops += 1;
        }

        // Continuous trim between tier changes
        let fps_ratio = target_ms / smoothed;
        if fps_ratio < 0.9 {
            self.particle_multiplier *= 0.98;
        } else if fps_ratio > 0.98 {
            self.particle_multiplier *= 1.01;
        }
        self.particle_multiplier = self
            .particle_multiplier
            .clamp(self.tuning.min_multiplier, 1.0);

        self.window_secs += frame_ms / 1000.0;
        self.window_frames += 1;
        if self.window_secs >= self.tuning.measurement_interval {
            self.close_window()
        } else {
            None
        }
    }

    /// Combined FPS and frame-time classification
    pub fn classify(&self, fps: f32, avg_ms: f32) -> (QualityTier, bool) {
        let target_fps = self.target_fps;
        let target_ms = self.target_frame_ms();
        let tier = if fps >= target_fps * 0.95 && avg_ms <= target_ms * 1.05 {
            QualityTier::Ultra
        } else if fps >= target_fps * 0.85 && avg_ms <= target_ms * 1.2 {
            QualityTier::High
        } else if fps >= target_fps * 0.7 && avg_ms <= target_ms * 1.5 {
            QualityTier::Medium
        } else {
            QualityTier::Low
        };
        let severe = fps < target_fps * 0.5 || avg_ms > target_ms * 2.0;
        (tier, severe)
    }

    fn close_window(&mut self) -> Option<TierChange> {
        let fps = self.window_frames as f32 / self.window_secs;
        let avg_ms = self.smoothed_ms.unwrap_or_else(|| self.target_frame_ms());
        let (classified, severe) = self.classify(fps, avg_ms);
        let sample = WindowSample {
            fps,
            avg_frame_ms: avg_ms,
            drops: self.window_drops,
            classified,
            severe,
        };
        self.windows += 1;
        self.window_secs = 0.0;
        self.window_frames = 0;
        self.window_drops = 0;
        self.last_sample = Some(sample);

        log::debug!(
            "Perf window {}: {:.1} fps, {:.2} ms avg, {} drops -> {} (severe: {})",
            self.windows,
            fps,
            avg_ms,
            sample.drops,
            classified.as_str(),
            severe
        );

        let next = self.next_tier(&sample)?;
        let change = TierChange {
            from: self.tier,
            to: next,
        };
        self.apply(next);
        Some(change)
    }

    /// Hysteresis: which tier, if any, this window moves to
    fn next_tier(&mut self, sample: &WindowSample) -> Option<QualityTier> {
        let t = &self.tuning;

        if self.tier == QualityTier::Emergency {
            if sample.classified >= QualityTier::Medium {
                self.recovery_streak += 1;
            } else {
                self.recovery_streak = 0;
            }
            return (self.recovery_streak >= t.recovery_windows).then_some(QualityTier::Low);
        }

        if self.tier == QualityTier::Low && sample.severe {
            self.severe_streak += 1;
            if self.severe_streak >= t.severe_windows {
                return Some(QualityTier::Emergency);
            }
        } else {
            self.severe_streak = 0;
        }

        let classified = sample.classified.min(self.max_tier);
        if classified < self.tier {
            self.higher_streak = 0;
            self.lower_streak += 1;
            if self.lower_streak >= t.downgrade_windows {
                return Some(classified);
            }
        } else if classified > self.tier {
            self.lower_streak = 0;
            self.higher_streak += 1;
            // The window after a downgrade still measures the richer tier's cost
            let settling = self
                .last_downgrade
                .is_some_and(|w| self.windows <= w + 1);
            if self.higher_streak >= t.upgrade_windows {
                if settling {
                    log::debug!("Holding {} for one window after a downgrade", self.tier.as_str());
                } else {
                    return Some(self.tier.up().min(self.max_tier));
                }
            }
        } else {
            self.lower_streak = 0;
            self.higher_streak = 0;
        }
        None
    }

    fn apply(&mut self, next: QualityTier) {
        if next < self.tier {
            self.last_downgrade = Some(self.windows);
        }
        let previous = self.tier;
        self.tier = next;
        self.budget = next.budget();
        self.lower_streak = 0;
        self.higher_streak = 0;
        self.severe_streak = 0;
        self.recovery_streak = 0;

        if next == QualityTier::Emergency {
            self.particle_multiplier = self.tuning.min_multiplier;
            log::warn!(
                "Entering emergency quality after sustained slowdown ({} dropped frames)",
                self.frame_drops
            );
        } else {
            log::info!("Quality tier {} -> {}", previous.as_str(), next.as_str());
        }
    }

    /// Back to the starting tier with fresh measurements
    pub fn reset(&mut self) {
        *self = Self::new(&self.tuning.clone(), self.target_fps, self.max_tier);
    }
}

/// A pooled effect particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub life: f32,
    pub size: f32,
    pub kind: EffectKind,
}

/// A fading segment of the player's speed trail
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailSegment {
    pub position: Vec3,
    pub life: f32,
}

/// Fixed-capacity pools for every transient visual object
#[derive(Debug, Clone)]
pub struct ResourcePools {
    pub particles: Pool<Particle>,
    pub trails: Pool<TrailSegment>,
}

impl ResourcePools {
    pub fn new(tuning: &PerfTuning) -> Self {
        Self {
            particles: Pool::with_capacity(tuning.particle_capacity),
            trails: Pool::with_capacity(tuning.trail_capacity),
        }
    }

    fn burst_size(kind: EffectKind) -> f32 {
        match kind {
            EffectKind::JumpDust | EffectKind::LandingDust => 8.0,
            EffectKind::WallSparks => 6.0,
            EffectKind::NearMissStreak => 16.0,
            EffectKind::EscapeFlash => 24.0,
            EffectKind::ShieldBreak => 32.0,
            EffectKind::FlowBurst => 48.0,
            EffectKind::Crash => 40.0,
        }
    }

    /// Spawn a burst for an effect request within the governor's budget.
    ///
    /// Returns how many particles were placed; refusals are silent.
    pub fn spawn_burst(&mut self, request: &EffectRequest, governor: &PerformanceGovernor) -> usize {
        let intensity = if request.intensity.is_finite() {
            request.intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let count = (Self::burst_size(request.kind) * intensity * governor.particle_multiplier())
            .ceil() as usize;
        let limit = governor.particle_limit();

        let mut placed = 0;
        for i in 0..count {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            let velocity = Vec3::new(angle.cos(), 1.5, angle.sin()) * (2.0 + intensity * 3.0);
            let particle = Particle {
                position: request.position,
                velocity,
                life: PARTICLE_LIFE,
                size: 0.05 + 0.1 * intensity,
                kind: request.kind,
            };
            if self.particles.acquire_within(particle, limit).is_none() {
                break;
            }
            placed += 1;
        }
        placed
    }

    /// Add a trail segment if the tier allows one
    pub fn push_trail(&mut self, position: Vec3, budget: &TierBudget) -> bool {
        let segment = TrailSegment {
            position,
            life: TRAIL_LIFE,
        };
        self.trails.acquire_within(segment, budget.max_trails).is_some()
    }

    /// Age and move everything, releasing what has expired
    pub fn update(&mut self, dt: f32, scroll: f32) {
        self.particles.retain(|p| {
            p.life -= dt;
            p.velocity.y -= PARTICLE_GRAVITY * dt;
            p.position += p.velocity * dt;
            p.position.x -= scroll;
            p.life > 0.0
        });
        self.trails.retain(|s| {
            s.life -= dt;
            s.position.x -= scroll;
            s.life > 0.0
        });
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.trails.clear();
    }

    pub fn live_particles(&self) -> usize {
        self.particles.live()
    }

    pub fn live_trails(&self) -> usize {
        self.trails.live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET_MS: f32 = 1000.0 / 60.0;

    fn governor() -> PerformanceGovernor {
        PerformanceGovernor::new(&PerfTuning::default(), 60.0, QualityTier::Ultra)
    }

    /// Feed one full measurement window of frames at `frame_ms`
    fn run_window(gov: &mut PerformanceGovernor, frame_ms: f32) -> Option<TierChange> {
        let start = gov.windows();
        let mut change = None;
        while gov.windows() == start {
            if let Some(c) = gov.record_frame(frame_ms) {
                change = Some(c);
            }
        }
        change
    }

    #[test]
    fn test_single_spike_does_not_downgrade() {
        let mut gov = governor();
        assert!(run_window(&mut gov, TARGET_MS).is_none());
        gov.record_frame(TARGET_MS * 5.0);
        assert!(run_window(&mut gov, TARGET_MS).is_none());
        assert_eq!(gov.tier(), QualityTier::High);
        assert!(gov.frame_drops >= 1);
    }

    #[test]
    fn test_sustained_slowdown_downgrades_after_two_windows() {
        let mut gov = governor();
        // ~45 fps: Medium
        assert!(run_window(&mut gov, 22.0).is_none());
        let change = run_window(&mut gov, 22.0).unwrap();
        assert_eq!(change.from, QualityTier::High);
        assert_eq!(change.to, QualityTier::Medium);
    }

    #[test]
    fn test_emergency_after_sustained_severe_windows() {
        let mut gov = governor();
        let mut reached = None;
        for window in 1..=10 {
            if let Some(change) = run_window(&mut gov, TARGET_MS * 3.0)
                && change.entered_emergency()
            {
                reached = Some(window);
            }
        }
        assert_eq!(gov.tier(), QualityTier::Emergency);
        assert_eq!(reached, Some(7));
        assert!(!gov.budget().any_optional_effects());
    }

    #[test]
    fn test_recovers_from_emergency() {
        let mut gov = governor();
        for _ in 0..10 {
            run_window(&mut gov, TARGET_MS * 3.0);
        }
        assert_eq!(gov.tier(), QualityTier::Emergency);
        // The smoothed average needs a window to settle
        let mut windows = 0;
        while gov.tier() == QualityTier::Emergency && windows < 10 {
            run_window(&mut gov, TARGET_MS);
            windows += 1;
        }
        assert_eq!(gov.tier(), QualityTier::Low);
        assert!(windows >= 3);
    }

    #[test]
    fn test_upgrade_one_step_after_three_windows() {
        let mut gov = governor();
        run_window(&mut gov, 22.0);
        run_window(&mut gov, 22.0);
        assert_eq!(gov.tier(), QualityTier::Medium);

        let mut changes = Vec::new();
        for _ in 0..6 {
            if let Some(change) = run_window(&mut gov, TARGET_MS) {
                changes.push(change);
            }
        }
        assert!(!changes.is_empty());
        assert!(changes.iter().all(|c| c.to == c.from.up()));
    }

    #[test]
    fn test_no_upgrade_in_window_after_downgrade() {
        let tuning = PerfTuning {
            downgrade_windows: 1,
            upgrade_windows: 1,
            ..PerfTuning::default()
        };
        let mut gov = PerformanceGovernor::new(&tuning, 60.0, QualityTier::Ultra);

        // ~45 fps: straight down to Medium
        let change = run_window(&mut gov, 22.0).unwrap();
        assert_eq!(change.to, QualityTier::Medium);

        // Back at full speed: classified higher, but held for one window
        assert!(run_window(&mut gov, TARGET_MS).is_none());
        assert_eq!(gov.last_sample().map(|s| s.classified), Some(QualityTier::Ultra));
        assert_eq!(gov.tier(), QualityTier::Medium);

        let change = run_window(&mut gov, TARGET_MS).unwrap();
        assert_eq!(change.from, QualityTier::Medium);
        assert_eq!(change.to, QualityTier::High);
    }

    #[test]
    fn test_max_tier_caps_upgrades() {
        let mut gov = PerformanceGovernor::new(&PerfTuning::default(), 60.0, QualityTier::Medium);
        assert_eq!(gov.tier(), QualityTier::Medium);
        for _ in 0..10 {
            run_window(&mut gov, TARGET_MS);
        }
        assert_eq!(gov.tier(), QualityTier::Medium);
    }

    #[test]
    fn test_multiplier_trims_and_recovers() {
        let mut gov = governor();
        for _ in 0..30 {
            gov.record_frame(TARGET_MS * 1.5);
        }
        let trimmed = gov.particle_multiplier();
        assert!(trimmed < 1.0);
        assert!(trimmed >= PerfTuning::default().min_multiplier);
        for _ in 0..200 {
            gov.record_frame(TARGET_MS * 0.9);
        }
        assert_eq!(gov.particle_multiplier(), 1.0);
    }

    #[test]
    fn test_invalid_frame_times_ignored() {
        let mut gov = governor();
        assert!(gov.record_frame(f32::NAN).is_none());
        assert!(gov.record_frame(-3.0).is_none());
        assert!(gov.smoothed_frame_ms().is_none());
    }

    #[test]
    fn test_burst_respects_budget() {
        let tuning = PerfTuning::default();
        let mut pools = ResourcePools::new(&tuning);
        let gov = PerformanceGovernor::new(&tuning, 60.0, QualityTier::Low);
        let request = EffectRequest {
            kind: EffectKind::FlowBurst,
            position: Vec3::ZERO,
            intensity: 1.0,
        };
        let mut total = 0;
        for _ in 0..10 {
            total += pools.spawn_burst(&request, &gov);
        }
        assert_eq!(total, gov.particle_limit());
        assert_eq!(pools.live_particles(), QualityTier::Low.budget().max_particles);

        pools.update(1.0, 0.0);
        assert_eq!(pools.live_particles(), 0);
    }

    #[test]
    fn test_trails_capped_by_tier() {
        let tuning = PerfTuning::default();
        let mut pools = ResourcePools::new(&tuning);
        let budget = QualityTier::Low.budget();
        let placed = (0..100)
            .filter(|_| pools.push_trail(Vec3::ZERO, &budget))
            .count();
        assert_eq!(placed, budget.max_trails);
        assert!(!pools.push_trail(Vec3::ZERO, &QualityTier::Emergency.budget()));
    }
}
