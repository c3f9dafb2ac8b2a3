//! Player preferences
//!
//! Persisted separately from save snapshots. Only the knobs that change what
//! the core emits live here; the governor and effect spawning read them.

use serde::{Deserialize, Serialize};

use crate::perf::{QualityTier, TierBudget};

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Frame rate the governor measures against
    pub target_fps: f32,
    /// Richest quality tier the governor may pick
    pub max_quality: QualityTier,

    // === Visual Effects ===
    /// Particle effects (dust, sparks, bursts)
    pub particles: bool,
    /// Speed trails behind the player
    pub trails: bool,

    // === HUD ===
    /// Surface the emergency-quality notice
    pub show_notices: bool,

    // === Accessibility ===
    /// Reduced motion (no celebratory bursts)
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            max_quality: QualityTier::Ultra,

            particles: true,
            trails: true,

            show_notices: true,

            reduced_motion: false,
        }
    }
}

impl Settings {
    /// Parse stored settings, falling back to defaults
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Settings>(json) {
            Ok(settings) => {
                log::info!("Loaded settings");
                settings.sanitized()
            }
            Err(e) => {
                log::warn!("Malformed settings ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    fn sanitized(mut self) -> Self {
        if !self.target_fps.is_finite() || !(15.0..=240.0).contains(&self.target_fps) {
            log::warn!("Target FPS {} out of range, using 60", self.target_fps);
            self.target_fps = 60.0;
        }
        if self.max_quality == QualityTier::Emergency {
            self.max_quality = QualityTier::Low;
        }
        self
    }

    /// Effective flow celebration (respects reduced_motion)
    pub fn effective_celebrations(&self) -> bool {
        self.particles && !self.reduced_motion
    }

    /// Effective trails (a zero trail budget disables them too)
    pub fn effective_trails(&self, budget: &TierBudget) -> bool {
        self.trails && budget.max_trails > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_on_garbage() {
        assert_eq!(Settings::from_json("not json"), Settings::default());
    }

    #[test]
    fn test_partial_and_sanitised() {
        let settings = Settings::from_json(r#"{ "target_fps": 1000.0, "max_quality": "Emergency" }"#);
        assert_eq!(settings.target_fps, 60.0);
        assert_eq!(settings.max_quality, QualityTier::Low);
        assert!(settings.particles);
    }

    #[test]
    fn test_effect_toggles() {
        let budget = QualityTier::High.budget();
        let settings = Settings {
            particles: false,
            ..Default::default()
        };
        assert!(!settings.effective_celebrations());
        assert!(!settings.effective_trails(&QualityTier::Emergency.budget()));
        assert!(Settings::default().effective_trails(&budget));
    }
}
