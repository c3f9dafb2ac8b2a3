//! Quality tiers and the resource budget each one applies

use serde::{Deserialize, Serialize};

/// Discrete rendering cost level, ordered from cheapest to richest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum QualityTier {
    /// Sustained severe slowdown: every optional visual is off
    Emergency,
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Emergency => "Emergency",
            QualityTier::Low => "Low",
            QualityTier::Medium => "Medium",
            QualityTier::High => "High",
            QualityTier::Ultra => "Ultra",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "emergency" => Some(QualityTier::Emergency),
            "low" => Some(QualityTier::Low),
            "medium" | "med" => Some(QualityTier::Medium),
            "high" => Some(QualityTier::High),
            "ultra" => Some(QualityTier::Ultra),
            _ => None,
        }
    }

    /// One step richer; Emergency only ever leaves to Low
    pub fn up(self) -> Self {
        match self {
            QualityTier::Emergency => QualityTier::Low,
            QualityTier::Low => QualityTier::Medium,
            QualityTier::Medium => QualityTier::High,
            QualityTier::High | QualityTier::Ultra => QualityTier::Ultra,
        }
    }

    pub fn budget(&self) -> TierBudget {
        match self {
            QualityTier::Emergency => TierBudget {
                max_particles: 0,
                max_trails: 0,
                shadows: false,
                bloom: false,
                post_effects: false,
                cull_distance: 30.0,
            },
            QualityTier::Low => TierBudget {
                max_particles: 100,
                max_trails: 16,
                shadows: false,
                bloom: false,
                post_effects: false,
                cull_distance: 60.0,
            },
            QualityTier::Medium => TierBudget {
                max_particles: 300,
                max_trails: 32,
                shadows: true,
                bloom: false,
                post_effects: false,
                cull_distance: 80.0,
            },
            QualityTier::High => TierBudget {
                max_particles: 600,
                max_trails: 48,
                shadows: true,
                bloom: true,
                post_effects: false,
                cull_distance: 100.0,
            },
            QualityTier::Ultra => TierBudget {
                max_particles: 1000,
                max_trails: 64,
                shadows: true,
                bloom: true,
                post_effects: true,
                cull_distance: 120.0,
            },
        }
    }
}

/// Preset bundle applied on every tier change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBudget {
    pub max_particles: usize,
    pub max_trails: usize,
    pub shadows: bool,
    pub bloom: bool,
    /// Shader-style post effects
    pub post_effects: bool,
    /// Entities beyond this distance are not drawn
    pub cull_distance: f32,
}

impl TierBudget {
    pub fn any_optional_effects(&self) -> bool {
        self.shadows || self.bloom || self.post_effects || self.max_particles > 0
    }
}
