//! Performance governor and transient resource pools
//!
//! Independent of game rules: it only sees frame times and effect requests.

pub mod governor;
pub mod pool;
pub mod tier;

pub use governor::{
    Particle, PerformanceGovernor, ResourcePools, TierChange, TrailSegment, WindowSample,
};
pub use pool::{Handle, Pool};
pub use tier::{QualityTier, TierBudget};
