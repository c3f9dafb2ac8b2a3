//! Save snapshots offered to the storage collaborator
//!
//! The core never performs storage I/O. It hands out `SaveSnapshot`s through
//! the event queue and, at startup, accepts whatever the store returns:
//! - Versioned JSON document
//! - Missing or malformed input falls back to defaults
//! - Out-of-range values are clamped, NaN is replaced

use serde::{Deserialize, Serialize};

use crate::sim::state::RunSummary;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Maximum number of top scores to keep
pub const MAX_TOP_SCORES: usize = 10;

/// Distance in a single run that unlocks the double jump
pub const DOUBLE_JUMP_DISTANCE: f32 = 500.0;
/// Best score that unlocks starting each run with a shield
pub const SHIELD_SCORE: u64 = 5_000;

/// Unlocked-content flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Unlocks {
    pub double_jump: bool,
    pub starting_shield: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSnapshot {
    pub version: u32,
    pub best_score: u64,
    /// Top scores, sorted descending
    pub top_scores: Vec<u64>,
    pub skill_level: f32,
    pub flow_momentum: f32,
    pub unlocks: Unlocks,
    pub runs: u32,
}

impl Default for SaveSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            best_score: 0,
            top_scores: Vec::new(),
            skill_level: 0.3,
            flow_momentum: 0.0,
            unlocks: Unlocks::default(),
            runs: 0,
        }
    }
}

impl SaveSnapshot {
    /// Parse a stored snapshot; anything unusable yields defaults
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<SaveSnapshot>(json) {
            Ok(snapshot) if snapshot.version > SNAPSHOT_VERSION => {
                log::warn!(
                    "Snapshot version {} is newer than {}, using defaults",
                    snapshot.version,
                    SNAPSHOT_VERSION
                );
                Self::default()
            }
            Ok(snapshot) => {
                log::info!("Loaded snapshot (best score {})", snapshot.best_score);
                snapshot.sanitized()
            }
            Err(e) => {
                log::warn!("Malformed snapshot ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// `from_json` for a store that may have nothing yet
    pub fn load_or_default(json: Option<&str>) -> Self {
        match json {
            Some(json) => Self::from_json(json),
            None => {
                log::info!("No snapshot stored, using defaults");
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                log::warn!("Failed to serialize snapshot: {}", e);
                None
            }
        }
    }

    /// Clamp values a hand-edited or corrupted save could carry
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.version = SNAPSHOT_VERSION;
        self.skill_level = if self.skill_level.is_finite() {
            self.skill_level.clamp(0.0, 1.0)
        } else {
            defaults.skill_level
        };
        self.flow_momentum = if self.flow_momentum.is_finite() {
            self.flow_momentum.max(0.0)
        } else {
            0.0
        };
        self.top_scores.sort_unstable_by(|a, b| b.cmp(a));
        self.top_scores.truncate(MAX_TOP_SCORES);
        let top = self.top_scores.first().copied().unwrap_or(0);
        self.best_score = self.best_score.max(top);
        self
    }

    /// Check if a score would make the top list
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.top_scores.len() < MAX_TOP_SCORES {
            return true;
        }
        self.top_scores.last().map(|&s| score > s).unwrap_or(true)
    }

    /// Fold a finished run in; returns the rank achieved (1-indexed)
    pub fn record_run(&mut self, summary: &RunSummary, skill_level: f32) -> Option<usize> {
        self.runs = self.runs.saturating_add(1);
        if skill_level.is_finite() {
            self.skill_level = skill_level.clamp(0.0, 1.0);
        }
        // Momentum does not carry across a crash
        self.flow_momentum = 0.0;
        self.best_score = self.best_score.max(summary.score);

        if summary.distance >= DOUBLE_JUMP_DISTANCE && !self.unlocks.double_jump {
            log::info!("Unlocked double jump");
            self.unlocks.double_jump = true;
        }
        if self.best_score >= SHIELD_SCORE && !self.unlocks.starting_shield {
            log::info!("Unlocked starting shield");
            self.unlocks.starting_shield = true;
        }

        if !self.qualifies(summary.score) {
            return None;
        }
        let pos = self
            .top_scores
            .iter()
            .position(|&s| summary.score > s)
            .unwrap_or(self.top_scores.len());
        self.top_scores.insert(pos, summary.score);
        self.top_scores.truncate(MAX_TOP_SCORES);
        Some(pos + 1)
    }
}

/// Storage collaborator; writes are fire-and-forget
pub trait SnapshotStore {
    /// Raw stored document, if any
    fn load(&self) -> Option<String>;
    fn store(&mut self, snapshot: &SaveSnapshot);
}

/// In-memory store for tests and the headless demo
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
    pub writes: usize,
}

impl MemoryStore {
    pub fn with_document(json: impl Into<String>) -> Self {
        Self {
            document: Some(json.into()),
            writes: 0,
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.document.clone()
    }

    fn store(&mut self, snapshot: &SaveSnapshot) {
        if let Some(json) = snapshot.to_json() {
            self.document = Some(json);
            self.writes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(score: u64, distance: f32) -> RunSummary {
        RunSummary {
            score,
            distance,
            duration: 30.0,
            max_combo: 3,
            max_near_miss_streak: 1,
            max_escape_streak: 0,
            peak_flow_level: 1,
            cause: None,
        }
    }

    #[test]
    fn test_malformed_and_missing_fall_back() {
        assert_eq!(SaveSnapshot::from_json("{ nope"), SaveSnapshot::default());
        assert_eq!(SaveSnapshot::from_json("42"), SaveSnapshot::default());
        assert_eq!(SaveSnapshot::load_or_default(None), SaveSnapshot::default());
    }

    #[test]
    fn test_partial_document() {
        let snapshot = SaveSnapshot::from_json(r#"{ "best_score": 1200 }"#);
        assert_eq!(snapshot.best_score, 1200);
        assert_eq!(snapshot.skill_level, SaveSnapshot::default().skill_level);
    }

    #[test]
    fn test_out_of_range_values_sanitised() {
        let snapshot = SaveSnapshot::from_json(
            r#"{ "skill_level": 7.5, "flow_momentum": -3.0, "top_scores": [5, 900, 40] }"#,
        );
        assert_eq!(snapshot.skill_level, 1.0);
        assert_eq!(snapshot.flow_momentum, 0.0);
        assert_eq!(snapshot.top_scores, vec![900, 40, 5]);
        assert_eq!(snapshot.best_score, 900);

        let nan = SaveSnapshot {
            skill_level: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(nan.skill_level, SaveSnapshot::default().skill_level);
    }

    #[test]
    fn test_newer_version_rejected() {
        let snapshot = SaveSnapshot::from_json(r#"{ "version": 99, "best_score": 10 }"#);
        assert_eq!(snapshot.best_score, 0);
    }

    #[test]
    fn test_record_run_ranks_and_unlocks() {
        let mut snapshot = SaveSnapshot::default();
        assert_eq!(snapshot.record_run(&summary(300, 100.0), 0.4), Some(1));
        assert_eq!(snapshot.record_run(&summary(100, 600.0), 0.5), Some(2));
        assert_eq!(snapshot.record_run(&summary(0, 10.0), 0.5), None);
        assert_eq!(snapshot.best_score, 300);
        assert_eq!(snapshot.runs, 3);
        assert!(snapshot.unlocks.double_jump);
        assert!(!snapshot.unlocks.starting_shield);
        assert_eq!(snapshot.skill_level, 0.5);
    }

    #[test]
    fn test_top_scores_capped() {
        let mut snapshot = SaveSnapshot::default();
        for score in 1..=15 {
            snapshot.record_run(&summary(score * 10, 0.0), 0.3);
        }
        assert_eq!(snapshot.top_scores.len(), MAX_TOP_SCORES);
        assert_eq!(snapshot.top_scores[0], 150);
        assert!(!snapshot.qualifies(50));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::default();
        assert!(store.load().is_none());
        let mut snapshot = SaveSnapshot::default();
        snapshot.record_run(&summary(6_000, 50.0), 0.7);
        store.store(&snapshot);
        assert_eq!(store.writes, 1);
        let loaded = SaveSnapshot::load_or_default(store.load().as_deref());
        assert_eq!(loaded, snapshot);
        assert!(loaded.unlocks.starting_shield);
    }
}
