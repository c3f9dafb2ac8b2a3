//! Fixed timestep simulation tick
//!
//! `Simulation` is the context object that owns every component; nothing
//! lives in globals. Stage order inside a tick is fixed:
//! physics → collision and prediction → flow and difficulty. Performance
//! measurement runs last, once per rendered frame, via `record_frame`.

use glam::Vec3;

use super::adaptive::AdaptiveAi;
use super::autopilot;
use super::collision::{self, Outcome};
use super::events::{EffectKind, EffectRequest, GameEvent, SoundCue};
use super::flow::FlowState;
use super::physics::{self, PhysicsReport};
use super::reward::{EscapeUpdate, LastSecondEscapeTracker, NearMissTracker};
use super::spawner::{PatternSpawner, SpawnDescriptor, SpawnRequest, Spawner};
use super::state::{ActionMode, GamePhase, GameState, ObstacleKind, RunSummary};
use crate::consts::*;
use crate::lane_center;
use crate::perf::{PerformanceGovernor, QualityTier, ResourcePools};
use crate::persistence::{SaveSnapshot, SnapshotStore};
use crate::settings::Settings;
use crate::tuning::Tuning;

/// Nearest track position a new wave may start at
const MIN_SPAWN_X: f32 = 25.0;
/// Run speed above which the player leaves a trail
const TRAIL_SPEED: f32 = 14.0;

/// Input commands for a single tick (edge-triggered except `slide_held`)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub jump: bool,
    /// Start a slide (or fast-fall when airborne)
    pub slide: bool,
    /// Slide button currently held
    pub slide_held: bool,
    /// -1 left, +1 right
    pub lane_move: Option<i8>,
    /// Pause toggle
    pub pause: bool,
    /// Idle/demo mode - the bot plays the run
    pub autopilot: bool,
}

pub struct Simulation {
    pub state: GameState,
    pub tuning: Tuning,
    pub settings: Settings,
    pub near_miss: NearMissTracker,
    pub escape: LastSecondEscapeTracker,
    pub flow: FlowState,
    pub ai: AdaptiveAi,
    pub governor: PerformanceGovernor,
    pub pools: ResourcePools,
    spawner: Box<dyn Spawner>,
    snapshot: SaveSnapshot,
    events: Vec<GameEvent>,
    snapshot_timer: f32,
    /// Fractional score waiting to become whole points
    score_carry: f32,
}

impl Simulation {
    /// Start a run seeded from a persisted snapshot
    pub fn new(seed: u64, tuning: Tuning, settings: Settings, snapshot: SaveSnapshot) -> Self {
        let tuning = tuning.sanitized();
        let snapshot = snapshot.sanitized();
        let mut sim = Self {
            state: GameState::new(seed),
            near_miss: NearMissTracker::new(&tuning.reward),
            escape: LastSecondEscapeTracker::new(&tuning.reward),
            flow: FlowState::seeded(&tuning.flow, snapshot.flow_momentum),
            ai: AdaptiveAi::seeded(&tuning.adaptive, snapshot.skill_level),
            governor: PerformanceGovernor::new(
                &tuning.perf,
                settings.target_fps,
                settings.max_quality,
            ),
            pools: ResourcePools::new(&tuning.perf),
            spawner: Box::new(PatternSpawner::new(seed)),
            snapshot,
            events: Vec::new(),
            snapshot_timer: 0.0,
            score_carry: 0.0,
            tuning,
            settings,
        };
        sim.apply_unlocks();
        log::info!(
            "Run started (seed {}, skill {:.2}, tier {})",
            seed,
            sim.ai.skill_level,
            sim.governor.tier().as_str()
        );
        sim
    }

    /// Start a run from whatever the store holds (or defaults)
    pub fn from_store(
        seed: u64,
        tuning: Tuning,
        settings: Settings,
        store: &dyn SnapshotStore,
    ) -> Self {
        let snapshot = SaveSnapshot::load_or_default(store.load().as_deref());
        Self::new(seed, tuning, settings, snapshot)
    }

    /// Replace the default spawner
    pub fn with_spawner(mut self, spawner: Box<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    fn apply_unlocks(&mut self) {
        let unlocks = self.snapshot.unlocks;
        self.state.effects.double_jump_unlocked = unlocks.double_jump;
        self.state.effects.shield_active = unlocks.starting_shield;
    }

    pub fn snapshot(&self) -> &SaveSnapshot {
        &self.snapshot
    }

    pub fn is_over(&self) -> bool {
        self.state.phase == GamePhase::GameOver
    }

    /// Take every event queued since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Summary of the run so far
    pub fn summary(&self, cause: Option<ObstacleKind>) -> RunSummary {
        RunSummary {
            score: self.state.score,
            distance: self.state.distance,
            duration: self.state.elapsed,
            max_combo: self.state.max_combo,
            max_near_miss_streak: self.near_miss.max_streak,
            max_escape_streak: self.escape.max_streak,
            peak_flow_level: self.flow.peak_level,
            cause,
        }
    }

    /// End the current run and reset all four components
    pub fn restart(&mut self, seed: u64) {
        self.state = GameState::new(seed);
        self.near_miss.reset();
        self.escape.reset();
        self.flow = FlowState::seeded(&self.tuning.flow, self.snapshot.flow_momentum);
        self.ai.reset(self.snapshot.skill_level);
        self.governor.reset();
        self.pools.clear();
        self.spawner.reseed(seed);
        self.snapshot_timer = 0.0;
        self.score_carry = 0.0;
        self.apply_unlocks();
        log::info!("Run restarted (seed {})", seed);
    }

    /// Advance the game by one fixed timestep
    pub fn tick(&mut self, input: &TickInput, dt: f32) {
        // Handle pause toggle
        if input.pause {
            match self.state.phase {
                GamePhase::Playing => {
                    self.state.phase = GamePhase::Paused;
                    return;
                }
                GamePhase::Paused => self.state.phase = GamePhase::Playing,
                GamePhase::GameOver => {}
            }
        }

        match self.state.phase {
            GamePhase::Paused => return,
            GamePhase::GameOver => {
                // Let the crash effects play out
                self.pools.update(dt, 0.0);
                return;
            }
            GamePhase::Playing => {}
        }

        let mut input = input.clone();
        if input.autopilot {
            autopilot::drive(&self.state, &mut input);
        }

        self.state.time_ticks += 1;
        self.state.elapsed += dt;
        let now = self.state.elapsed;
        let distance_before = self.state.distance;

        // 1. Physics
        let report = physics::step(&mut self.state, &input, &self.tuning.physics, dt);
        self.physics_feedback(&report);
        self.spawn_waves();

        // 2. Collision and prediction
        if !self.resolve_contacts() {
            self.pools.update(dt, 0.0);
            return;
        }
        self.score_near_misses(now);
        self.score_escape(&report, now);
        self.despawn_passed();

        let travelled = self.state.distance - distance_before;
        self.add_score(travelled * self.tuning.reward.distance_score);

        // 3. Flow and difficulty
        if let Some(level) = self.flow.update() {
            self.events.push(GameEvent::FlowLevelUp {
                level,
                multiplier: self.flow.multiplier(),
            });
            self.events.push(GameEvent::Sound(SoundCue::FlowLevelUp));
            if self.settings.effective_celebrations() {
                let position = self.player_position();
                self.emit_effect(EffectKind::FlowBurst, position, 1.0);
            }
        }
        self.ai.update(self.flow.normalized(), dt);

        let player = &self.state.player;
        let trailing = self.state.speed >= TRAIL_SPEED || player.mode == ActionMode::WallRunning;
        if trailing && self.settings.effective_trails(self.governor.budget()) {
            let position = self.player_position();
            self.pools.push_trail(position, self.governor.budget());
        }
        self.pools.update(dt, travelled);

        self.snapshot_timer += dt;
        if self.snapshot_timer >= self.tuning.snapshot_interval {
            self.snapshot_timer = 0.0;
            self.offer_snapshot();
        }

        self.state.normalize_order();
    }

    /// Performance stage: record one rendered frame's duration
    pub fn record_frame(&mut self, frame_ms: f32) {
        let Some(change) = self.governor.record_frame(frame_ms) else {
            return;
        };
        self.events.push(GameEvent::QualityChanged {
            from: change.from,
            to: change.to,
        });
        if change.entered_emergency() {
            self.pools.clear();
            if self.settings.show_notices {
                self.events.push(GameEvent::EmergencyNotice);
                self.events.push(GameEvent::Sound(SoundCue::QualityNotice));
            }
        }
        if change.from == QualityTier::Emergency {
            log::info!("Recovered from emergency quality");
        }
    }

    fn player_position(&self) -> Vec3 {
        let player = &self.state.player;
        Vec3::new(0.0, player.y, lane_center(player.lane))
    }

    /// Queue an effect if the particle budget can place any of it
    pub fn emit_effect(&mut self, kind: EffectKind, position: Vec3, intensity: f32) {
        if !self.settings.particles {
            return;
        }
        let request = EffectRequest {
            kind,
            position,
            intensity,
        };
        if self.pools.spawn_burst(&request, &self.governor) > 0 {
            self.events.push(GameEvent::Effect(request));
        }
    }

    /// Score points through the flow multiplier
    fn add_score(&mut self, points: f32) {
        if !points.is_finite() || points <= 0.0 {
            return;
        }
        let total = points * self.flow.multiplier() + self.score_carry;
        let whole = total.floor();
        self.score_carry = total - whole;
        self.state.score += whole as u64;
    }

    fn physics_feedback(&mut self, report: &PhysicsReport) {
        let position = self.player_position();
        if report.jumped || report.double_jumped {
            self.flow.credit(self.tuning.reward.jump_credit);
            let cue = if report.double_jumped {
                SoundCue::DoubleJump
            } else {
                SoundCue::Jump
            };
            self.events.push(GameEvent::Sound(cue));
            self.emit_effect(EffectKind::JumpDust, position, 0.5);
        }
        if report.slid {
            self.events.push(GameEvent::Sound(SoundCue::Slide));
        }
        if report.landed {
            self.events.push(GameEvent::Sound(SoundCue::Land));
            self.emit_effect(EffectKind::LandingDust, position, 0.4);
        }
        if let Some(wall_id) = report.wall_run_started {
            self.events.push(GameEvent::Sound(SoundCue::WallRun));
            if let Some(wall) = self.state.wall(wall_id) {
                let sparks = Vec3::new(0.0, position.y, wall.center().z);
                self.emit_effect(EffectKind::WallSparks, sparks, 0.6);
            }
        }
    }

    /// Ask the spawner for waves until the horizon is filled
    fn spawn_waves(&mut self) {
        let frontier = self.state.frontier();
        if frontier >= SPAWN_AHEAD {
            return;
        }
        let difficulty = self.ai.difficulty;
        let request = SpawnRequest {
            spawn_x: (frontier + difficulty.spacing).max(MIN_SPAWN_X),
            spacing: difficulty.spacing,
            complexity: difficulty.complexity,
            speed: self.state.speed,
        };
        for descriptor in self.spawner.spawn(&request) {
            match descriptor {
                SpawnDescriptor::Obstacle { kind, lane, x } if x.is_finite() => {
                    self.state.spawn_obstacle(x, lane, kind);
                }
                SpawnDescriptor::Wall {
                    side,
                    x,
                    length,
                    base,
                    top,
                } if x.is_finite() && length.is_finite() => {
                    self.state.spawn_wall(x, length, base, top, side);
                }
                other => log::warn!("Dropping invalid spawn {:?}", other),
            }
        }
    }

    /// Failure path; returns false once the run has ended
    fn resolve_contacts(&mut self) -> bool {
        for contact in collision::detect_contacts(&self.state) {
            match collision::resolve(&contact, &mut self.state.effects) {
                Outcome::Handled => {}
                Outcome::ShieldAbsorbed => {
                    log::info!("Shield absorbed a {}", contact.kind.name());
                    self.escape.on_collision(contact.obstacle_id);
                    let position = self
                        .state
                        .obstacle(contact.obstacle_id)
                        .map(|o| o.hitbox().center())
                        .unwrap_or_else(|| self.player_position());
                    self.state.obstacles.retain(|o| o.id != contact.obstacle_id);
                    self.state.combo = 0;
                    self.ai.record_outcome(false);
                    self.events.push(GameEvent::ShieldConsumed {
                        obstacle_id: contact.obstacle_id,
                        kind: contact.kind,
                    });
                    self.events.push(GameEvent::Sound(SoundCue::ShieldBreak));
                    self.emit_effect(EffectKind::ShieldBreak, position, 1.0);
                }
                Outcome::Fatal => {
                    self.escape.on_collision(contact.obstacle_id);
                    self.end_run(Some(contact.kind));
                    return false;
                }
            }
        }
        true
    }

    fn score_near_misses(&mut self, now: f32) {
        let events = self
            .near_miss
            .scan(&mut self.state, &self.tuning.reward, now);
        for event in events {
            let before = self.state.score;
            self.add_score(event.bonus);
            self.flow
                .credit(self.tuning.reward.near_miss_credit * event.streak as f32);
            self.ai.record_reaction();
            self.events.push(GameEvent::NearMiss {
                obstacle_id: event.obstacle_id,
                bonus: self.state.score - before,
                streak: event.streak,
            });
            self.events.push(GameEvent::Sound(SoundCue::NearMiss));
            let intensity = (event.streak as f32 / 5.0).min(1.0);
            self.emit_effect(EffectKind::NearMissStreak, event.position, intensity);
        }
    }

    fn score_escape(&mut self, report: &PhysicsReport, now: f32) {
        let update = self.escape.update(
            &self.state,
            &self.tuning.physics,
            &self.tuning.reward,
            report.acted,
            now,
        );
        match update {
            EscapeUpdate::Escaped {
                obstacle_id,
                bonus,
                streak,
            } => {
                log::debug!("Last-second escape from {} (streak {})", obstacle_id, streak);
                let before = self.state.score;
                self.add_score(bonus);
                self.flow
                    .credit(self.tuning.reward.escape_credit * streak as f32);
                self.ai.record_reaction();
                self.ai.record_outcome(true);
                self.events.push(GameEvent::Escape {
                    obstacle_id,
                    bonus: self.state.score - before,
                    streak,
                });
                self.events.push(GameEvent::Sound(SoundCue::Escape));
                let position = self.player_position();
                self.emit_effect(EffectKind::EscapeFlash, position, 0.8);
            }
            EscapeUpdate::Expired { obstacle_id } => {
                log::debug!("Escape window for {} expired", obstacle_id);
            }
            EscapeUpdate::Idle | EscapeUpdate::Raised(_) | EscapeUpdate::Cleared { .. } => {}
        }
    }

    /// Remove entities behind the player; every obstacle passed is a clear
    fn despawn_passed(&mut self) {
        let before = self.state.obstacles.len();
        self.state.obstacles.retain(|o| !o.is_behind_player());
        let cleared = before - self.state.obstacles.len();
        for _ in 0..cleared {
            self.state.bump_combo();
            self.add_score(self.tuning.reward.clear_bonus);
            self.flow.credit(self.tuning.reward.combo_credit);
            self.ai.record_outcome(true);
        }
        self.state.walls.retain(|w| !w.is_behind_player());
    }

    fn offer_snapshot(&mut self) {
        let mut snapshot = self.snapshot.clone();
        snapshot.best_score = snapshot.best_score.max(self.state.score);
        snapshot.skill_level = self.ai.skill_level;
        snapshot.flow_momentum = self.flow.momentum;
        self.events.push(GameEvent::SnapshotOffered(snapshot));
    }

    /// Fatal outcome: exactly one `RunEnded` per run
    fn end_run(&mut self, cause: Option<ObstacleKind>) {
        if self.state.phase == GamePhase::GameOver {
            return;
        }
        self.state.phase = GamePhase::GameOver;
        let summary = self.summary(cause);
        log::info!(
            "Run over: score {}, {:.0}m, hit {}",
            summary.score,
            summary.distance,
            cause.map(|k| k.name()).unwrap_or("nothing")
        );

        if let Some(rank) = self.snapshot.record_run(&summary, self.ai.skill_level) {
            log::info!("Top score rank {}", rank);
        }
        self.events.push(GameEvent::Sound(SoundCue::Crash));
        let position = self.player_position();
        self.emit_effect(EffectKind::Crash, position, 1.0);
        self.events.push(GameEvent::RunEnded(summary));
        self.events
            .push(GameEvent::SnapshotOffered(self.snapshot.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::WallSide;

    /// Spawner that never places anything, so tests control the track
    struct EmptySpawner;

    impl Spawner for EmptySpawner {
        fn spawn(&mut self, _request: &SpawnRequest) -> Vec<SpawnDescriptor> {
            Vec::new()
        }
    }

    fn sim() -> Simulation {
        Simulation::new(
            12345,
            Tuning::default(),
            Settings::default(),
            SaveSnapshot::default(),
        )
        .with_spawner(Box::new(EmptySpawner))
    }

    fn run_ended_count(events: &[GameEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, GameEvent::RunEnded(_)))
            .count()
    }

    #[test]
    fn test_tick_pause() {
        let mut sim = sim();
        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        sim.tick(&pause, SIM_DT);
        assert_eq!(sim.state.phase, GamePhase::Paused);
        let distance = sim.state.distance;
        sim.tick(&TickInput::default(), SIM_DT);
        assert_eq!(sim.state.distance, distance);

        // Unpause
        sim.tick(&pause, SIM_DT);
        assert_eq!(sim.state.phase, GamePhase::Playing);
        assert!(sim.state.distance > distance);
    }

    #[test]
    fn test_distance_scores() {
        let mut sim = sim();
        for _ in 0..120 {
            sim.tick(&TickInput::default(), SIM_DT);
        }
        assert!(sim.state.score >= 19);
        assert_eq!(sim.state.time_ticks, 120);
    }

    #[test]
    fn test_fatal_collision_ends_run_once() {
        let mut sim = sim();
        sim.state
            .spawn_obstacle(3.0, 0, ObstacleKind::Barricade { height: 2.5 });
        for _ in 0..120 {
            sim.tick(&TickInput::default(), SIM_DT);
        }
        assert!(sim.is_over());
        let events = sim.drain_events();
        assert_eq!(run_ended_count(&events), 1);
        let summary = events.iter().find_map(|e| match e {
            GameEvent::RunEnded(s) => Some(s.clone()),
            _ => None,
        });
        assert!(matches!(
            summary.and_then(|s| s.cause),
            Some(ObstacleKind::Barricade { .. })
        ));
        assert_eq!(sim.snapshot().runs, 1);
    }

    #[test]
    fn test_shield_absorbs_and_destroys_obstacle() {
        let mut sim = sim();
        sim.state.effects.shield_active = true;
        let id = sim
            .state
            .spawn_obstacle(3.0, 0, ObstacleKind::Barricade { height: 2.5 });
        for _ in 0..60 {
            sim.tick(&TickInput::default(), SIM_DT);
        }
        assert!(!sim.is_over());
        assert!(!sim.state.effects.shield_active);
        assert!(sim.state.obstacle(id).is_none());
        let events = sim.drain_events();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, GameEvent::ShieldConsumed { obstacle_id, .. } if *obstacle_id == id))
        );
        assert_eq!(run_ended_count(&events), 0);
    }

    #[test]
    fn test_passing_obstacle_builds_combo() {
        let mut sim = sim();
        sim.state
            .spawn_obstacle(3.0, 1, ObstacleKind::Barricade { height: 2.5 });
        for _ in 0..60 {
            sim.tick(&TickInput::default(), SIM_DT);
        }
        assert_eq!(sim.state.combo, 1);
        assert!(sim.state.obstacles.is_empty());
        assert!(sim.ai.history_len() >= 1);
        // Passing one lane over is also a near miss
        assert_eq!(sim.near_miss.max_streak, 1);
    }

    #[test]
    fn test_jump_credits_momentum() {
        let mut sim = sim();
        let jump = TickInput {
            jump: true,
            ..Default::default()
        };
        sim.tick(&jump, SIM_DT);
        assert!(sim.flow.momentum > 0.0);
        let events = sim.drain_events();
        assert!(events.contains(&GameEvent::Sound(SoundCue::Jump)));
    }

    #[test]
    fn test_snapshot_offered_periodically() {
        let mut tuning = Tuning::default();
        tuning.snapshot_interval = 0.5;
        let mut sim = Simulation::new(1, tuning, Settings::default(), SaveSnapshot::default())
            .with_spawner(Box::new(EmptySpawner));
        for _ in 0..100 {
            sim.tick(&TickInput::default(), SIM_DT);
        }
        let offers = sim
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::SnapshotOffered(_)))
            .count();
        assert_eq!(offers, 3);
    }

    #[test]
    fn test_unlocks_seed_effects() {
        let mut snapshot = SaveSnapshot::default();
        snapshot.unlocks.double_jump = true;
        snapshot.unlocks.starting_shield = true;
        let sim = Simulation::new(1, Tuning::default(), Settings::default(), snapshot);
        assert!(sim.state.effects.double_jump_unlocked);
        assert!(sim.state.effects.shield_active);
    }

    #[test]
    fn test_emergency_clears_pools() {
        let mut sim = sim();
        sim.emit_effect(EffectKind::FlowBurst, Vec3::ZERO, 1.0);
        assert!(sim.pools.live_particles() > 0);
        for _ in 0..200 {
            sim.record_frame(50.0);
        }
        assert_eq!(sim.governor.tier(), QualityTier::Emergency);
        assert_eq!(sim.pools.live_particles(), 0);
        let events = sim.drain_events();
        assert!(events.contains(&GameEvent::EmergencyNotice));

        // No new particles while in emergency
        sim.emit_effect(EffectKind::FlowBurst, Vec3::ZERO, 1.0);
        assert_eq!(sim.pools.live_particles(), 0);
    }

    #[test]
    fn test_restart_resets_components() {
        let mut sim = sim();
        sim.state
            .spawn_obstacle(3.0, 0, ObstacleKind::Barricade { height: 2.5 });
        sim.state.spawn_wall(10.0, 5.0, 0.5, 3.0, WallSide::Left);
        sim.flow.credit(50.0);
        sim.near_miss.record(0.0);
        for _ in 0..60 {
            sim.tick(&TickInput::default(), SIM_DT);
        }
        assert!(sim.is_over());

        sim.restart(777);
        assert_eq!(sim.state.phase, GamePhase::Playing);
        assert_eq!(sim.state.seed, 777);
        assert_eq!(sim.state.score, 0);
        assert!(sim.state.obstacles.is_empty() && sim.state.walls.is_empty());
        assert_eq!(sim.flow.momentum, 0.0);
        assert_eq!(sim.near_miss.streak, 0);
        assert!(!sim.escape.is_flagged());
        assert_eq!(sim.governor.tier(), QualityTier::High);
        assert_eq!(sim.pools.live_particles(), 0);
    }

    #[test]
    fn test_determinism() {
        // Two simulations with the same seed should produce identical runs
        let run = || {
            let mut sim = Simulation::new(
                99999,
                Tuning::default(),
                Settings::default(),
                SaveSnapshot::default(),
            );
            let input = TickInput {
                autopilot: true,
                ..Default::default()
            };
            for _ in 0..600 {
                sim.tick(&input, SIM_DT);
            }
            (sim.state.score, sim.state.distance, sim.state.time_ticks)
        };
        assert_eq!(run(), run());
    }
}
