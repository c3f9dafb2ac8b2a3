//! Player action state machine and kinematic integration
//!
//! Owns every mutation of `PlayerState`. Contacts with obstacles are only
//! reported here (see `collision`); deciding what an overlap means is the
//! failure path's job.

use super::state::{ActionMode, GameState, PlayerState};
use super::tick::TickInput;
use crate::clamp_lane;
use crate::tuning::PhysicsTuning;

/// What the physics step did this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysicsReport {
    /// Any state-changing command was applied
    pub acted: bool,
    pub jumped: bool,
    pub double_jumped: bool,
    pub slid: bool,
    pub lane_changed: bool,
    pub landed: bool,
    /// Wall id when a wall run began this frame
    pub wall_run_started: Option<u32>,
    pub wall_run_ended: bool,
}

/// Predicted player pose at some future time, assuming no input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPose {
    pub y: f32,
    pub mode: ActionMode,
}

/// Advance player and world by one frame
pub fn step(
    state: &mut GameState,
    input: &TickInput,
    tuning: &PhysicsTuning,
    dt: f32,
) -> PhysicsReport {
    let mut report = PhysicsReport::default();
    apply_commands(state, input, tuning, &mut report);
    advect(state, tuning, dt);
    integrate(state, input.slide_held, tuning, dt, &mut report);
    report
}

/// Apply edge-triggered commands to the action state machine
pub fn apply_commands(
    state: &mut GameState,
    input: &TickInput,
    tuning: &PhysicsTuning,
    report: &mut PhysicsReport,
) {
    let unlocked = state.effects.double_jump_unlocked;
    let player = &mut state.player;

    if let Some(delta) = input.lane_move
        && player.mode != ActionMode::WallRunning
    {
        let lane = clamp_lane(player.lane.saturating_add(delta));
        if lane != player.lane {
            player.lane = lane;
            report.lane_changed = true;
            report.acted = true;
        }
    }

    if input.jump {
        match player.mode {
            ActionMode::Running => {
                player.mode = ActionMode::Jumping;
                player.vy = tuning.jump_velocity;
                report.jumped = true;
            }
            ActionMode::Sliding if player.is_grounded() => {
                player.slide_time = 0.0;
                player.mode = ActionMode::Jumping;
                player.vy = tuning.jump_velocity;
                report.jumped = true;
            }
            ActionMode::Sliding | ActionMode::Jumping => {
                if unlocked && !player.double_jump_used {
                    player.slide_time = 0.0;
                    player.mode = ActionMode::Jumping;
                    player.vy = tuning.double_jump_velocity;
                    player.double_jump_used = true;
                    report.double_jumped = true;
                }
            }
            ActionMode::WallRunning => {
                // Jumping off the wall early
                leave_wall(player, tuning.jump_velocity);
                report.wall_run_ended = true;
                report.jumped = true;
            }
        }
    }

    if input.slide {
        match player.mode {
            ActionMode::Running => {
                player.mode = ActionMode::Sliding;
                player.slide_time = tuning.slide_duration;
                report.slid = true;
            }
            ActionMode::Jumping => {
                player.mode = ActionMode::Sliding;
                player.slide_time = tuning.slide_duration;
                player.vy = player.vy.min(-tuning.fast_fall_velocity);
                report.slid = true;
            }
            ActionMode::Sliding | ActionMode::WallRunning => {}
        }
    }

    report.acted |= report.jumped || report.double_jumped || report.slid;
}

/// Move the world toward the player and ramp run speed
pub fn advect(state: &mut GameState, tuning: &PhysicsTuning, dt: f32) {
    state.speed = (state.speed + tuning.speed_ramp * dt).min(tuning.max_speed);
    let dx = state.speed * dt;
    for obstacle in &mut state.obstacles {
        obstacle.x -= dx;
    }
    for wall in &mut state.walls {
        wall.x -= dx;
    }
    state.distance += dx;
}

/// Integrate the player's vertical motion and run timed transitions
pub fn integrate(
    state: &mut GameState,
    slide_held: bool,
    tuning: &PhysicsTuning,
    dt: f32,
    report: &mut PhysicsReport,
) {
    state.effects.advance(dt);
    let gravity = tuning.gravity * state.effects.gravity_scale();
    let walls = &state.walls;
    let player = &mut state.player;

    match player.mode {
        ActionMode::Running => {
            player.y = 0.0;
            player.vy = 0.0;
        }

        ActionMode::Jumping => {
            player.vy -= gravity * dt;
            let projected = player.y + player.vy * dt;

            // Falling onto a reachable wall's runnable span starts a wall run
            let (lane, last_wall) = (player.lane, player.last_wall);
            let wall = if player.vy < 0.0 && projected > 0.0 {
                walls.iter().find(|w| {
                    Some(w.id) != last_wall
                        && w.reachable_from(lane)
                        && w.spans_player()
                        && w.contains_height(projected)
                })
            } else {
                None
            };

            if let Some(wall) = wall {
                player.mode = ActionMode::WallRunning;
                player.wall_id = Some(wall.id);
                player.wall_side = Some(wall.side);
                player.wall_time = 0.0;
                player.vy = 0.0;
                player.y = projected;
                report.wall_run_started = Some(wall.id);
                log::debug!("Wall run started on wall {}", wall.id);
            } else {
                player.y = projected;
                if player.y <= 0.0 && player.vy <= 0.0 {
                    land(player, report);
                }
            }
        }

        ActionMode::Sliding => {
            if !slide_held {
                player.slide_time -= dt;
            }
            if player.y > 0.0 || player.vy > 0.0 {
                player.vy -= gravity * dt;
                player.y += player.vy * dt;
                if player.y <= 0.0 && player.vy <= 0.0 {
                    land(player, report);
                }
            }
            if player.slide_time <= 0.0 {
                player.slide_time = 0.0;
                player.mode = if player.y > 0.0 {
                    ActionMode::Jumping
                } else {
                    ActionMode::Running
                };
            }
        }

        ActionMode::WallRunning => {
            player.wall_time += dt;
            player.vy = 0.0;
            let (lane, y) = (player.lane, player.y);
            let in_contact = player
                .wall_id
                .and_then(|id| walls.iter().find(|w| w.id == id))
                .is_some_and(|w| w.reachable_from(lane) && w.spans_player() && w.contains_height(y));

            if player.wall_time >= tuning.wall_run_max || !in_contact {
                log::debug!(
                    "Wall run ended after {:.2}s (contact: {})",
                    player.wall_time,
                    in_contact
                );
                leave_wall(player, tuning.wall_kick_velocity);
                report.wall_run_ended = true;
            }
        }
    }
}

/// Ground contact: reset velocity, mode, the double-jump flag and the left wall
fn land(player: &mut PlayerState, report: &mut PhysicsReport) {
    player.y = 0.0;
    player.vy = 0.0;
    player.double_jump_used = false;
    player.last_wall = None;
    if player.mode == ActionMode::Jumping {
        player.mode = ActionMode::Running;
    }
    report.landed = true;
}

fn leave_wall(player: &mut PlayerState, kick: f32) {
    player.mode = ActionMode::Jumping;
    player.vy = kick;
    player.last_wall = player.wall_id.take();
    player.wall_side = None;
    player.wall_time = 0.0;
}

/// Forward-simulate the player's vertical trajectory `t` seconds ahead
/// without any further input. Returns `None` for non-finite results.
pub fn project_pose(
    player: &PlayerState,
    gravity_scale: f32,
    tuning: &PhysicsTuning,
    t: f32,
) -> Option<ProjectedPose> {
    if !t.is_finite() || t < 0.0 {
        return None;
    }
    let gravity = tuning.gravity * gravity_scale;
    let ballistic = |y: f32, vy: f32, t: f32| {
        let raw = y + vy * t - 0.5 * gravity * t * t;
        if raw.is_nan() { raw } else { raw.max(0.0) }
    };

    let pose = match player.mode {
        ActionMode::Running => ProjectedPose {
            y: 0.0,
            mode: ActionMode::Running,
        },
        ActionMode::Jumping => {
            let y = ballistic(player.y, player.vy, t);
            ProjectedPose {
                y,
                mode: if y > 0.0 {
                    ActionMode::Jumping
                } else {
                    ActionMode::Running
                },
            }
        }
        ActionMode::Sliding => {
            let airborne = player.y > 0.0 || player.vy > 0.0;
            let y = if airborne {
                ballistic(player.y, player.vy, t)
            } else {
                0.0
            };
            let mode = if player.slide_time > t {
                ActionMode::Sliding
            } else if y > 0.0 {
                ActionMode::Jumping
            } else {
                ActionMode::Running
            };
            ProjectedPose { y, mode }
        }
        ActionMode::WallRunning => {
            let remaining = (tuning.wall_run_max - player.wall_time).max(0.0);
            if t <= remaining {
                ProjectedPose {
                    y: player.y,
                    mode: ActionMode::WallRunning,
                }
            } else {
                let y = ballistic(player.y, tuning.wall_kick_velocity, t - remaining);
                ProjectedPose {
                    y,
                    mode: if y > 0.0 {
                        ActionMode::Jumping
                    } else {
                        ActionMode::Running
                    },
                }
            }
        }
    };

    pose.y.is_finite().then_some(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::state::WallSide;

    fn run_frames(state: &mut GameState, input: &TickInput, frames: usize) -> PhysicsReport {
        let tuning = PhysicsTuning::default();
        let mut combined = PhysicsReport::default();
        for i in 0..frames {
            let frame_input = if i == 0 { input.clone() } else { TickInput::default() };
            let report = step(state, &frame_input, &tuning, SIM_DT);
            combined.landed |= report.landed;
            combined.acted |= report.acted;
            combined.wall_run_ended |= report.wall_run_ended;
            if report.wall_run_started.is_some() {
                combined.wall_run_started = report.wall_run_started;
            }
        }
        combined
    }

    fn jump() -> TickInput {
        TickInput {
            jump: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_jump_and_land() {
        let mut state = GameState::new(1);
        let report = step(&mut state, &jump(), &PhysicsTuning::default(), SIM_DT);
        assert!(report.jumped && report.acted);
        assert_eq!(state.player.mode, ActionMode::Jumping);
        assert!(state.player.y > 0.0);

        // Airtime is 2 * v / g ≈ 0.73s
        let report = run_frames(&mut state, &TickInput::default(), 60);
        assert!(report.landed);
        assert_eq!(state.player.mode, ActionMode::Running);
        assert_eq!(state.player.y, 0.0);
        assert_eq!(state.player.vy, 0.0);
    }

    #[test]
    fn test_double_jump_once_per_cycle() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        state.effects.double_jump_unlocked = true;

        step(&mut state, &jump(), &tuning, SIM_DT);
        let second = step(&mut state, &jump(), &tuning, SIM_DT);
        assert!(second.double_jumped);
        assert!(state.player.double_jump_used);
        assert!((state.player.vy - (DOUBLE_JUMP_VELOCITY - GRAVITY * SIM_DT)).abs() < 1e-4);

        let third = step(&mut state, &jump(), &tuning, SIM_DT);
        assert!(!third.double_jumped);
        assert!(!third.acted);

        run_frames(&mut state, &TickInput::default(), 120);
        assert_eq!(state.player.mode, ActionMode::Running);
        assert!(!state.player.double_jump_used);
    }

    #[test]
    fn test_double_jump_locked() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        step(&mut state, &jump(), &tuning, SIM_DT);
        let second = step(&mut state, &jump(), &tuning, SIM_DT);
        assert!(!second.double_jumped);
        assert!(!state.player.double_jump_used);
    }

    #[test]
    fn test_slide_expires_to_running() {
        let mut state = GameState::new(1);
        let slide = TickInput {
            slide: true,
            ..Default::default()
        };
        run_frames(&mut state, &slide, 1);
        assert_eq!(state.player.mode, ActionMode::Sliding);
        run_frames(&mut state, &TickInput::default(), 60);
        assert_eq!(state.player.mode, ActionMode::Running);
    }

    #[test]
    fn test_slide_held_extends() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        let held = TickInput {
            slide: true,
            slide_held: true,
            ..Default::default()
        };
        for _ in 0..120 {
            step(&mut state, &held, &tuning, SIM_DT);
        }
        assert_eq!(state.player.mode, ActionMode::Sliding);
    }

    #[test]
    fn test_mid_air_slide_fast_falls() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        run_frames(&mut state, &jump(), 10);
        assert!(state.player.y > 1.0);
        let slide = TickInput {
            slide: true,
            ..Default::default()
        };
        step(&mut state, &slide, &tuning, SIM_DT);
        assert_eq!(state.player.mode, ActionMode::Sliding);
        assert!(state.player.vy <= -FAST_FALL_VELOCITY);

        run_frames(&mut state, &TickInput::default(), 10);
        assert_eq!(state.player.y, 0.0);
    }

    #[test]
    fn test_lane_move_clamped() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        let left = TickInput {
            lane_move: Some(-1),
            ..Default::default()
        };
        assert!(step(&mut state, &left, &tuning, SIM_DT).lane_changed);
        assert_eq!(state.player.lane, MIN_LANE);
        let report = step(&mut state, &left, &tuning, SIM_DT);
        assert!(!report.lane_changed && !report.acted);
        assert_eq!(state.player.lane, MIN_LANE);
    }

    #[test]
    fn test_wall_run_timeout_kicks_upward() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        // Long wall spanning the player, runnable between 0.5m and 4m
        state.spawn_wall(-5.0, 200.0, 0.5, 4.0, WallSide::Right);
        state.player.lane = MAX_LANE;

        step(&mut state, &jump(), &tuning, SIM_DT);
        let mut started = None;
        for _ in 0..60 {
            let report = step(&mut state, &TickInput::default(), &tuning, SIM_DT);
            if report.wall_run_started.is_some() {
                started = report.wall_run_started;
                break;
            }
        }
        assert!(started.is_some(), "falling onto the wall should start a wall run");
        assert_eq!(state.player.mode, ActionMode::WallRunning);
        assert_eq!(state.player.wall_side, Some(WallSide::Right));
        let wall_height = state.player.y;

        // Gravity is suspended while on the wall
        step(&mut state, &TickInput::default(), &tuning, SIM_DT);
        assert_eq!(state.player.y, wall_height);

        let mut ended = false;
        for _ in 0..((WALL_RUN_MAX / SIM_DT) as usize + 2) {
            let report = step(&mut state, &TickInput::default(), &tuning, SIM_DT);
            if report.wall_run_ended {
                ended = true;
                break;
            }
        }
        assert!(ended);
        assert_eq!(state.player.mode, ActionMode::Jumping);
        assert!(state.player.vy > 0.0);
        assert!(state.player.wall_id.is_none());
        assert_eq!(state.player.last_wall, started);
    }

    #[test]
    fn test_one_wall_run_per_wall_per_airborne_cycle() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        // Long enough to stay beside the player for the whole test
        let wall = state.spawn_wall(-5.0, 200.0, 0.5, 4.0, WallSide::Left);
        state.player.lane = MIN_LANE;

        step(&mut state, &jump(), &tuning, SIM_DT);
        let mut starts = 0;
        let mut landed = false;
        let mut wall_time = 0.0;
        for _ in 0..600 {
            let report = step(&mut state, &TickInput::default(), &tuning, SIM_DT);
            if report.wall_run_started == Some(wall) {
                starts += 1;
            }
            if state.player.mode == ActionMode::WallRunning {
                wall_time += SIM_DT;
            }
            if report.landed {
                landed = true;
                break;
            }
        }
        assert_eq!(starts, 1);
        assert!(landed, "the kick off a timed-out wall must end on the ground");
        assert!(wall_time <= WALL_RUN_MAX + 3.0 * SIM_DT);
        assert!(state.player.last_wall.is_none());

        // A fresh jump may use the same wall again
        step(&mut state, &jump(), &tuning, SIM_DT);
        let report = run_frames(&mut state, &TickInput::default(), 60);
        assert_eq!(report.wall_run_started, Some(wall));
    }

    #[test]
    fn test_far_lane_cannot_reach_wall() {
        let tuning = PhysicsTuning::default();
        for lane in [MAX_LANE, 0] {
            let mut state = GameState::new(1);
            state.spawn_wall(-5.0, 200.0, 0.5, 4.0, WallSide::Left);
            state.player.lane = lane;

            step(&mut state, &jump(), &tuning, SIM_DT);
            let report = run_frames(&mut state, &TickInput::default(), 60);
            assert!(report.wall_run_started.is_none());
            assert!(report.landed);
            assert_ne!(state.player.mode, ActionMode::WallRunning);
        }
    }

    #[test]
    fn test_wall_run_ends_on_lost_contact() {
        let tuning = PhysicsTuning::default();
        let mut state = GameState::new(1);
        let wall = state.spawn_wall(-1.0, 2.0, 0.5, 4.0, WallSide::Left);
        state.player.mode = ActionMode::WallRunning;
        state.player.lane = MIN_LANE;
        state.player.wall_id = Some(wall);
        state.player.y = 2.0;

        // The short wall scrolls past within a few frames
        let report = run_frames(&mut state, &TickInput::default(), 10);
        assert!(report.wall_run_ended);
        assert_eq!(state.player.mode, ActionMode::Jumping);
    }

    #[test]
    fn test_gravity_scale_changes_apex() {
        use crate::sim::state::GravityModifier;
        let tuning = PhysicsTuning::default();

        let apex = |scale: f32| {
            let mut state = GameState::new(1);
            state.effects.gravity = Some(GravityModifier {
                scale,
                remaining: 10.0,
            });
            step(&mut state, &jump(), &tuning, SIM_DT);
            let mut max_y: f32 = 0.0;
            for _ in 0..240 {
                step(&mut state, &TickInput::default(), &tuning, SIM_DT);
                max_y = max_y.max(state.player.y);
            }
            max_y
        };
        assert!(apex(0.5) > apex(1.0) * 1.5);
    }

    #[test]
    fn test_project_pose() {
        let tuning = PhysicsTuning::default();
        let mut player = PlayerState::default();
        let pose = project_pose(&player, 1.0, &tuning, 0.3).unwrap();
        assert_eq!(pose.y, 0.0);
        assert_eq!(pose.mode, ActionMode::Running);

        player.mode = ActionMode::Jumping;
        player.vy = JUMP_VELOCITY;
        let pose = project_pose(&player, 1.0, &tuning, 0.2).unwrap();
        let expected = JUMP_VELOCITY * 0.2 - 0.5 * GRAVITY * 0.04;
        assert!((pose.y - expected).abs() < 1e-4);

        // Landed long before
        let pose = project_pose(&player, 1.0, &tuning, 5.0).unwrap();
        assert_eq!(pose.mode, ActionMode::Running);

        assert!(project_pose(&player, 1.0, &tuning, -1.0).is_none());
        assert!(project_pose(&player, 1.0, &tuning, f32::NAN).is_none());
        player.vy = f32::NAN;
        assert!(project_pose(&player, 1.0, &tuning, 0.1).is_none());
    }

    #[test]
    fn test_world_advects() {
        use crate::sim::state::ObstacleKind;
        let mut state = GameState::new(1);
        let id = state.spawn_obstacle(20.0, 0, ObstacleKind::Hurdle { height: 1.0 });
        run_frames(&mut state, &TickInput::default(), 60);
        let x = state.obstacle(id).unwrap().x;
        assert!(x < 20.0 - BASE_SPEED * 0.9);
        assert!(state.distance > BASE_SPEED * 0.9);
        assert!(state.speed > BASE_SPEED);
    }
}
