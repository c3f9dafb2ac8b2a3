//! Demo/idle mode: a simple bot that plays the run
//!
//! It reacts to the nearest threat in its lane with the action that kind of
//! obstacle calls for. Good enough for attract screens and soak tests, not
//! a perfect player.

use super::state::{ActionMode, GameState, Obstacle, ObstacleKind};
use super::tick::TickInput;
use crate::consts::*;

/// Seconds of warning before each response
const JUMP_LEAD: f32 = 0.2;
const SLIDE_LEAD: f32 = 0.3;
const DODGE_LEAD: f32 = 0.5;

/// Seconds until the obstacle's front edge reaches the player
fn time_to_contact(obstacle: &Obstacle, speed: f32) -> Option<f32> {
    let gap = obstacle.hitbox().min.x - PLAYER_WIDTH / 2.0;
    let ttc = gap / speed;
    (speed > 0.0 && ttc.is_finite()).then_some(ttc)
}

fn lane_blocked(state: &GameState, lane: i8, x: f32) -> bool {
    state.obstacles.iter().any(|o| {
        o.lane == lane
            && (o.x - x).abs() < OBSTACLE_DEPTH * 2.0
            && matches!(o.kind, ObstacleKind::Barricade { .. })
    })
}

/// Fill `input` with the bot's commands for this frame
pub fn drive(state: &GameState, input: &mut TickInput) {
    let player = &state.player;
    let threat = state
        .obstacles
        .iter()
        .filter(|o| o.lane == player.lane)
        .filter_map(|o| time_to_contact(o, state.speed).map(|t| (o, t)))
        .filter(|(_, t)| *t >= 0.0)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let Some((obstacle, ttc)) = threat else {
        return;
    };

    match obstacle.kind {
        ObstacleKind::Hurdle { .. } => {
            if ttc <= JUMP_LEAD && player.mode == ActionMode::Running {
                input.jump = true;
            }
        }
        ObstacleKind::Overhang { .. } => {
            if ttc <= SLIDE_LEAD && player.mode != ActionMode::Sliding {
                input.slide = true;
            }
        }
        ObstacleKind::Barricade { .. } => {
            if ttc <= DODGE_LEAD {
                // Prefer the lane towards the centre
                let options: [i8; 2] = if player.lane > 0 { [-1, 1] } else { [1, -1] };
                input.lane_move = options.into_iter().find(|&delta| {
                    let lane = player.lane + delta;
                    (MIN_LANE..=MAX_LANE).contains(&lane) && !lane_blocked(state, lane, obstacle.x)
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jumps_hurdle_in_time() {
        let mut state = GameState::new(1);
        state.spawn_obstacle(0.3 + 1.5 + 0.5, 0, ObstacleKind::Hurdle { height: 0.8 });
        let mut input = TickInput::default();
        drive(&state, &mut input);
        assert!(input.jump);
    }

    #[test]
    fn test_waits_until_close() {
        let mut state = GameState::new(1);
        state.spawn_obstacle(20.0, 0, ObstacleKind::Hurdle { height: 0.8 });
        let mut input = TickInput::default();
        drive(&state, &mut input);
        assert!(!input.jump && !input.slide && input.lane_move.is_none());
    }

    #[test]
    fn test_dodges_barricade_to_free_lane() {
        let mut state = GameState::new(1);
        state.spawn_obstacle(3.0, 0, ObstacleKind::Barricade { height: 2.5 });
        state.spawn_obstacle(3.0, 1, ObstacleKind::Barricade { height: 2.5 });
        let mut input = TickInput::default();
        drive(&state, &mut input);
        assert_eq!(input.lane_move, Some(-1));
    }

    #[test]
    fn test_slides_under_overhang() {
        let mut state = GameState::new(1);
        state.spawn_obstacle(2.5, 0, ObstacleKind::Overhang { clearance: 1.1 });
        let mut input = TickInput::default();
        drive(&state, &mut input);
        assert!(input.slide);
    }
}
