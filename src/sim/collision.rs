//! Obstacle contact detection and avoidance rules
//!
//! Physics only reports overlaps. This is the failure path: it decides
//! whether an overlap was handled by the player's action, absorbed by a
//! shield, or ends the run.

use super::state::{ActionMode, ActiveEffects, Avoidance, GameState, ObstacleKind};

/// An overlap between the player and an obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub obstacle_id: u32,
    pub kind: ObstacleKind,
    pub mode: ActionMode,
    /// Player feet height at contact time
    pub feet_y: f32,
}

/// Result of resolving a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The player's action avoids this obstacle
    Handled,
    /// Shield took the hit and is gone
    ShieldAbsorbed,
    /// No avoidance path: the run ends
    Fatal,
}

/// Every obstacle whose box overlaps the player's box this frame
pub fn detect_contacts(state: &GameState) -> Vec<Contact> {
    let player = &state.player;
    let hitbox = player.hitbox();
    state
        .obstacles
        .iter()
        .filter(|o| hitbox.overlaps(&o.hitbox()))
        .map(|o| Contact {
            obstacle_id: o.id,
            kind: o.kind,
            mode: player.mode,
            feet_y: player.y,
        })
        .collect()
}

/// Whether the action at contact time counts as avoiding the obstacle
///
/// Only jumpable obstacles forgive an overlap: clipping the top edge of a
/// hurdle with the feet above its vault height is a vault. A duckable
/// obstacle is only avoided by a slide that clears it, so any overlap means
/// the slide did not.
pub fn is_handled(contact: &Contact) -> bool {
    match contact.kind.avoidance() {
        Avoidance::Jump => contact
            .kind
            .vault_height()
            .is_some_and(|vault| contact.feet_y >= vault),
        Avoidance::Duck | Avoidance::LaneChange => false,
    }
}

/// Apply avoidance rules, consuming the shield on an otherwise fatal hit
pub fn resolve(contact: &Contact, effects: &mut ActiveEffects) -> Outcome {
    if is_handled(contact) {
        Outcome::Handled
    } else if effects.shield_active {
        effects.shield_active = false;
        Outcome::ShieldAbsorbed
    } else {
        Outcome::Fatal
    }
}
