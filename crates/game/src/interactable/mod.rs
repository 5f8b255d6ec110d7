//! Things a character can interact with: triggers, portals, chests and NPCs.
//!
//! Interacting never reaches into the manager directly. An interactable
//! updates its own state (and the [`InteractableStateStore`] when that state
//! must outlive the map) and returns an [`Interaction`] describing what the
//! manager should do next.

mod portal;
mod trigger;

pub use portal::Portal;
pub use trigger::Trigger;

use cragmoor_physics::ActorId;
use glam::Vec2;

use crate::actor::{DynamicActor, Player};
use crate::state_store::InteractableStateStore;

/// Outcome of an interaction, applied by the map manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Nothing,
    /// Run each command through the trigger console.
    RunCommands(Vec<String>),
    /// Switch maps, arriving at `target_portal` of `target_map`.
    Transition {
        target_map: String,
        target_portal: u32,
    },
    /// Create items from these descriptors at (`x`, `y`) world pixels.
    SpawnItems {
        descriptors: Vec<String>,
        x: f32,
        y: f32,
    },
    /// Ask the dialogue UI to open for this NPC.
    Dialogue { npc: ActorId },
    /// The portal is locked and the user has no key for it.
    PortalLocked { portal: u32 },
}

/// The character interacting.
#[derive(Debug, Clone, PartialEq)]
pub struct Interactor {
    pub id: ActorId,
    pub is_player: bool,
    /// Names of key items the character carries.
    pub keys: Vec<String>,
}

impl Interactor {
    pub fn of(id: ActorId, actor: &dyn DynamicActor) -> Self {
        let player = actor.as_any().downcast_ref::<Player>();
        Self {
            id,
            is_player: player.is_some(),
            keys: player.map(Player::keys).unwrap_or_default(),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// What an interactable gets to see while being interacted with.
pub struct InteractContext<'a> {
    /// Identifier of the map hosting the interactable.
    pub map_id: &'a str,
    pub states: &'a mut InteractableStateStore,
    pub user: &'a Interactor,
    /// Position of the interactable in world pixels, when it has a body.
    pub position: Option<Vec2>,
}

pub trait Interactable {
    fn on_interact(&mut self, ctx: &mut InteractContext<'_>) -> Interaction;

    /// Interact as soon as a character touches it, instead of waiting for an
    /// explicit interact action.
    fn will_interact_on_contact(&self) -> bool;

    fn show_hint_ui(&mut self);

    fn hide_hint_ui(&mut self);

    fn is_hint_visible(&self) -> bool;
}
