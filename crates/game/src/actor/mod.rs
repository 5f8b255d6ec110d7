//! Dynamic actors: everything with a physical presence that can be shown on
//! or removed from a map independently of the map's own lifecycle.
//!
//! Actors are owned by an [`ActorRegistry`](crate::registry::ActorRegistry)
//! while shown and by whoever removed them otherwise. The physics world only
//! ever holds their bodies; fixtures point back at the actor through
//! [`FixtureTag::Actor`](cragmoor_physics::FixtureTag::Actor).

/// Implements the `Any` conversions of [`DynamicActor`] for a concrete type.
macro_rules! actor_any {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn ::std::any::Any> {
            self
        }
    };
}

mod character;
mod chest;
mod item;

pub use character::{Character, Enemy, InventoryEntry, Npc, Player};
pub use chest::Chest;
pub use item::{Item, ItemKind, ItemProfile};

use std::any::Any;

use cragmoor_physics::{ActorId, PhysicsWorld, RigidBodyHandle};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::interactable::Interactable;

/// What kind of actor an entry in the registry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Player,
    Enemy,
    Npc,
    Item,
    Chest,
}

/// An entity that can be shown on a map and removed from it again.
pub trait DynamicActor: Any {
    fn kind(&self) -> ActorKind;

    fn name(&self) -> &str;

    /// Body in the physics world while shown.
    fn body(&self) -> Option<RigidBodyHandle>;

    fn is_shown(&self) -> bool {
        self.body().is_some()
    }

    /// Build the actor's body at (`x`, `y`) world pixels, tagging every
    /// fixture with `id`. Returns `false` without touching the world if the
    /// actor is already shown.
    fn show_on_map(&mut self, world: &mut PhysicsWorld, id: ActorId, x: f32, y: f32) -> bool;

    /// Destroy the body and forget it. No-op when not shown.
    fn remove_from_map(&mut self, world: &mut PhysicsWorld);

    /// Current position in world pixels.
    fn position(&self, world: &PhysicsWorld) -> Option<Vec2> {
        world.body_position_px(self.body()?)
    }

    fn as_character(&self) -> Option<&Character> {
        None
    }

    fn as_character_mut(&mut self) -> Option<&mut Character> {
        None
    }

    fn as_interactable_mut(&mut self) -> Option<&mut dyn Interactable> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Take a body handle out of its slot and destroy it.
pub(crate) fn destroy_body(world: &mut PhysicsWorld, body: &mut Option<RigidBodyHandle>) {
    if let Some(handle) = body.take() {
        world.remove_body(handle);
    }
}
