//! Cragmoor Game
//!
//! Map lifecycle core of a 2D side-scrolling action RPG:
//!
//! - **Maps**: [`GameMap`] turns a Tiled JSON level into static geometry,
//!   portals, triggers and actors, and tears them down again
//! - **Actors**: [`ActorRegistry`] owns every dynamic actor of a map and
//!   hands out generational [`ActorId`]s
//! - **Interactables**: portals, triggers, chests and NPCs implement
//!   [`Interactable`]; flags that outlive a map go to the
//!   [`InteractableStateStore`]
//! - **Contacts**: [`ContactResolver`] routes physics contacts to game logic
//! - **Manager**: [`MapManager`] owns the physics world, loads maps on a
//!   worker thread and guards deferred callbacks across transitions
//!
//! Coordinates are world pixels with the y axis pointing up.

pub mod actor;
pub mod callbacks;
pub mod config;
pub mod console;
pub mod contact;
pub mod error;
pub mod event;
pub mod interactable;
pub mod manager;
pub mod map;
pub mod registry;
pub mod source;
pub mod state_store;
pub mod tiled;

#[cfg(test)]
mod testing;

pub use actor::{ActorKind, Chest, DynamicActor, Enemy, Item, ItemKind, ItemProfile, Npc, Player};
pub use config::ManagerConfig;
pub use contact::ContactResolver;
pub use error::{AssetError, CommandError, ItemError, MapError, StateStoreError};
pub use event::GameEvent;
pub use interactable::{Interactable, Interaction, Portal, Trigger};
pub use manager::MapManager;
pub use map::{GameMap, MapState, StagedMap};
pub use registry::{ActorRegistry, SceneChange};
pub use source::{AssetSource, DirSource, MemorySource};
pub use state_store::InteractableStateStore;

pub use cragmoor_physics::{ActorId, CategoryBits, FixtureTag, PhysicsWorld};
