//! Registry of the dynamic actors currently shown on a map.
//!
//! Actors are stored in generational slots. An [`ActorId`] handed out by
//! [`ActorRegistry::show`] stays valid until the actor is removed; after that
//! the slot's generation moves on and the old id resolves to nothing, even if
//! the slot is reused.

use cragmoor_physics::{ActorId, PhysicsWorld};
use tracing::{debug, warn};

use crate::actor::{ActorKind, DynamicActor};

/// Change to the set of shown actors, for an external scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneChange {
    Attached { id: ActorId, kind: ActorKind },
    Detached { id: ActorId },
}

#[derive(Default)]
struct Slot {
    generation: u32,
    actor: Option<Box<dyn DynamicActor>>,
}

/// Owns every shown actor of one map.
#[derive(Default)]
pub struct ActorRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    changes: Vec<SceneChange>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `actor` at (`x`, `y`) world pixels and take ownership of it.
    ///
    /// An actor that is already shown somewhere is rejected and dropped.
    pub fn show<T: DynamicActor>(
        &mut self,
        world: &mut PhysicsWorld,
        actor: Box<T>,
        x: f32,
        y: f32,
    ) -> Option<ActorId> {
        self.show_dyn(world, actor, x, y)
    }

    /// [`ActorRegistry::show`] for an already boxed trait object.
    pub fn show_dyn(
        &mut self,
        world: &mut PhysicsWorld,
        mut actor: Box<dyn DynamicActor>,
        x: f32,
        y: f32,
    ) -> Option<ActorId> {
        if actor.is_shown() {
            warn!(name = actor.name(), "actor is already shown");
            return None;
        }

        let id = self.allocate();
        if !actor.show_on_map(world, id, x, y) {
            warn!(name = actor.name(), %id, "actor refused to be shown");
            self.release(id);
            return None;
        }

        let kind = actor.kind();
        debug!(name = actor.name(), ?kind, %id, "actor attached");
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            slot.actor = Some(actor);
        }
        self.changes.push(SceneChange::Attached { id, kind });
        Some(id)
    }

    /// Remove the actor `id` if it is a `T`, returning ownership of it.
    ///
    /// Unknown ids and type mismatches are logged and leave the registry
    /// untouched.
    pub fn remove<T: DynamicActor>(
        &mut self,
        world: &mut PhysicsWorld,
        id: ActorId,
    ) -> Option<Box<T>> {
        let actor = self.get(id).or_else(|| {
            warn!(%id, "cannot remove unknown actor");
            None
        })?;
        if !actor.as_any().is::<T>() {
            warn!(
                %id,
                name = actor.name(),
                expected = std::any::type_name::<T>(),
                "actor has a different type"
            );
            return None;
        }

        self.remove_dyn(world, id)?.into_any().downcast::<T>().ok()
    }

    /// Remove the actor `id` whatever its type.
    pub fn remove_dyn(
        &mut self,
        world: &mut PhysicsWorld,
        id: ActorId,
    ) -> Option<Box<dyn DynamicActor>> {
        let Some(mut actor) = self.slot_mut(id).and_then(|slot| slot.actor.take()) else {
            warn!(%id, "cannot remove unknown actor");
            return None;
        };
        self.release(id);

        actor.remove_from_map(world);
        debug!(name = actor.name(), %id, "actor detached");
        self.changes.push(SceneChange::Detached { id });
        Some(actor)
    }

    /// Remove every actor. Returns how many were removed.
    pub fn remove_all(&mut self, world: &mut PhysicsWorld) -> usize {
        self.ids()
            .into_iter()
            .filter_map(|id| self.remove_dyn(world, id))
            .count()
    }

    pub fn get(&self, id: ActorId) -> Option<&dyn DynamicActor> {
        match self.slots.get(id.index as usize) {
            Some(Slot {
                generation,
                actor: Some(actor),
            }) if *generation == id.generation => Some(&**actor),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut dyn DynamicActor> {
        match self.slot_mut(id) {
            Some(Slot {
                actor: Some(actor), ..
            }) => Some(&mut **actor),
            _ => None,
        }
    }

    /// Typed view of the actor `id`.
    pub fn get_as<T: DynamicActor>(&self, id: ActorId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_as_mut<T: DynamicActor>(&mut self, id: ActorId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.get(id).is_some()
    }

    /// Ids of every shown actor, in slot order.
    pub fn ids(&self) -> Vec<ActorId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.actor.is_some())
            .map(|(index, slot)| ActorId::new(index as u32, slot.generation))
            .collect()
    }

    /// Ids of every shown actor of one kind.
    pub fn ids_of(&self, kind: ActorKind) -> Vec<ActorId> {
        self.ids()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(|a| a.kind() == kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.actor.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the scene changes recorded since the last drain.
    pub fn drain_changes(&mut self) -> Vec<SceneChange> {
        std::mem::take(&mut self.changes)
    }

    fn slot_mut(&mut self, id: ActorId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    fn allocate(&mut self) -> ActorId {
        match self.free.pop() {
            Some(index) => {
                let generation = self.slots[index as usize].generation;
                ActorId::new(index, generation)
            }
            None => {
                self.slots.push(Slot::default());
                ActorId::new(self.slots.len() as u32 - 1, 0)
            }
        }
    }

    /// Retire `id`: bump the slot's generation and make it reusable.
    fn release(&mut self, id: ActorId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("actors", &self.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}
