//! Portals leading to other maps.
//!
//! The lock state is the one piece of a portal that persists: it is read from
//! the [`InteractableStateStore`] when the portal is built and written back
//! whenever it changes and when the map is torn down.

use cragmoor_physics::{
    BodyBuilder, BodyType, CategoryBits, FixtureBuilder, FixtureTag, PhysicsWorld,
    RigidBodyHandle,
};
use glam::Vec2;
use tracing::info;

use super::{InteractContext, Interactable, Interaction};
use crate::actor::destroy_body;
use crate::state_store::InteractableStateStore;

#[derive(Debug, Clone)]
pub struct Portal {
    /// Position within the map's Portal layer.
    index: u32,
    target_map: String,
    target_portal: u32,
    interact_on_contact: bool,
    locked: bool,
    /// Name of the key item that unlocks the portal.
    key: Option<String>,
    /// Center in world pixels, also where arriving characters appear.
    position: Vec2,
    hint_visible: bool,
    body: Option<RigidBodyHandle>,
}

impl Portal {
    pub fn new(
        index: u32,
        target_map: impl Into<String>,
        target_portal: u32,
        interact_on_contact: bool,
        locked: bool,
        key: Option<String>,
        position: Vec2,
    ) -> Self {
        Self {
            index,
            target_map: target_map.into(),
            target_portal,
            interact_on_contact,
            locked,
            key,
            position,
            hint_visible: false,
            body: None,
        }
    }

    /// Take the lock state recorded in the store. With nothing recorded yet,
    /// the authored state is kept and written to the store instead.
    pub fn restore(&mut self, map_id: &str, states: &mut InteractableStateStore) {
        match states.portal_locked(map_id, self.index) {
            Some(locked) => self.locked = locked,
            None => self.save(map_id, states),
        }
    }

    pub fn save(&self, map_id: &str, states: &mut InteractableStateStore) {
        states.set_portal_locked(map_id, self.index, self.locked);
    }

    pub fn lock(&mut self, map_id: &str, states: &mut InteractableStateStore) {
        self.locked = true;
        self.save(map_id, states);
    }

    pub fn unlock(&mut self, map_id: &str, states: &mut InteractableStateStore) {
        self.locked = false;
        self.save(map_id, states);
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn target_map(&self) -> &str {
        &self.target_map
    }

    pub fn target_portal(&self) -> u32 {
        self.target_portal
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn body(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    /// Build the sensor volume around the portal position.
    pub fn show(&mut self, world: &mut PhysicsWorld, half_extents: Vec2) {
        if self.body.is_some() {
            return;
        }
        let ppm = world.pixels_per_meter();
        let body = BodyBuilder::new()
            .body_type(BodyType::Fixed)
            .position(self.position.x, self.position.y, ppm)
            .build_body(world);
        FixtureBuilder::rectangle(half_extents.x, half_extents.y, ppm)
            .category_bits(CategoryBits::PORTAL)
            .mask_bits(CategoryBits::FEET)
            .sensor(true)
            .user_data(FixtureTag::Portal(self.index))
            .build_fixture(world, body);
        self.body = Some(body);
    }

    pub fn remove(&mut self, world: &mut PhysicsWorld) {
        destroy_body(world, &mut self.body);
        self.hint_visible = false;
    }
}

impl Interactable for Portal {
    fn on_interact(&mut self, ctx: &mut InteractContext<'_>) -> Interaction {
        if !ctx.user.is_player {
            return Interaction::Nothing;
        }
        if self.locked {
            let has_key = self.key.as_deref().is_some_and(|key| ctx.user.has_key(key));
            if !has_key {
                info!(map = ctx.map_id, portal = self.index, "portal is locked");
                return Interaction::PortalLocked { portal: self.index };
            }
            info!(map = ctx.map_id, portal = self.index, "portal unlocked with key");
            self.unlock(ctx.map_id, ctx.states);
        }
        Interaction::Transition {
            target_map: self.target_map.clone(),
            target_portal: self.target_portal,
        }
    }

    fn will_interact_on_contact(&self) -> bool {
        self.interact_on_contact
    }

    fn show_hint_ui(&mut self) {
        self.hint_visible = true;
    }

    fn hide_hint_ui(&mut self) {
        self.hint_visible = false;
    }

    fn is_hint_visible(&self) -> bool {
        self.hint_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactable::Interactor;
    use cragmoor_physics::ActorId;

    fn locked_door() -> Portal {
        Portal::new(
            0,
            "maps/cave.json",
            1,
            false,
            true,
            Some("Rusty Key".to_string()),
            Vec2::new(40.0, 16.0),
        )
    }

    fn user(keys: &[&str]) -> Interactor {
        Interactor {
            id: ActorId::new(0, 0),
            is_player: true,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_authored_state_written_when_store_is_empty() {
        let mut states = InteractableStateStore::new();
        let mut portal = locked_door();
        portal.restore("town.json", &mut states);
        assert!(portal.is_locked());
        assert_eq!(states.portal_locked("town.json", 0), Some(true));
    }

    #[test]
    fn test_stored_state_wins_over_authored() {
        let mut states = InteractableStateStore::new();
        states.set_portal_locked("town.json", 0, false);
        let mut portal = locked_door();
        portal.restore("town.json", &mut states);
        assert!(!portal.is_locked());
    }

    #[test]
    fn test_locked_without_key() {
        let mut states = InteractableStateStore::new();
        let mut portal = locked_door();
        let user = user(&[]);
        let mut ctx = InteractContext {
            map_id: "town.json",
            states: &mut states,
            user: &user,
            position: None,
        };
        assert_eq!(
            portal.on_interact(&mut ctx),
            Interaction::PortalLocked { portal: 0 }
        );
        assert!(portal.is_locked());
    }

    #[test]
    fn test_key_unlocks_and_persists() {
        let mut states = InteractableStateStore::new();
        let mut portal = locked_door();
        let user = user(&["Rusty Key"]);
        let mut ctx = InteractContext {
            map_id: "town.json",
            states: &mut states,
            user: &user,
            position: None,
        };
        assert_eq!(
            portal.on_interact(&mut ctx),
            Interaction::Transition {
                target_map: "maps/cave.json".to_string(),
                target_portal: 1,
            }
        );
        assert!(!portal.is_locked());
        assert_eq!(states.portal_locked("town.json", 0), Some(false));
    }

    #[test]
    fn test_non_player_cannot_use_portal() {
        let mut states = InteractableStateStore::new();
        let mut portal = locked_door();
        portal.unlock("town.json", &mut states);
        let enemy = Interactor {
            is_player: false,
            ..user(&[])
        };
        let mut ctx = InteractContext {
            map_id: "town.json",
            states: &mut states,
            user: &enemy,
            position: None,
        };
        assert_eq!(portal.on_interact(&mut ctx), Interaction::Nothing);
    }
}
