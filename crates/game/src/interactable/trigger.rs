//! Trigger volumes that run console commands when a character steps in.

use cragmoor_physics::{
    BodyBuilder, BodyType, CategoryBits, FixtureBuilder, FixtureTag, PhysicsWorld,
    RigidBodyHandle,
};
use glam::Vec2;
use tracing::{debug, warn};

use super::{InteractContext, Interactable, Interaction};
use crate::actor::destroy_body;
use crate::state_store::InteractableStateStore;

#[derive(Debug, Clone)]
pub struct Trigger {
    /// Position within the map's Trigger layer.
    index: u32,
    commands: Vec<String>,
    once_only: bool,
    player_only: bool,
    has_triggered: bool,
    hint_visible: bool,
    body: Option<RigidBodyHandle>,
}

impl Trigger {
    pub fn new(index: u32, commands: Vec<String>, once_only: bool, player_only: bool) -> Self {
        Self {
            index,
            commands,
            once_only,
            player_only,
            has_triggered: false,
            hint_visible: false,
            body: None,
        }
    }

    /// Pick up the fired flag recorded for this trigger on an earlier visit.
    pub fn restore(&mut self, map_id: &str, states: &InteractableStateStore) {
        if self.once_only && states.trigger_fired(map_id, self.index) {
            self.has_triggered = true;
        }
    }

    /// Record the fired flag so a revisit does not fire the trigger again.
    pub fn save(&self, map_id: &str, states: &mut InteractableStateStore) {
        if self.once_only {
            states.set_trigger_fired(map_id, self.index, self.has_triggered);
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_once_only(&self) -> bool {
        self.once_only
    }

    pub fn is_player_only(&self) -> bool {
        self.player_only
    }

    pub fn has_triggered(&self) -> bool {
        self.has_triggered
    }

    pub fn body(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    /// Build the sensor volume centered on `center` (world pixels).
    pub fn show(&mut self, world: &mut PhysicsWorld, center: Vec2, half_extents: Vec2) {
        if self.body.is_some() {
            return;
        }
        let ppm = world.pixels_per_meter();
        let body = BodyBuilder::new()
            .body_type(BodyType::Fixed)
            .position(center.x, center.y, ppm)
            .build_body(world);
        FixtureBuilder::rectangle(half_extents.x, half_extents.y, ppm)
            .category_bits(CategoryBits::INTERACTABLE)
            .mask_bits(CategoryBits::FEET)
            .sensor(true)
            .user_data(FixtureTag::Trigger(self.index))
            .build_fixture(world, body);
        self.body = Some(body);
    }

    pub fn remove(&mut self, world: &mut PhysicsWorld) {
        destroy_body(world, &mut self.body);
    }
}

impl Interactable for Trigger {
    fn on_interact(&mut self, ctx: &mut InteractContext<'_>) -> Interaction {
        if self.player_only && !ctx.user.is_player {
            return Interaction::Nothing;
        }
        if self.once_only && self.has_triggered {
            warn!(map = ctx.map_id, trigger = self.index, "once-only trigger already fired");
            return Interaction::Nothing;
        }

        self.has_triggered = true;
        self.save(ctx.map_id, ctx.states);
        debug!(map = ctx.map_id, trigger = self.index, user = %ctx.user.id, "trigger fired");
        Interaction::RunCommands(self.commands.clone())
    }

    fn will_interact_on_contact(&self) -> bool {
        true
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

    fn player() -> Interactor {
        Interactor {
            id: ActorId::new(0, 0),
            is_player: true,
            keys: Vec::new(),
        }
    }

    #[test]
    fn test_once_only_trigger_fires_once() {
        let mut trigger = Trigger::new(0, vec!["message(\"hi\")".to_string()], true, false);
        let mut states = InteractableStateStore::new();
        let user = player();
        let mut ctx = InteractContext {
            map_id: "town.json",
            states: &mut states,
            user: &user,
            position: None,
        };

        assert_eq!(
            trigger.on_interact(&mut ctx),
            Interaction::RunCommands(vec!["message(\"hi\")".to_string()])
        );
        assert_eq!(trigger.on_interact(&mut ctx), Interaction::Nothing);
        assert!(states.trigger_fired("town.json", 0));
    }

    #[test]
    fn test_repeatable_trigger_fires_every_time() {
        let mut trigger = Trigger::new(1, vec!["message(\"x\")".to_string()], false, false);
        let mut states = InteractableStateStore::new();
        let user = player();
        let mut ctx = InteractContext {
            map_id: "town.json",
            states: &mut states,
            user: &user,
            position: None,
        };
        for _ in 0..3 {
            assert!(matches!(
                trigger.on_interact(&mut ctx),
                Interaction::RunCommands(_)
            ));
        }
        assert!(states.is_empty());
    }

    #[test]
    fn test_player_only_trigger_ignores_others() {
        let mut trigger = Trigger::new(0, vec!["message(\"x\")".to_string()], true, true);
        let mut states = InteractableStateStore::new();
        let enemy = Interactor {
            is_player: false,
            ..player()
        };
        let mut ctx = InteractContext {
            map_id: "town.json",
            states: &mut states,
            user: &enemy,
            position: None,
        };
        assert_eq!(trigger.on_interact(&mut ctx), Interaction::Nothing);
        assert!(!trigger.has_triggered());
    }

    #[test]
    fn test_fired_state_survives_rebuild() {
        let mut states = InteractableStateStore::new();
        states.set_trigger_fired("town.json", 2, true);

        let mut trigger = Trigger::new(2, Vec::new(), true, false);
        trigger.restore("town.json", &states);
        assert!(trigger.has_triggered());

        let mut elsewhere = Trigger::new(2, Vec::new(), true, false);
        elsewhere.restore("cave.json", &states);
        assert!(!elsewhere.has_triggered());
    }

    #[test]
    fn test_show_builds_sensor() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, 100.0);
        let mut trigger = Trigger::new(4, Vec::new(), false, false);
        trigger.show(&mut world, Vec2::new(100.0, 100.0), Vec2::new(8.0, 8.0));
        let fixtures = world.fixtures(trigger.body().unwrap());
        assert_eq!(fixtures[0].tag, Some(FixtureTag::Trigger(4)));
        assert!(fixtures[0].sensor);

        trigger.remove(&mut world);
        assert_eq!(world.body_count(), 0);
    }
}
