//! Chests: interactable props holding item descriptors.

use cragmoor_physics::{
    ActorId, BodyBuilder, BodyType, CategoryBits, FixtureBuilder, FixtureTag, PhysicsWorld,
    RigidBodyHandle,
};
use tracing::{debug, warn};

use super::{destroy_body, ActorKind, DynamicActor};
use crate::interactable::{InteractContext, Interactable, Interaction};

const HALF_WIDTH: f32 = 12.0;
const HALF_HEIGHT: f32 = 8.0;

/// A chest that spills its items the first time it is opened.
#[derive(Debug, Clone)]
pub struct Chest {
    /// Item descriptor ids.
    items: Vec<String>,
    opened: bool,
    hint_visible: bool,
    body: Option<RigidBodyHandle>,
}

impl Chest {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            opened: false,
            hint_visible: false,
            body: None,
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }
}

impl DynamicActor for Chest {
    fn kind(&self) -> ActorKind {
        ActorKind::Chest
    }

    fn name(&self) -> &str {
        "Chest"
    }

    fn body(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    fn show_on_map(&mut self, world: &mut PhysicsWorld, id: ActorId, x: f32, y: f32) -> bool {
        if self.body.is_some() {
            return false;
        }
        let ppm = world.pixels_per_meter();
        let body = BodyBuilder::new()
            .body_type(BodyType::Dynamic)
            .position(x, y, ppm)
            .fixed_rotation(true)
            .build_body(world);

        FixtureBuilder::rectangle(HALF_WIDTH, HALF_HEIGHT, ppm)
            .category_bits(CategoryBits::INTERACTABLE)
            .mask_bits(CategoryBits::MASK_TERRAIN)
            .user_data(FixtureTag::Actor(id))
            .build_fixture(world, body);
        FixtureBuilder::rectangle(HALF_WIDTH, HALF_HEIGHT, ppm)
            .category_bits(CategoryBits::INTERACTABLE)
            .mask_bits(CategoryBits::FEET)
            .sensor(true)
            .user_data(FixtureTag::Actor(id))
            .build_fixture(world, body);

        debug!(%id, items = self.items.len(), x, y, "chest shown");
        self.body = Some(body);
        true
    }

    fn remove_from_map(&mut self, world: &mut PhysicsWorld) {
        destroy_body(world, &mut self.body);
        self.hint_visible = false;
    }

    fn as_interactable_mut(&mut self) -> Option<&mut dyn Interactable> {
        Some(self)
    }

    actor_any!();
}

impl Interactable for Chest {
    fn on_interact(&mut self, ctx: &mut InteractContext<'_>) -> Interaction {
        if self.opened {
            warn!(map = ctx.map_id, "chest already opened");
            return Interaction::Nothing;
        }
        self.opened = true;
        self.hint_visible = false;

        let position = ctx.position.unwrap_or_default();
        Interaction::SpawnItems {
            descriptors: self.items.clone(),
            x: position.x,
            y: position.y,
        }
    }

    fn will_interact_on_contact(&self) -> bool {
        false
    }

    fn show_hint_ui(&mut self) {
        if !self.opened {
            self.hint_visible = true;
        }
    }

    fn hide_hint_ui(&mut self) {
        self.hint_visible = false;
    }

    fn is_hint_visible(&self) -> bool {
        self.hint_visible
    }
}
