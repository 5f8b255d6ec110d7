//! Characters: the player, enemies and NPCs.
//!
//! All three share a [`Character`] body made of three fixtures:
//!
//! ```text
//!        ┌─────┐ ┌───────────┐
//!        │     │ │  weapon   │  sensor, MELEE_WEAPON (player and enemies)
//!        │body │ └───────────┘
//!        │     │                solid, PLAYER / ENEMY / NPC
//!        └─────┘
//!       [ feet  ]               sensor, FEET
//! ```
//!
//! Contact bookkeeping (ground count, targets in range, interactables and
//! items underfoot) lives on the character and is updated by the contact
//! resolver.

use cragmoor_physics::{
    ActorId, BodyBuilder, BodyType, CategoryBits, FixtureBuilder, FixtureTag, PhysicsWorld,
    RigidBodyHandle,
};
use glam::Vec2;
use tracing::debug;

use super::{destroy_body, ActorKind, DynamicActor, ItemKind, ItemProfile};
use crate::interactable::{InteractContext, Interactable, Interaction};

const HALF_WIDTH: f32 = 8.0;
const HALF_HEIGHT: f32 = 16.0;
const FEET_HALF_HEIGHT: f32 = 2.0;
const WEAPON_REACH: f32 = 16.0;
/// Half width of the area around an NPC in which the player can talk to it.
const TALK_HALF_WIDTH: f32 = 16.0;

// ============================================================================
// Character
// ============================================================================

/// Body and contact state shared by every character.
#[derive(Debug, Clone)]
pub struct Character {
    name: String,

    /// Category of the solid body fixture.
    category: CategoryBits,

    body: Option<RigidBodyHandle>,

    /// Number of ground or platform fixtures the feet currently touch.
    ground_contacts: u32,

    /// Set while an enemy stands on a cliff marker.
    pub at_cliff_edge: bool,

    /// Opponents overlapping the weapon sensor.
    in_range_targets: Vec<ActorId>,

    /// Interactables under the feet that wait for an explicit interaction.
    interactable_targets: Vec<FixtureTag>,

    /// Items under the feet.
    nearby_items: Vec<ActorId>,
}

impl Character {
    pub fn new(name: impl Into<String>, category: CategoryBits) -> Self {
        Self {
            name: name.into(),
            category,
            body: None,
            ground_contacts: 0,
            at_cliff_edge: false,
            in_range_targets: Vec::new(),
            interactable_targets: Vec::new(),
            nearby_items: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> CategoryBits {
        self.category
    }

    pub fn body(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    pub fn is_on_ground(&self) -> bool {
        self.ground_contacts > 0
    }

    pub fn ground_contacts(&self) -> u32 {
        self.ground_contacts
    }

    pub fn begin_ground_contact(&mut self) {
        self.ground_contacts += 1;
    }

    pub fn end_ground_contact(&mut self) {
        self.ground_contacts = self.ground_contacts.saturating_sub(1);
    }

    pub fn in_range_targets(&self) -> &[ActorId] {
        &self.in_range_targets
    }

    pub fn add_in_range_target(&mut self, target: ActorId) {
        if !self.in_range_targets.contains(&target) {
            self.in_range_targets.push(target);
        }
    }

    pub fn remove_in_range_target(&mut self, target: ActorId) {
        self.in_range_targets.retain(|t| *t != target);
    }

    pub fn interactable_targets(&self) -> &[FixtureTag] {
        &self.interactable_targets
    }

    /// The interactable an explicit interact action applies to: the one
    /// touched most recently.
    pub fn current_interactable_target(&self) -> Option<FixtureTag> {
        self.interactable_targets.last().copied()
    }

    pub fn add_interactable_target(&mut self, target: FixtureTag) {
        if !self.interactable_targets.contains(&target) {
            self.interactable_targets.push(target);
        }
    }

    pub fn remove_interactable_target(&mut self, target: FixtureTag) {
        self.interactable_targets.retain(|t| *t != target);
    }

    pub fn nearby_items(&self) -> &[ActorId] {
        &self.nearby_items
    }

    pub fn add_nearby_item(&mut self, item: ActorId) {
        if !self.nearby_items.contains(&item) {
            self.nearby_items.push(item);
        }
    }

    pub fn remove_nearby_item(&mut self, item: ActorId) {
        self.nearby_items.retain(|i| *i != item);
    }

    /// What the weapon sensor may overlap.
    fn opponents(&self) -> CategoryBits {
        if self.category == CategoryBits::PLAYER {
            CategoryBits::ENEMY
        } else if self.category == CategoryBits::ENEMY {
            CategoryBits::PLAYER
        } else {
            CategoryBits::NONE
        }
    }

    fn show(&mut self, world: &mut PhysicsWorld, id: ActorId, x: f32, y: f32) -> bool {
        if self.body.is_some() {
            return false;
        }
        let ppm = world.pixels_per_meter();
        let tag = FixtureTag::Actor(id);
        let body = BodyBuilder::new()
            .body_type(BodyType::Dynamic)
            .position(x, y, ppm)
            .fixed_rotation(true)
            .build_body(world);

        let mut body_mask = CategoryBits::MASK_TERRAIN | CategoryBits::MELEE_WEAPON;
        if self.category == CategoryBits::ENEMY {
            body_mask = body_mask | CategoryBits::CLIFF_MARKER;
        }
        FixtureBuilder::rectangle(HALF_WIDTH, HALF_HEIGHT, ppm)
            .category_bits(self.category)
            .mask_bits(body_mask)
            .friction(0.0)
            .user_data(tag)
            .build_fixture(world, body);

        FixtureBuilder::rectangle_at(
            HALF_WIDTH * 0.8,
            FEET_HALF_HEIGHT,
            Vec2::new(0.0, -HALF_HEIGHT),
            ppm,
        )
        .category_bits(CategoryBits::FEET)
        .mask_bits(CategoryBits::MASK_FEET)
        .sensor(true)
        .user_data(tag)
        .build_fixture(world, body);

        let opponents = self.opponents();
        if opponents != CategoryBits::NONE {
            FixtureBuilder::rectangle_at(
                WEAPON_REACH / 2.0,
                HALF_HEIGHT / 2.0,
                Vec2::new(HALF_WIDTH + WEAPON_REACH / 2.0, 0.0),
                ppm,
            )
            .category_bits(CategoryBits::MELEE_WEAPON)
            .mask_bits(opponents)
            .sensor(true)
            .user_data(tag)
            .build_fixture(world, body);
        }

        debug!(name = %self.name, %id, x, y, "character shown");
        self.body = Some(body);
        true
    }

    fn remove(&mut self, world: &mut PhysicsWorld) {
        destroy_body(world, &mut self.body);
        self.ground_contacts = 0;
        self.at_cliff_edge = false;
        self.in_range_targets.clear();
        self.interactable_targets.clear();
        self.nearby_items.clear();
    }
}

/// Forward the body half of [`DynamicActor`] to an embedded `character`.
macro_rules! character_actor {
    ($kind:expr) => {
        fn kind(&self) -> ActorKind {
            $kind
        }

        fn name(&self) -> &str {
            self.character.name()
        }

        fn body(&self) -> Option<RigidBodyHandle> {
            self.character.body()
        }

        fn show_on_map(&mut self, world: &mut PhysicsWorld, id: ActorId, x: f32, y: f32) -> bool {
            self.character.show(world, id, x, y)
        }

        fn remove_from_map(&mut self, world: &mut PhysicsWorld) {
            self.character.remove(world);
        }

        fn as_character(&self) -> Option<&Character> {
            Some(&self.character)
        }

        fn as_character_mut(&mut self) -> Option<&mut Character> {
            Some(&mut self.character)
        }
    };
}

// ============================================================================
// Player
// ============================================================================

/// One stack in the player's inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry {
    pub profile: ItemProfile,
    pub amount: u32,
}

/// The player character. Survives map transitions; the manager holds it
/// between leaving one map and showing it on the next.
#[derive(Debug, Clone)]
pub struct Player {
    pub character: Character,
    inventory: Vec<InventoryEntry>,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            character: Character::new(name, CategoryBits::PLAYER),
            inventory: Vec::new(),
        }
    }

    pub fn inventory(&self) -> &[InventoryEntry] {
        &self.inventory
    }

    /// Add items, stacking onto an entry with the same name.
    pub fn add_item(&mut self, profile: ItemProfile, amount: u32) {
        match self.inventory.iter_mut().find(|e| e.profile.name == profile.name) {
            Some(entry) => entry.amount += amount,
            None => self.inventory.push(InventoryEntry { profile, amount }),
        }
    }

    /// Amount carried of the named item.
    pub fn item_amount(&self, name: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|e| e.profile.name == name)
            .map(|e| e.amount)
            .sum()
    }

    /// Names of every key item carried.
    pub fn keys(&self) -> Vec<String> {
        self.inventory
            .iter()
            .filter(|e| e.profile.kind == ItemKind::Key && e.amount > 0)
            .map(|e| e.profile.name.clone())
            .collect()
    }
}

impl DynamicActor for Player {
    character_actor!(ActorKind::Player);
    actor_any!();
}

// ============================================================================
// Enemy
// ============================================================================

#[derive(Debug, Clone)]
pub struct Enemy {
    pub character: Character,
}

impl Enemy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            character: Character::new(name, CategoryBits::ENEMY),
        }
    }
}

impl DynamicActor for Enemy {
    character_actor!(ActorKind::Enemy);
    actor_any!();
}

// ============================================================================
// Npc
// ============================================================================

/// A non-player character the player can talk to.
#[derive(Debug, Clone)]
pub struct Npc {
    pub character: Character,
    id: Option<ActorId>,
    hint_visible: bool,
}

impl Npc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            character: Character::new(name, CategoryBits::NPC),
            id: None,
            hint_visible: false,
        }
    }
}

impl DynamicActor for Npc {
    fn kind(&self) -> ActorKind {
        ActorKind::Npc
    }

    fn name(&self) -> &str {
        self.character.name()
    }

    fn body(&self) -> Option<RigidBodyHandle> {
        self.character.body()
    }

    fn show_on_map(&mut self, world: &mut PhysicsWorld, id: ActorId, x: f32, y: f32) -> bool {
        if !self.character.show(world, id, x, y) {
            return false;
        }
        if let Some(body) = self.character.body() {
            FixtureBuilder::rectangle(TALK_HALF_WIDTH, HALF_HEIGHT, world.pixels_per_meter())
                .category_bits(CategoryBits::INTERACTABLE)
                .mask_bits(CategoryBits::FEET)
                .sensor(true)
                .user_data(FixtureTag::Actor(id))
                .build_fixture(world, body);
        }
        self.id = Some(id);
        true
    }

    fn remove_from_map(&mut self, world: &mut PhysicsWorld) {
        self.character.remove(world);
        self.id = None;
        self.hint_visible = false;
    }

    fn as_character(&self) -> Option<&Character> {
        Some(&self.character)
    }

    fn as_character_mut(&mut self) -> Option<&mut Character> {
        Some(&mut self.character)
    }

    fn as_interactable_mut(&mut self) -> Option<&mut dyn Interactable> {
        Some(self)
    }

    actor_any!();
}

impl Interactable for Npc {
    fn on_interact(&mut self, ctx: &mut InteractContext<'_>) -> Interaction {
        match self.id {
            Some(npc) if ctx.user.is_player => Interaction::Dialogue { npc },
            _ => Interaction::Nothing,
        }
    }

    fn will_interact_on_contact(&self) -> bool {
        false
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
    use crate::state_store::InteractableStateStore;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(Vec2::ZERO, 100.0)
    }

    fn key(name: &str) -> ItemProfile {
        ItemProfile::parse(
            "key.json",
            &format!(r#"{{ "itemType": "key", "name": "{name}" }}"#),
        )
        .unwrap()
    }

    #[test]
    fn test_player_fixtures() {
        let mut world = world();
        let mut player = Player::new("Hero");
        assert!(player.show_on_map(&mut world, ActorId::new(0, 0), 0.0, 0.0));

        let body = player.body().unwrap();
        let categories: Vec<_> = world.fixtures(body).iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![
                CategoryBits::PLAYER,
                CategoryBits::FEET,
                CategoryBits::MELEE_WEAPON
            ]
        );
        let weapon = world.fixtures(body)[2];
        assert_eq!(weapon.mask, CategoryBits::ENEMY);
        assert!(weapon.sensor);
    }

    #[test]
    fn test_npc_has_no_weapon() {
        let mut world = world();
        let mut npc = Npc::new("Elder");
        npc.show_on_map(&mut world, ActorId::new(0, 0), 0.0, 0.0);
        assert_eq!(world.fixture_count(), 3);
        assert_eq!(world.count_fixtures(CategoryBits::MELEE_WEAPON), 0);
    }

    #[test]
    fn test_npc_talk_sensor_faces_feet() {
        let mut world = world();
        let mut npc = Npc::new("Elder");
        let id = ActorId::new(2, 1);
        assert!(npc.show_on_map(&mut world, id, 0.0, 0.0));

        let talk = world
            .fixtures(npc.body().unwrap())
            .into_iter()
            .find(|f| f.category == CategoryBits::INTERACTABLE)
            .unwrap();
        assert!(talk.sensor);
        assert_eq!(talk.mask, CategoryBits::FEET);
        assert_eq!(talk.tag, Some(FixtureTag::Actor(id)));
        assert!(CategoryBits::MASK_FEET.contains(talk.category));

        npc.remove_from_map(&mut world);
        assert_eq!(world.fixture_count(), 0);
    }

    #[test]
    fn test_enemy_body_sees_cliff_markers() {
        let mut world = world();
        let mut enemy = Enemy::new("Slime");
        enemy.show_on_map(&mut world, ActorId::new(0, 0), 0.0, 0.0);
        let body = world.fixtures(enemy.body().unwrap())[0];
        assert!(body.mask.contains(CategoryBits::CLIFF_MARKER));
    }

    #[test]
    fn test_ground_contacts_never_underflow() {
        let mut character = Character::new("A", CategoryBits::PLAYER);
        character.end_ground_contact();
        assert!(!character.is_on_ground());
        character.begin_ground_contact();
        character.begin_ground_contact();
        character.end_ground_contact();
        assert!(character.is_on_ground());
    }

    #[test]
    fn test_remove_clears_contact_state() {
        let mut world = world();
        let mut enemy = Enemy::new("Slime");
        enemy.show_on_map(&mut world, ActorId::new(0, 0), 0.0, 0.0);
        enemy.character.begin_ground_contact();
        enemy.character.add_in_range_target(ActorId::new(1, 0));
        enemy.character.at_cliff_edge = true;

        enemy.remove_from_map(&mut world);
        assert_eq!(enemy.character.ground_contacts(), 0);
        assert!(enemy.character.in_range_targets().is_empty());
        assert!(!enemy.character.at_cliff_edge);
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_inventory_stacks_and_lists_keys() {
        let mut player = Player::new("Hero");
        player.add_item(key("Rusty Key"), 1);
        player.add_item(key("Rusty Key"), 1);
        assert_eq!(player.item_amount("Rusty Key"), 2);
        assert_eq!(player.inventory().len(), 1);
        assert_eq!(player.keys(), vec!["Rusty Key".to_string()]);
    }

    #[test]
    fn test_npc_dialogue_only_for_player() {
        let mut world = world();
        let mut npc = Npc::new("Elder");
        let id = ActorId::new(3, 1);
        npc.show_on_map(&mut world, id, 0.0, 0.0);

        let mut states = InteractableStateStore::new();
        let player = Interactor {
            id: ActorId::new(0, 0),
            is_player: true,
            keys: Vec::new(),
        };
        let mut ctx = InteractContext {
            map_id: "town.json",
            states: &mut states,
            user: &player,
            position: None,
        };
        assert_eq!(npc.on_interact(&mut ctx), Interaction::Dialogue { npc: id });

        let enemy = Interactor {
            is_player: false,
            ..player.clone()
        };
        ctx.user = &enemy;
        assert_eq!(npc.on_interact(&mut ctx), Interaction::Nothing);
    }
}
