//! Items lying on a map, created from JSON item descriptors.

use std::collections::BTreeMap;

use cragmoor_physics::{
    ActorId, BodyBuilder, BodyType, CategoryBits, FixtureBuilder, FixtureTag, PhysicsWorld,
    RigidBodyHandle,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{destroy_body, ActorKind, DynamicActor};
use crate::error::ItemError;
use crate::source::AssetSource;

/// Half size of an item's body, in pixels.
const HALF_SIZE: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Equipment,
    Consumable,
    Key,
    Misc,
}

/// Everything an item descriptor says about an item.
///
/// ```json
/// { "itemType": "key", "name": "Rusty Key", "desc": "Opens a door.",
///   "icon": "icons/rusty_key.png", "value": 0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProfile {
    #[serde(rename = "itemType")]
    pub kind: ItemKind,

    pub name: String,

    #[serde(rename = "desc", default)]
    pub description: String,

    #[serde(default)]
    pub icon: String,

    #[serde(default)]
    pub spritesheet: Option<String>,

    /// Trade value.
    #[serde(default)]
    pub value: u32,

    /// Stat bonuses granted while equipped, by stat name.
    #[serde(default)]
    pub bonus: BTreeMap<String, i32>,
}

impl ItemProfile {
    /// Parse a descriptor document. `id` only names it in errors.
    pub fn parse(id: &str, text: &str) -> Result<Self, ItemError> {
        let profile: ItemProfile =
            serde_json::from_str(text).map_err(|source| ItemError::Malformed {
                id: id.to_string(),
                source,
            })?;
        if profile.name.trim().is_empty() {
            return Err(ItemError::Invalid {
                id: id.to_string(),
                reason: "item name is empty".to_string(),
            });
        }
        Ok(profile)
    }

    /// Read and parse the descriptor `id` from `assets`.
    pub fn load(assets: &dyn AssetSource, id: &str) -> Result<Self, ItemError> {
        let text = assets.read(id)?;
        Self::parse(id, &text)
    }
}

/// A stack of one kind of item waiting to be picked up.
#[derive(Debug, Clone)]
pub struct Item {
    profile: ItemProfile,
    amount: u32,
    body: Option<RigidBodyHandle>,
}

impl Item {
    pub fn new(profile: ItemProfile, amount: u32) -> Self {
        Self {
            profile,
            amount: amount.max(1),
            body: None,
        }
    }

    pub fn profile(&self) -> &ItemProfile {
        &self.profile
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn into_parts(self) -> (ItemProfile, u32) {
        (self.profile, self.amount)
    }
}

impl DynamicActor for Item {
    fn kind(&self) -> ActorKind {
        ActorKind::Item
    }

    fn name(&self) -> &str {
        &self.profile.name
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

        // Solid part rests on terrain, the sensor is what feet touch.
        FixtureBuilder::rectangle(HALF_SIZE, HALF_SIZE, ppm)
            .category_bits(CategoryBits::ITEM)
            .mask_bits(CategoryBits::MASK_TERRAIN)
            .user_data(FixtureTag::Actor(id))
            .build_fixture(world, body);
        FixtureBuilder::rectangle(HALF_SIZE, HALF_SIZE, ppm)
            .category_bits(CategoryBits::ITEM)
            .mask_bits(CategoryBits::FEET)
            .sensor(true)
            .user_data(FixtureTag::Actor(id))
            .build_fixture(world, body);

        debug!(item = %self.profile.name, amount = self.amount, %id, x, y, "item shown");
        self.body = Some(body);
        true
    }

    fn remove_from_map(&mut self, world: &mut PhysicsWorld) {
        destroy_body(world, &mut self.body);
    }

    actor_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use glam::Vec2;

    #[test]
    fn test_parse_descriptor() {
        let profile = ItemProfile::parse(
            "sword.json",
            r#"{ "itemType": "equipment", "name": "Short Sword", "desc": "Sharp.",
                 "icon": "icons/sword.png", "value": 40, "bonus": { "str": 2 } }"#,
        )
        .unwrap();
        assert_eq!(profile.kind, ItemKind::Equipment);
        assert_eq!(profile.description, "Sharp.");
        assert_eq!(profile.bonus.get("str"), Some(&2));
        assert_eq!(profile.spritesheet, None);
    }

    #[test]
    fn test_unknown_item_type_is_malformed() {
        let result = ItemProfile::parse("x.json", r#"{ "itemType": "weapon", "name": "X" }"#);
        assert!(matches!(result, Err(ItemError::Malformed { .. })));
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let result = ItemProfile::parse("x.json", r#"{ "itemType": "misc", "name": " " }"#);
        assert!(matches!(result, Err(ItemError::Invalid { .. })));
    }

    #[test]
    fn test_missing_descriptor() {
        let assets = MemorySource::new();
        assert!(matches!(
            ItemProfile::load(&assets, "nope.json"),
            Err(ItemError::Asset(_))
        ));
    }

    #[test]
    fn test_show_and_remove() {
        let mut world = PhysicsWorld::new(Vec2::ZERO, 100.0);
        let profile = ItemProfile::parse("p.json", r#"{ "itemType": "consumable", "name": "Potion" }"#)
            .unwrap();
        let mut item = Item::new(profile, 0);
        assert_eq!(item.amount(), 1);

        let id = ActorId::new(0, 0);
        assert!(item.show_on_map(&mut world, id, 50.0, 50.0));
        assert!(!item.show_on_map(&mut world, id, 50.0, 50.0));
        assert_eq!(world.count_fixtures(CategoryBits::ITEM), 2);
        assert_eq!(item.position(&world), Some(Vec2::new(50.0, 50.0)));

        item.remove_from_map(&mut world);
        assert!(!item.is_shown());
        assert_eq!(world.body_count(), 0);
    }
}
