//! A playable level.
//!
//! A map goes through three steps:
//!
//! 1. [`GameMap::stage`] parses the level and builds its static geometry as
//!    plain values. It touches no shared state and runs on the loader thread.
//! 2. [`StagedMap::install`] commits that geometry to the physics world, and
//!    [`GameMap::create_objects`] builds triggers, portals and actors.
//! 3. [`GameMap::delete_objects`] removes everything again and saves the
//!    interactable state that must outlive the map.

use cragmoor_physics::{
    ActorId, BodyBuilder, BodyType, BuildError, CategoryBits, FixtureBuilder, FixtureTag,
    PhysicsWorld, RigidBodyHandle, StagedGeometry,
};
use glam::Vec2;
use tracing::{debug, info, warn};

use crate::actor::{Chest, Enemy, Item, ItemProfile, Npc};
use crate::error::{ItemError, MapError};
use crate::interactable::{Interactable, Portal, Trigger};
use crate::registry::ActorRegistry;
use crate::source::AssetSource;
use crate::state_store::InteractableStateStore;
use crate::tiled::{MapObject, TiledMap};

pub const PORTAL_LAYER: &str = "Portal";
pub const TRIGGER_LAYER: &str = "Trigger";
pub const PLAYER_LAYER: &str = "Player";
pub const NPC_LAYER: &str = "Npc";
pub const CHEST_LAYER: &str = "Chest";
pub const ENEMY_LAYER: &str = "Enemy";
pub const ITEM_LAYER: &str = "Item";

/// Object layers turned into static level geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticLayer {
    Ground,
    Wall,
    Platform,
    CliffMarker,
}

impl StaticLayer {
    pub const ALL: [StaticLayer; 4] = [
        StaticLayer::Ground,
        StaticLayer::Wall,
        StaticLayer::Platform,
        StaticLayer::CliffMarker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StaticLayer::Ground => "Ground",
            StaticLayer::Wall => "Wall",
            StaticLayer::Platform => "Platform",
            StaticLayer::CliffMarker => "CliffMarker",
        }
    }

    pub fn category(self) -> CategoryBits {
        match self {
            StaticLayer::Ground => CategoryBits::GROUND,
            StaticLayer::Wall => CategoryBits::WALL,
            StaticLayer::Platform => CategoryBits::PLATFORM,
            StaticLayer::CliffMarker => CategoryBits::CLIFF_MARKER,
        }
    }

    pub fn friction(self) -> f32 {
        match self {
            StaticLayer::Ground | StaticLayer::Platform => 2.0,
            StaticLayer::Wall => 1.0,
            StaticLayer::CliffMarker => 0.0,
        }
    }

    /// Cliff markers only report overlaps; they never push anything.
    pub fn is_sensor(self) -> bool {
        self == StaticLayer::CliffMarker
    }
}

/// Lifecycle of an installed map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    /// Static geometry is in the world; nothing else is.
    Installed,
    ObjectsCreated,
    Destroyed,
}

// ============================================================================
// Staging
// ============================================================================

/// A parsed map whose static geometry is built but not yet in any world.
#[derive(Debug)]
pub struct StagedMap {
    id: String,
    tiled: TiledMap,
    geometry: StagedGeometry,
    player_spawn: Vec2,
}

impl StagedMap {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn static_body_count(&self) -> usize {
        self.geometry.body_count()
    }

    /// Commit the static geometry to `world`.
    pub fn install(self, world: &mut PhysicsWorld) -> GameMap {
        let static_bodies = world.commit(self.geometry);
        debug!(map = %self.id, bodies = static_bodies.len(), "static geometry installed");
        GameMap {
            id: self.id,
            tiled: self.tiled,
            static_bodies,
            triggers: Vec::new(),
            portals: Vec::new(),
            registry: ActorRegistry::new(),
            player_spawn: self.player_spawn,
            state: MapState::Installed,
        }
    }
}

fn stage_static_layer(
    map_id: &str,
    tiled: &TiledMap,
    layer: StaticLayer,
    ppm: f32,
    geometry: &mut StagedGeometry,
) -> Result<(), MapError> {
    let geometry_error = |source: BuildError| MapError::Geometry {
        map: map_id.to_string(),
        layer: layer.name().to_string(),
        source,
    };

    for object in tiled.objects(layer.name()) {
        let (origin, fixture) = match object.polyline_vertices() {
            Some(vertices) => (
                tiled.to_world(object.x, object.y),
                FixtureBuilder::polyline(&vertices, ppm).map_err(geometry_error)?,
            ),
            None => (
                tiled.object_center(object),
                FixtureBuilder::try_rectangle(object.width / 2.0, object.height / 2.0, ppm)
                    .map_err(geometry_error)?,
            ),
        };

        let body = BodyBuilder::new()
            .body_type(BodyType::Fixed)
            .position(origin.x, origin.y, ppm)
            .build_body(geometry);
        fixture
            .category_bits(layer.category())
            .sensor(layer.is_sensor())
            .friction(layer.friction())
            .user_data(FixtureTag::Level)
            .build_fixture(geometry, body);
    }
    Ok(())
}

fn validate_portals(map_id: &str, tiled: &TiledMap) -> Result<(), MapError> {
    for (index, portal) in tiled.objects(PORTAL_LAYER).iter().enumerate() {
        if portal.prop_str("targetMap").is_none_or(|t| t.is_empty()) {
            return Err(MapError::Invalid {
                map: map_id.to_string(),
                reason: format!("portal {index} has no targetMap"),
            });
        }
    }
    Ok(())
}

// ============================================================================
// GameMap
// ============================================================================

/// An installed map: static bodies, interactables and the actors on it.
#[derive(Debug)]
pub struct GameMap {
    id: String,
    tiled: TiledMap,
    static_bodies: Vec<RigidBodyHandle>,
    triggers: Vec<Trigger>,
    portals: Vec<Portal>,
    registry: ActorRegistry,
    player_spawn: Vec2,
    state: MapState,
}

impl GameMap {
    /// Parse and validate the level `text` and build its static geometry.
    ///
    /// Safe to call off the main thread.
    pub fn stage(id: &str, text: &str, ppm: f32) -> Result<StagedMap, MapError> {
        let tiled = TiledMap::parse(id, text)?;

        let spawn = tiled
            .objects(PLAYER_LAYER)
            .first()
            .ok_or_else(|| MapError::MissingSpawn(id.to_string()))?;
        let player_spawn = tiled.object_center(spawn);
        validate_portals(id, &tiled)?;

        let mut geometry = StagedGeometry::new();
        for layer in StaticLayer::ALL {
            stage_static_layer(id, &tiled, layer, ppm, &mut geometry)?;
        }

        Ok(StagedMap {
            id: id.to_string(),
            tiled,
            geometry,
            player_spawn,
        })
    }

    /// Build triggers, portals, NPCs, chests, enemies and items.
    ///
    /// Runs once per map; later calls are ignored. Items whose descriptor
    /// cannot be loaded are skipped with a warning.
    pub fn create_objects(
        &mut self,
        world: &mut PhysicsWorld,
        states: &mut InteractableStateStore,
        assets: &dyn AssetSource,
    ) {
        if self.state != MapState::Installed {
            warn!(map = %self.id, state = ?self.state, "objects already created");
            return;
        }

        for (index, object) in self.tiled.objects(TRIGGER_LAYER).iter().enumerate() {
            let mut trigger = Trigger::new(
                index as u32,
                object.prop_list("cmds", ';'),
                object.prop_bool("canBeTriggeredOnlyOnce"),
                object.prop_bool("canBeTriggeredOnlyByPlayer"),
            );
            trigger.restore(&self.id, states);
            trigger.show(world, self.tiled.object_center(object), half_extents(object));
            self.triggers.push(trigger);
        }

        for (index, object) in self.tiled.objects(PORTAL_LAYER).iter().enumerate() {
            let mut portal = Portal::new(
                index as u32,
                object.prop_str("targetMap").unwrap_or_default(),
                object.prop_u32("targetPortalId").unwrap_or(0),
                object.prop_bool("willInteractOnContact"),
                object.prop_bool("isLocked"),
                object.prop_str("key").filter(|k| !k.is_empty()),
                self.tiled.object_center(object),
            );
            portal.restore(&self.id, states);
            portal.show(world, half_extents(object));
            self.portals.push(portal);
        }

        for object in self.tiled.objects(NPC_LAYER) {
            let at = self.tiled.object_center(object);
            let npc = Npc::new(actor_name(object, "Npc"));
            self.registry.show(world, Box::new(npc), at.x, at.y);
        }

        for object in self.tiled.objects(CHEST_LAYER) {
            let at = self.tiled.object_center(object);
            let chest = Chest::new(object.prop_list("items", ','));
            self.registry.show(world, Box::new(chest), at.x, at.y);
        }

        for object in self.tiled.objects(ENEMY_LAYER) {
            let at = self.tiled.object_center(object);
            let enemy = Enemy::new(actor_name(object, "Enemy"));
            self.registry.show(world, Box::new(enemy), at.x, at.y);
        }

        let items: Vec<(String, u32, Vec2)> = self
            .tiled
            .objects(ITEM_LAYER)
            .iter()
            .filter_map(|object| {
                let Some(descriptor) = object.prop_str("json") else {
                    warn!(map = %self.id, object = object.id, "item object has no json property");
                    return None;
                };
                let amount = object.prop_u32("amount").unwrap_or(1);
                Some((descriptor, amount, self.tiled.object_center(object)))
            })
            .collect();
        for (descriptor, amount, at) in items {
            if let Err(err) = self.create_item(world, assets, &descriptor, at.x, at.y, amount) {
                warn!(map = %self.id, %descriptor, error = %err, "skipping item");
            }
        }

        self.state = MapState::ObjectsCreated;
        info!(
            map = %self.id,
            triggers = self.triggers.len(),
            portals = self.portals.len(),
            actors = self.registry.len(),
            "map objects created"
        );
    }

    /// Remove every actor, trigger, portal and static body from the world,
    /// saving interactable state on the way out.
    pub fn delete_objects(&mut self, world: &mut PhysicsWorld, states: &mut InteractableStateStore) {
        if self.state == MapState::Destroyed {
            return;
        }

        let actors = self.registry.remove_all(world);
        for mut trigger in self.triggers.drain(..) {
            trigger.save(&self.id, states);
            trigger.remove(world);
        }
        for mut portal in self.portals.drain(..) {
            portal.save(&self.id, states);
            portal.remove(world);
        }
        for body in self.static_bodies.drain(..) {
            world.remove_body(body);
        }

        self.state = MapState::Destroyed;
        info!(map = %self.id, actors, "map objects deleted");
    }

    /// Create an item from the descriptor `descriptor` and show it at
    /// (`x`, `y`) world pixels. On error the registry is left untouched.
    pub fn create_item(
        &mut self,
        world: &mut PhysicsWorld,
        assets: &dyn AssetSource,
        descriptor: &str,
        x: f32,
        y: f32,
        amount: u32,
    ) -> Result<ActorId, ItemError> {
        let profile = ItemProfile::load(assets, descriptor)?;
        let item = Item::new(profile, amount);
        self.registry
            .show(world, Box::new(item), x, y)
            .ok_or_else(|| ItemError::ShowRejected(descriptor.to_string()))
    }

    /// Look up whatever a fixture tag points at, if it can be interacted with.
    pub fn interactable_mut(&mut self, tag: FixtureTag) -> Option<&mut dyn Interactable> {
        match tag {
            FixtureTag::Trigger(index) => self
                .triggers
                .get_mut(index as usize)
                .map(|t| t as &mut dyn Interactable),
            FixtureTag::Portal(index) => self
                .portals
                .get_mut(index as usize)
                .map(|p| p as &mut dyn Interactable),
            FixtureTag::Actor(id) => self.registry.get_mut(id)?.as_interactable_mut(),
            FixtureTag::Level => None,
        }
    }

    /// World pixel position of whatever a fixture tag points at.
    pub fn tag_position(&self, world: &PhysicsWorld, tag: FixtureTag) -> Option<Vec2> {
        match tag {
            FixtureTag::Trigger(index) => world.body_position_px(self.trigger(index)?.body()?),
            FixtureTag::Portal(index) => Some(self.portal(index)?.position()),
            FixtureTag::Actor(id) => self.registry.get(id)?.position(world),
            FixtureTag::Level => None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    /// Width in tiles.
    pub fn width(&self) -> u32 {
        self.tiled.width
    }

    /// Height in tiles.
    pub fn height(&self) -> u32 {
        self.tiled.height
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tiled.tilewidth, self.tiled.tileheight)
    }

    /// Where the player appears when not arriving through a portal.
    pub fn player_spawn(&self) -> Vec2 {
        self.player_spawn
    }

    pub fn portal_position(&self, index: u32) -> Option<Vec2> {
        self.portal(index).map(Portal::position)
    }

    pub fn portal(&self, index: u32) -> Option<&Portal> {
        self.portals.get(index as usize)
    }

    pub fn portal_mut(&mut self, index: u32) -> Option<&mut Portal> {
        self.portals.get_mut(index as usize)
    }

    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    pub fn trigger(&self, index: u32) -> Option<&Trigger> {
        self.triggers.get(index as usize)
    }

    pub fn trigger_mut(&mut self, index: u32) -> Option<&mut Trigger> {
        self.triggers.get_mut(index as usize)
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn static_bodies(&self) -> &[RigidBodyHandle] {
        &self.static_bodies
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActorRegistry {
        &mut self.registry
    }
}

fn half_extents(object: &MapObject) -> Vec2 {
    Vec2::new(object.width / 2.0, object.height / 2.0)
}

fn actor_name(object: &MapObject, fallback: &str) -> String {
    object
        .prop_str("name")
        .filter(|n| !n.is_empty())
        .or_else(|| (!object.name.is_empty()).then(|| object.name.clone()))
        .unwrap_or_else(|| fallback.to_string())
}
