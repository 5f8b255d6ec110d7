//! The rigid-body simulation shared by every map.
//!
//! [`PhysicsWorld`] wraps the rapier2d pipeline boilerplate. It lives as long
//! as the map manager that owns it; maps come and go, removing their bodies
//! one at a time instead of tearing the world down.

use glam::Vec2;
use rapier2d::prelude::*;
use tracing::trace;

use crate::builder::{BodySink, StagedGeometry};
use crate::flags::CategoryBits;
use crate::tag::FixtureTag;

/// One side of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactSide {
    /// Category bits of the fixture.
    pub category: CategoryBits,
    /// Owner of the fixture.
    pub tag: FixtureTag,
}

/// A begin or end contact between two tagged fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub a: ContactSide,
    pub b: ContactSide,
    /// `true` when the fixtures started touching, `false` when they separated.
    pub began: bool,
}

/// Snapshot of a single fixture, for inspection and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureInfo {
    pub category: CategoryBits,
    pub mask: CategoryBits,
    pub tag: Option<FixtureTag>,
    pub sensor: bool,
    pub friction: f32,
}

/// The physics world.
pub struct PhysicsWorld {
    /// Gravity vector (meters/second²).
    gravity: Vector<Real>,
    /// Pixels per meter used by everything building bodies in this world.
    pixels_per_meter: f32,
    /// Integration parameters, `dt` is overwritten every step.
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
}

impl PhysicsWorld {
    /// Create an empty world with the given gravity and pixel scale.
    pub fn new(gravity: Vec2, pixels_per_meter: f32) -> Self {
        Self {
            gravity: vector![gravity.x, gravity.y],
            pixels_per_meter,
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
        }
    }

    pub fn pixels_per_meter(&self) -> f32 {
        self.pixels_per_meter
    }

    /// Advance the simulation and return the contacts that began or ended.
    ///
    /// Events whose colliders were removed before they could be read back, or
    /// that involve an untagged collider, are dropped.
    pub fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        self.integration_parameters.dt = dt;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &event_handler,
        );

        let mut contacts = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            let (Some(a), Some(b)) = (
                self.contact_side(event.collider1()),
                self.contact_side(event.collider2()),
            ) else {
                trace!(?event, "dropping contact with untagged or removed collider");
                continue;
            };
            contacts.push(ContactEvent {
                a,
                b,
                began: event.started(),
            });
        }
        contacts
    }

    fn contact_side(&self, handle: ColliderHandle) -> Option<ContactSide> {
        let collider = self.collider_set.get(handle)?;
        Some(ContactSide {
            category: CategoryBits::from_groups(collider.collision_groups()),
            tag: FixtureTag::from_user_data(collider.user_data)?,
        })
    }

    /// Remove a body together with all of its fixtures.
    ///
    /// Returns `false` if the handle no longer refers to a body.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    /// Insert every staged body and its fixtures, returning the new handles in
    /// staging order.
    pub fn commit(&mut self, staged: StagedGeometry) -> Vec<RigidBodyHandle> {
        staged
            .into_bodies()
            .map(|(body, fixtures)| {
                let handle = self.insert_body(body);
                for fixture in fixtures {
                    self.insert_fixture(fixture, handle);
                }
                handle
            })
            .collect()
    }

    /// Body position in pixels.
    pub fn body_position_px(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        self.body_position(handle).map(|p| p * self.pixels_per_meter)
    }

    /// Body position in meters.
    pub fn body_position(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        let translation = self.rigid_body_set.get(handle)?.translation();
        Some(Vec2::new(translation.x, translation.y))
    }

    /// Teleport a body, in meters.
    pub fn set_body_position(&mut self, handle: RigidBodyHandle, position: Vec2) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_translation(vector![position.x, position.y], true);
        }
    }

    /// Whether the handle still refers to a body.
    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.contains(handle)
    }

    /// Number of bodies in the world.
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Number of fixtures in the world.
    pub fn fixture_count(&self) -> usize {
        self.collider_set.len()
    }

    /// Describe every fixture attached to a body.
    pub fn fixtures(&self, handle: RigidBodyHandle) -> Vec<FixtureInfo> {
        let Some(body) = self.rigid_body_set.get(handle) else {
            return Vec::new();
        };
        body.colliders()
            .iter()
            .filter_map(|&collider| self.collider_set.get(collider))
            .map(|collider| {
                let groups = collider.collision_groups();
                FixtureInfo {
                    category: CategoryBits::from_groups(groups),
                    mask: CategoryBits(groups.filter.bits()),
                    tag: FixtureTag::from_user_data(collider.user_data),
                    sensor: collider.is_sensor(),
                    friction: collider.friction(),
                }
            })
            .collect()
    }

    /// Count fixtures in the whole world whose category contains `category`.
    pub fn count_fixtures(&self, category: CategoryBits) -> usize {
        self.collider_set
            .iter()
            .filter(|(_, collider)| {
                CategoryBits::from_groups(collider.collision_groups()).contains(category)
            })
            .count()
    }
}

impl BodySink for PhysicsWorld {
    type Body = RigidBodyHandle;

    fn insert_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(body)
    }

    fn insert_fixture(&mut self, fixture: Collider, body: RigidBodyHandle) {
        self.collider_set
            .insert_with_parent(fixture, body, &mut self.rigid_body_set);
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("gravity", &self.gravity)
            .field("pixels_per_meter", &self.pixels_per_meter)
            .field("bodies", &self.rigid_body_set.len())
            .field("fixtures", &self.collider_set.len())
            .finish()
    }
}
