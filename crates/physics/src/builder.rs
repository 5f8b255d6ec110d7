//! Fluent builders for bodies and fixtures.
//!
//! Builders only describe what to create. Nothing touches a world until
//! [`BodyBuilder::build_body`] or [`FixtureBuilder::build_fixture`] commits the
//! description to a [`BodySink`], and a fixture can only be built against a
//! body handle that already exists.
//!
//! ```text
//! let body = BodyBuilder::new()
//!     .body_type(BodyType::Fixed)
//!     .position(x, y, ppm)
//!     .build_body(&mut world);
//!
//! FixtureBuilder::rectangle(w / 2.0, h / 2.0, ppm)
//!     .category_bits(CategoryBits::PLATFORM)
//!     .friction(2.0)
//!     .build_fixture(&mut world, body);
//! ```
//!
//! Positions and extents are given in pixels and divided by the
//! pixels-per-meter scale passed alongside them.

use glam::Vec2;
use rapier2d::prelude::*;
use thiserror::Error;

use crate::flags::CategoryBits;
use crate::tag::FixtureTag;

/// Errors raised while describing a fixture.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("polyline needs at least two vertices, got {0}")]
    DegeneratePolyline(usize),

    #[error("rectangle half extents must be positive, got {0}x{1}")]
    EmptyRectangle(f32, f32),
}

/// Somewhere bodies and fixtures can be committed to.
pub trait BodySink {
    /// Handle identifying a committed body within this sink.
    type Body: Copy;

    fn insert_body(&mut self, body: RigidBody) -> Self::Body;

    fn insert_fixture(&mut self, fixture: Collider, body: Self::Body);
}

/// Kind of body to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Immovable level geometry.
    #[default]
    Fixed,
    /// Fully simulated body.
    Dynamic,
}

/// Pending body description.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyBuilder {
    body_type: BodyType,
    position: Vec2,
    fixed_rotation: bool,
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self
    }

    /// Body origin in pixels, scaled down by `ppm`.
    pub fn position(mut self, x: f32, y: f32, ppm: f32) -> Self {
        self.position = Vec2::new(x, y) / ppm;
        self
    }

    /// Keep the body upright (characters, chests).
    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    /// Commit the body and return its handle.
    pub fn build_body<S: BodySink>(self, sink: &mut S) -> S::Body {
        let builder = match self.body_type {
            BodyType::Fixed => RigidBodyBuilder::fixed(),
            BodyType::Dynamic => RigidBodyBuilder::dynamic(),
        };
        let mut builder = builder.translation(vector![self.position.x, self.position.y]);
        if self.fixed_rotation {
            builder = builder.lock_rotations();
        }
        sink.insert_body(builder.build())
    }
}

/// Pending fixture description.
#[derive(Clone)]
pub struct FixtureBuilder {
    shape: SharedShape,
    offset: Vec2,
    category: CategoryBits,
    mask: CategoryBits,
    sensor: bool,
    friction: f32,
    tag: Option<FixtureTag>,
}

impl FixtureBuilder {
    fn with_shape(shape: SharedShape) -> Self {
        Self {
            shape,
            offset: Vec2::ZERO,
            category: CategoryBits::NONE,
            mask: CategoryBits(u32::MAX),
            sensor: false,
            friction: 0.2,
            tag: None,
        }
    }

    /// Axis-aligned box centered on the body, half extents in pixels.
    ///
    /// Non-positive extents are clamped to a hair above zero; use
    /// [`FixtureBuilder::try_rectangle`] when the size comes from authored data.
    pub fn rectangle(half_width: f32, half_height: f32, ppm: f32) -> Self {
        Self::with_shape(SharedShape::cuboid(
            half_width.max(f32::EPSILON) / ppm,
            half_height.max(f32::EPSILON) / ppm,
        ))
    }

    /// Like [`FixtureBuilder::rectangle`] but rejects empty boxes.
    pub fn try_rectangle(half_width: f32, half_height: f32, ppm: f32) -> Result<Self, BuildError> {
        if half_width <= 0.0 || half_height <= 0.0 {
            return Err(BuildError::EmptyRectangle(half_width, half_height));
        }
        Ok(Self::rectangle(half_width, half_height, ppm))
    }

    /// Box offset from the body origin, all values in pixels.
    pub fn rectangle_at(half_width: f32, half_height: f32, offset: Vec2, ppm: f32) -> Self {
        let mut fixture = Self::rectangle(half_width, half_height, ppm);
        fixture.offset = offset / ppm;
        fixture
    }

    /// Open chain of segments through `vertices` (pixels, body-relative).
    pub fn polyline(vertices: &[Vec2], ppm: f32) -> Result<Self, BuildError> {
        if vertices.len() < 2 {
            return Err(BuildError::DegeneratePolyline(vertices.len()));
        }
        let points = vertices
            .iter()
            .map(|v| point![v.x / ppm, v.y / ppm])
            .collect();
        Ok(Self::with_shape(SharedShape::polyline(points, None)))
    }

    pub fn category_bits(mut self, category: CategoryBits) -> Self {
        self.category = category;
        self
    }

    pub fn mask_bits(mut self, mask: CategoryBits) -> Self {
        self.mask = mask;
        self
    }

    pub fn sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn user_data(mut self, tag: FixtureTag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Commit the fixture onto an already built body.
    pub fn build_fixture<S: BodySink>(self, sink: &mut S, body: S::Body) {
        let collider = ColliderBuilder::new(self.shape)
            .translation(vector![self.offset.x, self.offset.y])
            .collision_groups(self.category.groups(self.mask))
            .sensor(self.sensor)
            .friction(self.friction)
            .user_data(self.tag.map(FixtureTag::to_user_data).unwrap_or(0))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        sink.insert_fixture(collider, body);
    }
}

/// Bodies and fixtures built away from the world.
///
/// Rapier bodies and colliders are plain values until inserted, so a loader
/// thread can build a whole level's geometry here and hand it to the thread
/// that owns the [`PhysicsWorld`](crate::PhysicsWorld) for a single
/// [`commit`](crate::PhysicsWorld::commit).
#[derive(Default)]
pub struct StagedGeometry {
    bodies: Vec<(RigidBody, Vec<Collider>)>,
}

impl StagedGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of staged fixtures across all bodies.
    pub fn fixture_count(&self) -> usize {
        self.bodies.iter().map(|(_, fixtures)| fixtures.len()).sum()
    }

    pub(crate) fn into_bodies(self) -> impl Iterator<Item = (RigidBody, Vec<Collider>)> {
        self.bodies.into_iter()
    }
}

impl BodySink for StagedGeometry {
    type Body = usize;

    fn insert_body(&mut self, body: RigidBody) -> usize {
        self.bodies.push((body, Vec::new()));
        self.bodies.len() - 1
    }

    fn insert_fixture(&mut self, fixture: Collider, body: usize) {
        if let Some((_, fixtures)) = self.bodies.get_mut(body) {
            fixtures.push(fixture);
        }
    }
}

impl std::fmt::Debug for StagedGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedGeometry")
            .field("bodies", &self.body_count())
            .field("fixtures", &self.fixture_count())
            .finish()
    }
}
