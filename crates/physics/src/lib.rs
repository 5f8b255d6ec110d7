//! Cragmoor Physics
//!
//! Thin layer over rapier2d shared by every map of the game:
//!
//! - **Categories**: [`CategoryBits`] name every kind of fixture so contacts
//!   can be routed by what touched what
//! - **Tags**: [`FixtureTag`] packs a non-owning back-reference to the owning
//!   game object into each collider's user data
//! - **Builders**: [`BodyBuilder`] and [`FixtureBuilder`] describe bodies and
//!   fixtures and commit them to a [`BodySink`]; [`StagedGeometry`] is a sink
//!   that can be filled off the main thread
//! - **World**: [`PhysicsWorld`] steps the simulation and reports
//!   [`ContactEvent`]s
//!
//! Positions handed to the builders are in pixels; the world itself works in
//! meters.

pub mod builder;
pub mod flags;
pub mod tag;
pub mod world;

pub use builder::{BodyBuilder, BodySink, BodyType, BuildError, FixtureBuilder, StagedGeometry};
pub use flags::CategoryBits;
pub use tag::{ActorId, FixtureTag};
pub use world::{ContactEvent, ContactSide, FixtureInfo, PhysicsWorld};

pub use rapier2d::prelude::RigidBodyHandle;
