//! Back-references from fixtures to the game objects that own them.
//!
//! Rapier gives every collider a `u128` of user data. We pack a [`FixtureTag`]
//! into it so contact events can be routed to the right trigger, portal or
//! actor without holding a pointer into game state.

use serde::{Deserialize, Serialize};

/// Generational index of a dynamic actor in a map's actor registry.
///
/// The generation changes every time a registry slot is reused, so a stale
/// id left behind in a collider never resolves to a different actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId {
    pub index: u32,
    pub generation: u32,
}

impl ActorId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Owner of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureTag {
    /// Static level geometry (ground, walls, platforms, cliff markers).
    Level,
    /// Trigger at this index within its map.
    Trigger(u32),
    /// Portal at this index within its map.
    Portal(u32),
    /// Dynamic actor.
    Actor(ActorId),
}

const KIND_SHIFT: u32 = 64;
const KIND_LEVEL: u128 = 1;
const KIND_TRIGGER: u128 = 2;
const KIND_PORTAL: u128 = 3;
const KIND_ACTOR: u128 = 4;

impl FixtureTag {
    /// Pack into collider user data. Zero is reserved for untagged colliders.
    pub fn to_user_data(self) -> u128 {
        let (kind, payload) = match self {
            FixtureTag::Level => (KIND_LEVEL, 0),
            FixtureTag::Trigger(index) => (KIND_TRIGGER, index as u64),
            FixtureTag::Portal(index) => (KIND_PORTAL, index as u64),
            FixtureTag::Actor(id) => (KIND_ACTOR, id.to_bits()),
        };
        (kind << KIND_SHIFT) | payload as u128
    }

    /// Unpack from collider user data. Returns `None` for untagged colliders.
    pub fn from_user_data(data: u128) -> Option<Self> {
        let payload = data as u64;
        match data >> KIND_SHIFT {
            KIND_LEVEL => Some(FixtureTag::Level),
            KIND_TRIGGER => Some(FixtureTag::Trigger(payload as u32)),
            KIND_PORTAL => Some(FixtureTag::Portal(payload as u32)),
            KIND_ACTOR => Some(FixtureTag::Actor(ActorId::from_bits(payload))),
            _ => None,
        }
    }

    /// The actor this fixture belongs to, if any.
    pub fn actor(self) -> Option<ActorId> {
        match self {
            FixtureTag::Actor(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_user_data() {
        assert_eq!(FixtureTag::from_user_data(0), None);
    }

    #[test]
    fn test_actor_tag_keeps_generation() {
        let id = ActorId::new(7, u32::MAX);
        let data = FixtureTag::Actor(id).to_user_data();
        assert_eq!(FixtureTag::from_user_data(data), Some(FixtureTag::Actor(id)));
        assert_ne!(
            FixtureTag::from_user_data(data),
            Some(FixtureTag::Actor(ActorId::new(7, 0)))
        );
    }

    #[test]
    fn test_index_tags_are_distinct() {
        let trigger = FixtureTag::Trigger(3).to_user_data();
        let portal = FixtureTag::Portal(3).to_user_data();
        assert_ne!(trigger, portal);
        assert_eq!(FixtureTag::from_user_data(portal), Some(FixtureTag::Portal(3)));
    }
}
