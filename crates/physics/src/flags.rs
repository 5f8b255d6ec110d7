//! Collision category bits.
//!
//! Every fixture carries a category (what it is) and a mask (what it is
//! allowed to touch). The contact resolver dispatches on the category bits of
//! both sides of a contact, so each logical kind of fixture gets its own bit.

use rapier2d::prelude::{Group, InteractionGroups};
use serde::{Deserialize, Serialize};

/// Category bits describing what a fixture is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CategoryBits(pub u32);

impl CategoryBits {
    /// No category. Fixtures with no category never collide.
    pub const NONE: Self = Self(0);

    /// Walkable ground geometry.
    pub const GROUND: Self = Self(1 << 0);

    /// Player body.
    pub const PLAYER: Self = Self(1 << 1);

    /// Enemy body.
    pub const ENEMY: Self = Self(1 << 2);

    /// Non-player character body.
    pub const NPC: Self = Self(1 << 3);

    /// Solid wall geometry.
    pub const WALL: Self = Self(1 << 4);

    /// One-way platform geometry.
    pub const PLATFORM: Self = Self(1 << 5);

    /// Map transition volume. Portals are dispatched as interactables but keep
    /// their own bit so masks can single them out.
    pub const PORTAL: Self = Self(1 << 6);

    /// Invisible marker at ledges; enemies turn around on contact.
    pub const CLIFF_MARKER: Self = Self(1 << 7);

    /// Foot sensor under a character.
    pub const FEET: Self = Self(1 << 8);

    /// Melee weapon reach sensor.
    pub const MELEE_WEAPON: Self = Self(1 << 9);

    /// Item lying on the map.
    pub const ITEM: Self = Self(1 << 10);

    /// Anything that reacts to a character standing in it (triggers, chests,
    /// NPCs, portals).
    pub const INTERACTABLE: Self = Self(1 << 11);

    /// Everything a character body rests on or is blocked by.
    pub const MASK_TERRAIN: Self = Self(Self::GROUND.0 | Self::PLATFORM.0 | Self::WALL.0);

    /// Everything a character's feet sensor reports.
    pub const MASK_FEET: Self = Self(
        Self::GROUND.0 | Self::PLATFORM.0 | Self::INTERACTABLE.0 | Self::PORTAL.0 | Self::ITEM.0,
    );

    /// Any character body.
    pub const MASK_CHARACTER: Self = Self(Self::PLAYER.0 | Self::ENEMY.0 | Self::NPC.0);

    /// Check if these bits contain all of `other`.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any of the given bits are set.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Combine two sets of bits.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Build rapier interaction groups from a category and mask pair.
    pub fn groups(self, mask: CategoryBits) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.0),
            Group::from_bits_truncate(mask.0),
        )
    }

    /// Recover the category from rapier interaction groups.
    pub fn from_groups(groups: InteractionGroups) -> Self {
        Self(groups.memberships.bits())
    }
}

impl std::ops::BitOr for CategoryBits {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for CategoryBits {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_operations() {
        let combined = CategoryBits::GROUND | CategoryBits::WALL;

        assert!(combined.contains(CategoryBits::GROUND));
        assert!(combined.contains(CategoryBits::WALL));
        assert!(!combined.contains(CategoryBits::PLATFORM));
        assert!(combined.intersects(CategoryBits::MASK_TERRAIN));
        assert!(!combined.intersects(CategoryBits::FEET));
    }

    #[test]
    fn test_groups_roundtrip_category() {
        let groups = CategoryBits::FEET.groups(CategoryBits::MASK_FEET);
        assert_eq!(CategoryBits::from_groups(groups), CategoryBits::FEET);
        assert_eq!(groups.filter.bits(), CategoryBits::MASK_FEET.0);
    }

    #[test]
    fn test_feet_mask() {
        let mask = CategoryBits::MASK_FEET;
        assert!(mask.contains(CategoryBits::GROUND));
        assert!(mask.contains(CategoryBits::INTERACTABLE));
        assert!(!mask.contains(CategoryBits::WALL));
    }
}
