//! Persistent flags of interactables that outlive the map hosting them.
//!
//! Portals and triggers are rebuilt every time their map is loaded. Whatever
//! must survive that (a portal the player unlocked, a one-shot trigger that
//! already fired) is kept here, keyed by map identifier and the
//! interactable's index within its map.
//!
//! The store is an ordinary value owned by the map manager and handed to the
//! code that needs it; there is no global instance.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::StateStoreError;

/// Which family of interactable an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InteractableKind {
    Portal,
    Trigger,
}

/// Identifies an interactable within one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractableKey {
    pub kind: InteractableKind,
    pub index: u32,
}

impl InteractableKey {
    pub const fn portal(index: u32) -> Self {
        Self {
            kind: InteractableKind::Portal,
            index,
        }
    }

    pub const fn trigger(index: u32) -> Self {
        Self {
            kind: InteractableKind::Trigger,
            index,
        }
    }
}

/// Map identifier → ordered (interactable, flag) pairs.
///
/// For portals the flag means "locked"; for triggers it means "has fired".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractableStateStore {
    maps: HashMap<String, BTreeMap<InteractableKey, bool>>,
}

impl InteractableStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, map: &str, key: InteractableKey) -> Option<bool> {
        self.maps.get(map)?.get(&key).copied()
    }

    pub fn set(&mut self, map: &str, key: InteractableKey, value: bool) {
        self.maps
            .entry(map.to_string())
            .or_default()
            .insert(key, value);
    }

    /// Saved lock state of a portal, if any was recorded.
    pub fn portal_locked(&self, map: &str, portal: u32) -> Option<bool> {
        self.get(map, InteractableKey::portal(portal))
    }

    pub fn set_portal_locked(&mut self, map: &str, portal: u32, locked: bool) {
        self.set(map, InteractableKey::portal(portal), locked);
    }

    /// Whether a trigger was recorded as fired.
    pub fn trigger_fired(&self, map: &str, trigger: u32) -> bool {
        self.get(map, InteractableKey::trigger(trigger))
            .unwrap_or(false)
    }

    pub fn set_trigger_fired(&mut self, map: &str, trigger: u32, fired: bool) {
        self.set(map, InteractableKey::trigger(trigger), fired);
    }

    /// All recorded entries of one map, in key order.
    pub fn entries<'a>(&'a self, map: &str) -> impl Iterator<Item = (InteractableKey, bool)> + 'a {
        self.maps
            .get(map)
            .into_iter()
            .flat_map(|entries| entries.iter().map(|(key, value)| (*key, *value)))
    }

    /// Total number of recorded entries across all maps.
    pub fn len(&self) -> usize {
        self.maps.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize for the surrounding game's save file.
    pub fn encode(&self) -> Result<Vec<u8>, StateStoreError> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Restore from bytes produced by [`InteractableStateStore::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, StateStoreError> {
        let (store, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
        Ok(store)
    }
}
