//! Game events the manager reports to the surrounding game (UI, audio).

use cragmoor_physics::ActorId;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// `target` entered the weapon range of `attacker`.
    ActorHit { attacker: ActorId, target: ActorId },
    /// The player wants to talk to this NPC.
    DialogueRequested { npc: ActorId },
    /// The player tried a locked portal without its key.
    PortalLocked { map: String, portal: u32 },
    /// Text printed by a trigger command.
    Message(String),
    MapLoaded { map: String },
    MapLoadFailed { map: String, reason: String },
    /// The player picked up items.
    ItemCollected { name: String, amount: u32 },
}
