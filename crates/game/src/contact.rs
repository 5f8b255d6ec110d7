//! Turns physics contacts into game logic.
//!
//! Every contact is matched against a fixed table of category pairs. The
//! first row whose pair matches (in either order) handles it; contacts no row
//! matches are ignored.
//!
//! | first        | second              | began                          | ended                 |
//! |--------------|---------------------|--------------------------------|-----------------------|
//! | FEET         | GROUND, PLATFORM    | ground count +1                | ground count −1       |
//! | MELEE_WEAPON | PLAYER, ENEMY       | target in range, hit event     | target out of range   |
//! | FEET         | INTERACTABLE        | interact now, or show the hint | hide the hint         |
//! | FEET         | PORTAL              | same as INTERACTABLE           | same as INTERACTABLE  |
//! | FEET         | ITEM                | item nearby                    | item gone             |
//! | ENEMY        | CLIFF_MARKER        | at cliff edge                  | off cliff edge        |

use cragmoor_physics::{ActorId, CategoryBits, ContactEvent, ContactSide, FixtureTag, PhysicsWorld};
use tracing::trace;

use crate::actor::Character;
use crate::event::GameEvent;
use crate::interactable::{InteractContext, Interaction, Interactor};
use crate::map::GameMap;
use crate::state_store::InteractableStateStore;

/// An interaction caused by a contact, waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Actor whose fixture made the contact.
    pub user: ActorId,
    /// What it touched.
    pub source: FixtureTag,
    pub interaction: Interaction,
}

/// Everything a contact handler may read or change.
pub struct ContactContext<'a> {
    pub world: &'a PhysicsWorld,
    pub map: &'a mut GameMap,
    pub states: &'a mut InteractableStateStore,
    /// Interactions to apply once the contacts of this step are handled.
    pub outcomes: &'a mut Vec<Outcome>,
    pub events: &'a mut Vec<GameEvent>,
}

impl ContactContext<'_> {
    fn character_mut(&mut self, id: ActorId) -> Option<&mut Character> {
        self.map.registry_mut().get_mut(id)?.as_character_mut()
    }
}

/// Handler for one table row. `first` matched the row's first category.
type Handler = fn(first: FixtureTag, second: FixtureTag, began: bool, ctx: &mut ContactContext<'_>);

struct Rule {
    name: &'static str,
    first: CategoryBits,
    second: CategoryBits,
    handler: Handler,
}

/// Dispatches contacts through the rule table.
pub struct ContactResolver {
    rules: Vec<Rule>,
}

impl Default for ContactResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactResolver {
    pub fn new() -> Self {
        let rules = vec![
            Rule {
                name: "feet-ground",
                first: CategoryBits::FEET,
                second: CategoryBits::GROUND | CategoryBits::PLATFORM,
                handler: feet_ground,
            },
            Rule {
                name: "weapon-target",
                first: CategoryBits::MELEE_WEAPON,
                second: CategoryBits::PLAYER | CategoryBits::ENEMY,
                handler: weapon_target,
            },
            Rule {
                name: "feet-interactable",
                first: CategoryBits::FEET,
                second: CategoryBits::INTERACTABLE,
                handler: feet_interactable,
            },
            Rule {
                name: "feet-portal",
                first: CategoryBits::FEET,
                second: CategoryBits::PORTAL,
                handler: feet_interactable,
            },
            Rule {
                name: "feet-item",
                first: CategoryBits::FEET,
                second: CategoryBits::ITEM,
                handler: feet_item,
            },
            Rule {
                name: "enemy-cliff",
                first: CategoryBits::ENEMY,
                second: CategoryBits::CLIFF_MARKER,
                handler: enemy_cliff,
            },
        ];
        Self { rules }
    }

    /// Handle one contact. Returns `false` if no rule matched.
    pub fn resolve(&self, contact: &ContactEvent, ctx: &mut ContactContext<'_>) -> bool {
        for rule in &self.rules {
            let ordered = if matches(rule, contact.a, contact.b) {
                Some((contact.a, contact.b))
            } else if matches(rule, contact.b, contact.a) {
                Some((contact.b, contact.a))
            } else {
                None
            };

            if let Some((first, second)) = ordered {
                trace!(rule = rule.name, began = contact.began, ?first, ?second, "contact");
                (rule.handler)(first.tag, second.tag, contact.began, ctx);
                return true;
            }
        }

        trace!(
            a = contact.a.category.0,
            b = contact.b.category.0,
            began = contact.began,
            "unhandled contact"
        );
        false
    }

    pub fn resolve_all(&self, contacts: &[ContactEvent], ctx: &mut ContactContext<'_>) {
        for contact in contacts {
            self.resolve(contact, ctx);
        }
    }
}

fn matches(rule: &Rule, first: ContactSide, second: ContactSide) -> bool {
    first.category.intersects(rule.first) && second.category.intersects(rule.second)
}

// ============================================================================
// Handlers
// ============================================================================

fn feet_ground(feet: FixtureTag, _ground: FixtureTag, began: bool, ctx: &mut ContactContext<'_>) {
    let Some(character) = feet.actor().and_then(|id| ctx.character_mut(id)) else {
        return;
    };
    if began {
        character.begin_ground_contact();
    } else {
        character.end_ground_contact();
    }
}

fn weapon_target(weapon: FixtureTag, target: FixtureTag, began: bool, ctx: &mut ContactContext<'_>) {
    let (Some(attacker), Some(target)) = (weapon.actor(), target.actor()) else {
        return;
    };
    if began && !ctx.map.registry().contains(target) {
        return;
    }
    let Some(character) = ctx.character_mut(attacker) else {
        return;
    };
    if began {
        character.add_in_range_target(target);
        ctx.events.push(GameEvent::ActorHit { attacker, target });
    } else {
        character.remove_in_range_target(target);
    }
}

fn feet_interactable(feet: FixtureTag, target: FixtureTag, began: bool, ctx: &mut ContactContext<'_>) {
    let Some(user_id) = feet.actor() else {
        return;
    };
    let Some(user) = ctx.map.registry().get(user_id).map(|a| Interactor::of(user_id, a)) else {
        return;
    };
    let map_id = ctx.map.id().to_string();
    let position = ctx.map.tag_position(ctx.world, target);

    let Some(interactable) = ctx.map.interactable_mut(target) else {
        return;
    };

    if !began {
        if user.is_player {
            interactable.hide_hint_ui();
        }
        if let Some(character) = ctx.character_mut(user_id) {
            character.remove_interactable_target(target);
        }
        return;
    }

    if interactable.will_interact_on_contact() {
        let mut interact = InteractContext {
            map_id: &map_id,
            states: ctx.states,
            user: &user,
            position,
        };
        let interaction = interactable.on_interact(&mut interact);
        if interaction != Interaction::Nothing {
            ctx.outcomes.push(Outcome {
                user: user_id,
                source: target,
                interaction,
            });
        }
    } else {
        if user.is_player {
            interactable.show_hint_ui();
        }
        if let Some(character) = ctx.character_mut(user_id) {
            character.add_interactable_target(target);
        }
    }
}

fn feet_item(feet: FixtureTag, item: FixtureTag, began: bool, ctx: &mut ContactContext<'_>) {
    let (Some(user), Some(item)) = (feet.actor(), item.actor()) else {
        return;
    };
    if began && !ctx.map.registry().contains(item) {
        return;
    }
    let Some(character) = ctx.character_mut(user) else {
        return;
    };
    if began {
        character.add_nearby_item(item);
    } else {
        character.remove_nearby_item(item);
    }
}

fn enemy_cliff(enemy: FixtureTag, _marker: FixtureTag, began: bool, ctx: &mut ContactContext<'_>) {
    if let Some(character) = enemy.actor().and_then(|id| ctx.character_mut(id)) {
        character.at_cliff_edge = began;
    }
}
