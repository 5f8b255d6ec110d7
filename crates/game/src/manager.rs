//! The map manager: owner of the physics world, the active map and
//! everything that outlives a single map.
//!
//! # Frame
//!
//! ```text
//! update(dt)
//!   ├─ poll pending map load ──► install new map, run after_loaded
//!   ├─ run due deferred callbacks (current generation only)
//!   ├─ step physics ──► contact resolver ──► outcomes
//!   └─ apply outcomes (console commands, transitions, item spawns, events)
//! ```
//!
//! # Map transitions
//!
//! [`MapManager::load_map`] hands reading, parsing and geometry staging to a
//! `map-loader` thread. The staged map comes back over a channel and is
//! installed by [`MapManager::update`] on the thread that owns the manager,
//! so the world is never touched while a step is running. Starting a
//! transition invalidates every deferred callback scheduled before it.

use std::any::Any;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cragmoor_physics::{ActorId, ContactEvent, FixtureTag, PhysicsWorld};
use glam::Vec2;
use tracing::{debug, error, info, warn};

use crate::actor::{Character, Item, Player};
use crate::callbacks::CallbackQueue;
use crate::config::ManagerConfig;
use crate::console::{Console, ConsoleEffect};
use crate::contact::{ContactContext, ContactResolver, Outcome};
use crate::error::MapError;
use crate::event::GameEvent;
use crate::interactable::{InteractContext, Interactable, Interaction, Interactor};
use crate::map::{GameMap, StagedMap};
use crate::registry::SceneChange;
use crate::source::AssetSource;
use crate::state_store::InteractableStateStore;

/// Horizontal gap between items spilled from one chest, in pixels.
const ITEM_SPREAD: f32 = 12.0;

/// Invoked once after a map has been installed and the player shown on it.
pub type AfterLoaded = Box<dyn FnOnce(&mut MapManager)>;

type Deferred = dyn FnOnce(&mut MapManager);

struct PendingLoad {
    map_id: String,
    arrival_portal: Option<u32>,
    after_loaded: Option<AfterLoaded>,
    receiver: Receiver<Result<StagedMap, MapError>>,
    worker: JoinHandle<()>,
}

pub struct MapManager {
    config: ManagerConfig,
    assets: Arc<dyn AssetSource>,
    world: PhysicsWorld,
    resolver: ContactResolver,
    map: Option<GameMap>,

    /// The player while shown on the active map.
    player: Option<ActorId>,

    /// The player between leaving one map and appearing on the next.
    detached_player: Option<Box<Player>>,

    /// Portal the player arrived through. Contact with it is ignored until
    /// the player steps off, so touch-activated portals do not bounce the
    /// player straight back.
    arrival_portal: Option<u32>,

    states: InteractableStateStore,
    callbacks: CallbackQueue<Deferred>,
    console: Console,
    pending: Option<PendingLoad>,
    events: Vec<GameEvent>,
    scene_changes: Vec<SceneChange>,
}

impl MapManager {
    pub fn new(config: ManagerConfig, assets: Arc<dyn AssetSource>) -> Self {
        let world = PhysicsWorld::new(config.gravity, config.pixels_per_meter);
        Self {
            config,
            assets,
            world,
            resolver: ContactResolver::new(),
            map: None,
            player: None,
            detached_player: None,
            arrival_portal: None,
            states: InteractableStateStore::new(),
            callbacks: CallbackQueue::new(),
            console: Console::new(),
            pending: None,
            events: Vec::new(),
            scene_changes: Vec::new(),
        }
    }

    /// Start from previously saved interactable state.
    pub fn with_states(mut self, states: InteractableStateStore) -> Self {
        self.states = states;
        self
    }

    // ========================================================================
    // Map loading
    // ========================================================================

    /// Switch to the map `id` in the background.
    ///
    /// Once the map is installed and the player shown on it, `after_loaded`
    /// runs exactly once from [`MapManager::update`]. If loading fails the
    /// current map stays active and `after_loaded` is dropped.
    pub fn load_map(
        &mut self,
        id: &str,
        after_loaded: impl FnOnce(&mut MapManager) + 'static,
    ) -> Result<(), MapError> {
        self.begin_load(id, None, Some(Box::new(after_loaded)))
    }

    /// Load and install the map `id` on the calling thread.
    pub fn load_map_blocking(&mut self, id: &str) -> Result<(), MapError> {
        if self.pending.is_some() {
            warn!(map = id, "map transition already in progress");
            return Err(MapError::TransitionInProgress);
        }
        self.callbacks.invalidate();

        match stage(self.assets.as_ref(), id, self.config.pixels_per_meter) {
            Ok(staged) => {
                self.finish_load(staged, None);
                Ok(())
            }
            Err(err) => {
                self.fail_load(id, &err);
                Err(err)
            }
        }
    }

    fn begin_load(
        &mut self,
        id: &str,
        arrival_portal: Option<u32>,
        after_loaded: Option<AfterLoaded>,
    ) -> Result<(), MapError> {
        if self.pending.is_some() {
            warn!(map = id, "map transition already in progress");
            return Err(MapError::TransitionInProgress);
        }
        self.callbacks.invalidate();

        let (sender, receiver) = mpsc::channel();
        let assets = Arc::clone(&self.assets);
        let map_id = id.to_string();
        let ppm = self.config.pixels_per_meter;
        let worker = thread::Builder::new()
            .name("map-loader".to_string())
            .spawn(move || {
                let result = stage(assets.as_ref(), &map_id, ppm);
                // The manager may be gone by now; nobody is left to tell.
                let _ = sender.send(result);
            })
            .map_err(MapError::Spawn)?;

        info!(map = id, ?arrival_portal, "loading map");
        self.pending = Some(PendingLoad {
            map_id: id.to_string(),
            arrival_portal,
            after_loaded,
            receiver,
            worker,
        });
        Ok(())
    }

    fn poll_load(&mut self) -> Result<(), MapError> {
        let Some(pending) = self.pending.as_ref() else {
            return Ok(());
        };
        let received = match pending.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Disconnected) => None,
        };
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let result = match received {
            Some(result) => result,
            None => Err(worker_lost(&pending.map_id, pending.worker)),
        };

        match result {
            Ok(staged) => {
                self.finish_load(staged, pending.arrival_portal);
                if let Some(after_loaded) = pending.after_loaded {
                    after_loaded(self);
                }
                Ok(())
            }
            Err(err) => {
                self.fail_load(&pending.map_id, &err);
                Err(err)
            }
        }
    }

    /// Retire the current map and install `staged` in its place.
    fn finish_load(&mut self, staged: StagedMap, arrival_portal: Option<u32>) {
        self.callbacks.invalidate();
        self.detach_player();

        if let Some(mut old) = self.map.take() {
            old.delete_objects(&mut self.world, &mut self.states);
            self.scene_changes.extend(old.registry_mut().drain_changes());
        }

        let mut map = staged.install(&mut self.world);
        map.create_objects(&mut self.world, &mut self.states, self.assets.as_ref());

        let arrival = arrival_portal.and_then(|index| {
            let position = map.portal_position(index);
            if position.is_none() {
                warn!(map = map.id(), portal = index, "arrival portal missing, using spawn");
            }
            position.map(|p| (index, p))
        });
        let spawn = arrival.map_or_else(|| map.player_spawn(), |(_, p)| p);
        self.arrival_portal = arrival.map(|(index, _)| index);

        let player = self
            .detached_player
            .take()
            .unwrap_or_else(|| Box::new(Player::new(self.config.player_name.clone())));
        self.player = map.registry_mut().show(&mut self.world, player, spawn.x, spawn.y);
        if self.player.is_none() {
            error!(map = map.id(), "player could not be shown");
        }

        info!(map = map.id(), x = spawn.x, y = spawn.y, "map loaded");
        self.events.push(GameEvent::MapLoaded {
            map: map.id().to_string(),
        });
        self.map = Some(map);
        self.collect_scene_changes();
    }

    fn fail_load(&mut self, map_id: &str, err: &MapError) {
        error!(map = map_id, error = %err, "map load failed");
        self.events.push(GameEvent::MapLoadFailed {
            map: map_id.to_string(),
            reason: err.to_string(),
        });
    }

    /// Take the player off the current map, keeping ownership of it.
    fn detach_player(&mut self) {
        let (Some(map), Some(id)) = (self.map.as_mut(), self.player.take()) else {
            return;
        };
        match map.registry_mut().remove::<Player>(&mut self.world, id) {
            Some(player) => self.detached_player = Some(player),
            None => warn!(%id, "player was not on the map"),
        }
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Advance one frame of `dt` seconds.
    ///
    /// A map load that failed during this frame is reported here; the rest
    /// of the frame still runs on the previous map.
    pub fn update(&mut self, dt: f32) -> Result<(), MapError> {
        let load = self.poll_load();
        self.run_callbacks(dt);

        let contacts = self.world.step(dt);
        self.handle_contacts(&contacts);

        self.collect_scene_changes();
        load
    }

    /// Run `callback` on the main thread after `delay` seconds, unless a map
    /// transition starts first.
    pub fn schedule(&mut self, delay: f32, callback: impl FnOnce(&mut MapManager) + 'static) {
        self.callbacks.schedule(delay, Box::new(callback));
    }

    fn run_callbacks(&mut self, dt: f32) {
        for (generation, callback) in self.callbacks.advance(dt) {
            if generation != self.callbacks.generation() {
                debug!(generation, "dropping stale callback");
                continue;
            }
            callback(self);
        }
    }

    fn handle_contacts(&mut self, contacts: &[ContactEvent]) {
        let Some(map) = self.map.as_mut() else {
            return;
        };

        let mut outcomes = Vec::new();
        let mut ctx = ContactContext {
            world: &self.world,
            map,
            states: &mut self.states,
            outcomes: &mut outcomes,
            events: &mut self.events,
        };
        self.resolver.resolve_all(contacts, &mut ctx);

        if let Some(index) = self.arrival_portal {
            let portal = FixtureTag::Portal(index);
            outcomes.retain(|o| o.source != portal);
            let left = contacts
                .iter()
                .any(|c| !c.began && (c.a.tag == portal || c.b.tag == portal));
            if left {
                self.arrival_portal = None;
            }
        }

        for outcome in outcomes {
            self.apply_outcome(outcome);
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome.interaction {
            Interaction::Nothing => {}
            Interaction::RunCommands(commands) => {
                for command in &commands {
                    self.run_command(command);
                }
            }
            Interaction::Transition {
                target_map,
                target_portal,
            } => {
                if Some(outcome.user) != self.player {
                    return;
                }
                if let Err(err) = self.begin_load(&target_map, Some(target_portal), None) {
                    warn!(map = %target_map, error = %err, "portal transition refused");
                }
            }
            Interaction::SpawnItems { descriptors, x, y } => {
                self.spawn_items(&descriptors, 1, Vec2::new(x, y));
            }
            Interaction::Dialogue { npc } => {
                self.events.push(GameEvent::DialogueRequested { npc });
            }
            Interaction::PortalLocked { portal } => {
                let map = self.map.as_ref().map(|m| m.id().to_string()).unwrap_or_default();
                self.events.push(GameEvent::PortalLocked { map, portal });
            }
        }
    }

    fn run_command(&mut self, command: &str) {
        match self.console.run(command) {
            Ok(effects) => {
                for effect in effects {
                    self.apply_effect(effect);
                }
            }
            Err(err) => warn!(error = %err, "trigger command failed"),
        }
    }

    fn apply_effect(&mut self, effect: ConsoleEffect) {
        match effect {
            ConsoleEffect::LockPortal { map, portal } => self.set_portal_locked(&map, portal, true),
            ConsoleEffect::UnlockPortal { map, portal } => {
                self.set_portal_locked(&map, portal, false)
            }
            ConsoleEffect::LoadMap(map) => {
                if let Err(err) = self.begin_load(&map, None, None) {
                    warn!(%map, error = %err, "load_map command refused");
                }
            }
            ConsoleEffect::SpawnItem { descriptor, amount } => {
                let at = self
                    .player
                    .and_then(|id| self.actor_position(id))
                    .or_else(|| self.map.as_ref().map(GameMap::player_spawn))
                    .unwrap_or_default();
                self.spawn_items(&[descriptor], amount, at);
            }
            ConsoleEffect::Message(text) => {
                info!(%text, "message");
                self.events.push(GameEvent::Message(text));
            }
        }
    }

    fn spawn_items(&mut self, descriptors: &[String], amount: u32, at: Vec2) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        for (i, descriptor) in descriptors.iter().enumerate() {
            let x = at.x + i as f32 * ITEM_SPREAD;
            match map.create_item(&mut self.world, self.assets.as_ref(), descriptor, x, at.y, amount) {
                Ok(id) => debug!(%descriptor, %id, "item spawned"),
                Err(err) => warn!(%descriptor, error = %err, "item not spawned"),
            }
        }
    }

    fn collect_scene_changes(&mut self) {
        if let Some(map) = self.map.as_mut() {
            self.scene_changes.extend(map.registry_mut().drain_changes());
        }
    }

    // ========================================================================
    // Player actions
    // ========================================================================

    /// Use portal `index` of the active map as the player.
    ///
    /// A locked portal the player has no key for reports
    /// [`GameEvent::PortalLocked`] and stays put.
    pub fn enter_portal(&mut self, index: u32) -> Result<(), MapError> {
        let map = self.map.as_mut().ok_or(MapError::NoActiveMap)?;
        let map_id = map.id().to_string();
        let player = self.player.ok_or_else(|| MapError::Invalid {
            map: map_id.clone(),
            reason: "player is not on the map".to_string(),
        })?;
        let user = map
            .registry()
            .get(player)
            .map(|actor| Interactor::of(player, actor))
            .ok_or_else(|| MapError::Invalid {
                map: map_id.clone(),
                reason: format!("player {player} is not registered"),
            })?;
        let portal = map.portal_mut(index).ok_or_else(|| MapError::Invalid {
            map: map_id.clone(),
            reason: format!("no portal {index}"),
        })?;

        let position = Some(portal.position());
        let mut ctx = InteractContext {
            map_id: &map_id,
            states: &mut self.states,
            user: &user,
            position,
        };
        let interaction = portal.on_interact(&mut ctx);
        match interaction {
            Interaction::Transition {
                target_map,
                target_portal,
            } => self.begin_load(&target_map, Some(target_portal), None),
            Interaction::PortalLocked { portal } => {
                self.events.push(GameEvent::PortalLocked { map: map_id, portal });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Interact with whatever the player touched last. Returns `false` when
    /// there was nothing to do.
    pub fn interact(&mut self) -> bool {
        let (Some(player), Some(map)) = (self.player, self.map.as_mut()) else {
            return false;
        };
        let Some(actor) = map.registry().get(player) else {
            return false;
        };
        let user = Interactor::of(player, actor);
        let Some(target) = actor
            .as_character()
            .and_then(Character::current_interactable_target)
        else {
            return false;
        };

        let map_id = map.id().to_string();
        let position = map.tag_position(&self.world, target);
        let Some(interactable) = map.interactable_mut(target) else {
            return false;
        };
        let mut ctx = InteractContext {
            map_id: &map_id,
            states: &mut self.states,
            user: &user,
            position,
        };
        let interaction = interactable.on_interact(&mut ctx);
        if interaction == Interaction::Nothing {
            return false;
        }
        self.apply_outcome(Outcome {
            user: player,
            source: target,
            interaction,
        });
        true
    }

    /// Move every item under the player's feet into the inventory. Returns
    /// how many stacks were picked up.
    pub fn collect_nearby_items(&mut self) -> usize {
        let (Some(player), Some(map)) = (self.player, self.map.as_mut()) else {
            return 0;
        };
        let nearby = map
            .registry()
            .get(player)
            .and_then(|actor| actor.as_character())
            .map(|character| character.nearby_items().to_vec())
            .unwrap_or_default();

        let mut collected = 0;
        for id in nearby {
            let item = map.registry_mut().remove::<Item>(&mut self.world, id);
            let Some(carrier) = map.registry_mut().get_as_mut::<Player>(player) else {
                break;
            };
            carrier.character.remove_nearby_item(id);

            if let Some(item) = item {
                let (profile, amount) = (*item).into_parts();
                info!(item = %profile.name, amount, "item collected");
                self.events.push(GameEvent::ItemCollected {
                    name: profile.name.clone(),
                    amount,
                });
                carrier.add_item(profile, amount);
                collected += 1;
            }
        }
        collected
    }

    /// Lock or unlock a portal of any map. Applies to the live portal when
    /// that map is active, otherwise only to the stored state.
    pub fn set_portal_locked(&mut self, map_id: &str, portal: u32, locked: bool) {
        let live = self
            .map
            .as_mut()
            .filter(|map| map.id() == map_id)
            .and_then(|map| map.portal_mut(portal));
        match live {
            Some(p) if locked => p.lock(map_id, &mut self.states),
            Some(p) => p.unlock(map_id, &mut self.states),
            None => self.states.set_portal_locked(map_id, portal, locked),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn map(&self) -> Option<&GameMap> {
        self.map.as_ref()
    }

    pub fn player(&self) -> Option<ActorId> {
        self.player
    }

    pub fn player_actor(&self) -> Option<&Player> {
        self.map.as_ref()?.registry().get_as::<Player>(self.player?)
    }

    /// Position of an actor on the active map, in world pixels.
    pub fn actor_position(&self, id: ActorId) -> Option<Vec2> {
        self.map.as_ref()?.registry().get(id)?.position(&self.world)
    }

    pub fn states(&self) -> &InteractableStateStore {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut InteractableStateStore {
        &mut self.states
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Current deferred-callback generation; advances with every transition.
    pub fn generation(&self) -> u64 {
        self.callbacks.generation()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn drain_scene_changes(&mut self) -> Vec<SceneChange> {
        std::mem::take(&mut self.scene_changes)
    }
}

impl std::fmt::Debug for MapManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapManager")
            .field("map", &self.map.as_ref().map(GameMap::id))
            .field("player", &self.player)
            .field("loading", &self.pending.as_ref().map(|p| p.map_id.as_str()))
            .field("world", &self.world)
            .finish_non_exhaustive()
    }
}

/// Explain why the loader for `map_id` hung up without sending a result.
fn worker_lost(map_id: &str, worker: JoinHandle<()>) -> MapError {
    let reason = match worker.join() {
        Ok(()) => "loader exited".to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    MapError::WorkerLost {
        map: map_id.to_string(),
        reason,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "loader panicked".to_string()
    }
}

/// Read, parse and stage a map. Runs on the loader thread.
fn stage(assets: &dyn AssetSource, id: &str, ppm: f32) -> Result<StagedMap, MapError> {
    let text = assets.read(id)?;
    GameMap::stage(id, &text, ppm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorKind, Chest, DynamicActor};
    use crate::testing::{self, CAVE, TOWN};
    use cragmoor_physics::{CategoryBits, ContactSide};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    const DT: f32 = 1.0 / 60.0;

    fn manager() -> MapManager {
        MapManager::new(ManagerConfig::default(), Arc::new(testing::assets()))
    }

    fn town() -> MapManager {
        let mut m = manager();
        m.load_map_blocking(TOWN).unwrap();
        m
    }

    /// Drive frames until the pending load resolves.
    fn finish_loading(m: &mut MapManager) -> Result<(), MapError> {
        for _ in 0..2000 {
            m.update(DT)?;
            if !m.is_loading() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("map load never finished");
    }

    fn near(a: Option<Vec2>, b: Vec2) -> bool {
        a.is_some_and(|a| a.distance(b) < 2.0)
    }

    fn touch(m: &mut MapManager, category: CategoryBits, tag: FixtureTag, began: bool) {
        let feet = ContactSide {
            category: CategoryBits::FEET,
            tag: FixtureTag::Actor(m.player().unwrap()),
        };
        let other = ContactSide { category, tag };
        m.handle_contacts(&[ContactEvent {
            a: feet,
            b: other,
            began,
        }]);
    }

    fn only(m: &MapManager, kind: ActorKind) -> Vec<ActorId> {
        m.map().unwrap().registry().ids_of(kind)
    }

    #[test]
    fn test_blocking_load_shows_player_at_spawn() {
        let mut m = town();
        assert_eq!(m.map().unwrap().id(), TOWN);
        let player = m.player().unwrap();
        assert!(near(m.actor_position(player), Vec2::new(48.0, 40.0)));
        assert_eq!(m.player_actor().unwrap().name(), "Player");
        assert_eq!(
            m.drain_events(),
            vec![GameEvent::MapLoaded {
                map: TOWN.to_string()
            }]
        );
    }

    #[test]
    fn test_load_map_replaces_actors_then_runs_callback_once() {
        let mut m = town();
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(None));

        let (c, s) = (calls.clone(), seen.clone());
        m.load_map(CAVE, move |m| {
            c.set(c.get() + 1);
            let player = m.player().and_then(|id| m.actor_position(id));
            let npcs = m.world().count_fixtures(CategoryBits::NPC);
            *s.borrow_mut() = Some((m.map().map(|map| map.id().to_string()), player, npcs));
        })
        .unwrap();
        assert!(m.is_loading());
        finish_loading(&mut m).unwrap();

        let (map, player, npcs) = seen.borrow_mut().take().unwrap();
        assert_eq!(map.as_deref(), Some(CAVE));
        assert!(near(player, Vec2::new(32.0, 40.0)));
        assert_eq!(npcs, 0);
        assert_eq!(m.world().count_fixtures(CategoryBits::ENEMY), 2);
        assert!(only(&m, ActorKind::Chest).is_empty());

        for _ in 0..10 {
            m.update(DT).unwrap();
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_load_keeps_previous_map() {
        let mut m = town();
        let bodies = m.world().body_count();
        let called = Rc::new(Cell::new(false));

        let c = called.clone();
        m.load_map("maps/missing.json", move |_| c.set(true)).unwrap();
        let err = finish_loading(&mut m).unwrap_err();
        assert!(matches!(err, MapError::Asset(_)));

        assert!(!m.is_loading());
        assert!(!called.get());
        assert_eq!(m.map().unwrap().id(), TOWN);
        assert!(m.player_actor().is_some());
        assert_eq!(m.world().body_count(), bodies);
        assert!(m
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::MapLoadFailed { map, .. } if map == "maps/missing.json")));
    }

    #[test]
    fn test_overlapping_transitions_are_rejected() {
        let mut m = town();
        m.load_map(CAVE, |_| {}).unwrap();
        assert!(matches!(
            m.load_map(TOWN, |_| {}),
            Err(MapError::TransitionInProgress)
        ));
        assert!(matches!(
            m.load_map_blocking(TOWN),
            Err(MapError::TransitionInProgress)
        ));
        finish_loading(&mut m).unwrap();
        assert_eq!(m.map().unwrap().id(), CAVE);
    }

    #[test]
    fn test_deferred_callbacks_do_not_survive_transition() {
        let mut m = town();
        let ran = Rc::new(Cell::new(0));

        let r = ran.clone();
        m.schedule(0.0, move |_| r.set(r.get() + 1));
        let r = ran.clone();
        m.schedule(0.5, move |_| r.set(r.get() + 10));
        let generation = m.generation();

        m.load_map(CAVE, |_| {}).unwrap();
        finish_loading(&mut m).unwrap();
        for _ in 0..60 {
            m.update(DT).unwrap();
        }
        assert_eq!(ran.get(), 0);
        assert!(m.generation() > generation);
    }

    #[test]
    fn test_deferred_callback_runs_without_transition() {
        let mut m = town();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        m.schedule(0.05, move |m| r.set(m.map().is_some()));

        m.update(DT).unwrap();
        assert!(!ran.get());
        for _ in 0..3 {
            m.update(DT).unwrap();
        }
        assert!(ran.get());
    }

    #[test]
    fn test_callback_scheduled_after_load_runs() {
        let mut m = town();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        m.load_map(CAVE, move |m| m.schedule(0.0, move |_| r.set(true)))
            .unwrap();
        finish_loading(&mut m).unwrap();
        m.update(DT).unwrap();
        assert!(ran.get());
    }

    #[test]
    fn test_portal_lock_survives_round_trip() {
        let mut m = town();
        assert!(m.map().unwrap().portal(0).unwrap().is_locked());

        m.set_portal_locked(TOWN, 0, false);
        m.load_map_blocking(CAVE).unwrap();
        assert_eq!(m.states().portal_locked(TOWN, 0), Some(false));

        m.load_map_blocking(TOWN).unwrap();
        assert!(!m.map().unwrap().portal(0).unwrap().is_locked());
    }

    #[test]
    fn test_locked_portal_without_key() {
        let mut m = town();
        m.drain_events();
        m.enter_portal(0).unwrap();
        assert!(!m.is_loading());
        assert_eq!(
            m.drain_events(),
            vec![GameEvent::PortalLocked {
                map: TOWN.to_string(),
                portal: 0
            }]
        );
        assert!(matches!(m.enter_portal(7), Err(MapError::Invalid { .. })));
    }

    #[test]
    fn test_chest_key_opens_portal() {
        let mut m = town();
        let chest = only(&m, ActorKind::Chest)[0];

        touch(&mut m, CategoryBits::INTERACTABLE, FixtureTag::Actor(chest), true);
        assert!(m.interact());
        assert!(m.map().unwrap().registry().get_as::<Chest>(chest).unwrap().is_opened());
        assert!(!m.interact(), "chest opened twice");

        let items = only(&m, ActorKind::Item);
        assert_eq!(items.len(), 3);
        for item in items {
            touch(&mut m, CategoryBits::ITEM, FixtureTag::Actor(item), true);
        }
        assert_eq!(m.collect_nearby_items(), 3);
        assert!(only(&m, ActorKind::Item).is_empty());
        let player = m.player_actor().unwrap();
        assert_eq!(player.item_amount("Potion"), 3);
        assert_eq!(player.keys(), vec!["Rusty Key".to_string()]);
        assert!(player.character.nearby_items().is_empty());

        m.enter_portal(0).unwrap();
        assert!(m.is_loading());
        assert_eq!(m.states().portal_locked(TOWN, 0), Some(false));
        finish_loading(&mut m).unwrap();

        assert_eq!(m.map().unwrap().id(), CAVE);
        let player = m.player().unwrap();
        assert!(near(m.actor_position(player), Vec2::new(288.0, 32.0)));
        assert_eq!(m.player_actor().unwrap().keys(), vec!["Rusty Key".to_string()]);
    }

    #[test]
    fn test_arrival_portal_does_not_bounce_back() {
        let mut m = town();
        m.enter_portal(1).unwrap();
        finish_loading(&mut m).unwrap();
        assert_eq!(m.map().unwrap().id(), CAVE);

        touch(&mut m, CategoryBits::PORTAL, FixtureTag::Portal(0), true);
        assert!(!m.is_loading());

        touch(&mut m, CategoryBits::PORTAL, FixtureTag::Portal(0), false);
        touch(&mut m, CategoryBits::PORTAL, FixtureTag::Portal(0), true);
        assert!(m.is_loading());
        finish_loading(&mut m).unwrap();
        assert_eq!(m.map().unwrap().id(), TOWN);
        let player = m.player().unwrap();
        assert!(near(m.actor_position(player), Vec2::new(408.0, 32.0)));
    }

    #[test]
    fn test_trigger_runs_commands_once() {
        let mut m = town();
        m.drain_events();

        touch(&mut m, CategoryBits::INTERACTABLE, FixtureTag::Trigger(0), true);
        assert_eq!(
            m.drain_events(),
            vec![GameEvent::Message("welcome".to_string())]
        );
        assert_eq!(m.states().portal_locked(CAVE, 0), Some(true));

        touch(&mut m, CategoryBits::INTERACTABLE, FixtureTag::Trigger(0), false);
        touch(&mut m, CategoryBits::INTERACTABLE, FixtureTag::Trigger(0), true);
        assert!(m.drain_events().is_empty());

        m.load_map_blocking(CAVE).unwrap();
        m.load_map_blocking(TOWN).unwrap();
        assert!(m.map().unwrap().trigger(0).unwrap().has_triggered());
    }

    #[test]
    fn test_npc_dialogue() {
        let mut m = town();
        let npc = only(&m, ActorKind::Npc)[0];
        touch(&mut m, CategoryBits::INTERACTABLE, FixtureTag::Actor(npc), true);
        m.drain_events();
        assert!(m.interact());
        assert_eq!(m.drain_events(), vec![GameEvent::DialogueRequested { npc }]);
    }

    #[test]
    fn test_player_reaches_npc_through_physics() {
        let mut m = town();
        let npc = only(&m, ActorKind::Npc)[0];
        for _ in 0..120 {
            m.update(DT).unwrap();
        }
        let npc_at = m.actor_position(npc).unwrap();
        let player_body = m.player_actor().unwrap().character.body().unwrap();
        let ppm = m.config().pixels_per_meter;
        m.world.set_body_position(player_body, npc_at / ppm);
        for _ in 0..10 {
            m.update(DT).unwrap();
        }

        let target = m.player_actor().unwrap().character.current_interactable_target();
        assert_eq!(target, Some(FixtureTag::Actor(npc)));
        m.drain_events();
        assert!(m.interact());
        assert_eq!(m.drain_events(), vec![GameEvent::DialogueRequested { npc }]);
    }

    #[test]
    fn test_loader_panic_is_reported() {
        struct Exploding;

        impl AssetSource for Exploding {
            fn read(&self, id: &str) -> Result<String, crate::error::AssetError> {
                panic!("cannot read {id}");
            }
        }

        let mut m = MapManager::new(ManagerConfig::default(), Arc::new(Exploding));
        m.load_map(TOWN, |_| {}).unwrap();
        match finish_loading(&mut m) {
            Err(MapError::WorkerLost { map, reason }) => {
                assert_eq!(map, TOWN);
                assert!(reason.contains("cannot read maps/town.json"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(m.map().is_none());
        assert!(!m.is_loading());
    }

    #[test]
    fn test_scene_changes_follow_transitions() {
        let mut m = town();
        let attached = m.drain_scene_changes();
        // npc, chest, enemy, item, player
        assert_eq!(attached.len(), 5);
        let player = m.player().unwrap();
        assert!(attached.contains(&SceneChange::Attached {
            id: player,
            kind: ActorKind::Player
        }));

        m.load_map_blocking(CAVE).unwrap();
        let changes = m.drain_scene_changes();
        let detached = changes
            .iter()
            .filter(|c| matches!(c, SceneChange::Detached { .. }))
            .count();
        assert_eq!(detached, 5);
        assert!(changes.contains(&SceneChange::Detached { id: player }));
    }

    #[test]
    fn test_saved_states_are_used() {
        let mut states = InteractableStateStore::new();
        states.set_portal_locked(TOWN, 0, false);
        let mut m = MapManager::new(ManagerConfig::default(), Arc::new(testing::assets()))
            .with_states(states);
        m.load_map_blocking(TOWN).unwrap();
        assert!(!m.map().unwrap().portal(0).unwrap().is_locked());
    }

    #[test]
    fn test_player_falls_onto_ground() {
        let mut m = town();
        let player = m.player().unwrap();
        for _ in 0..120 {
            m.update(DT).unwrap();
        }
        assert!(m.player_actor().unwrap().character.is_on_ground());
        let y = m.actor_position(player).unwrap().y;
        assert!((y - 32.0).abs() < 4.0, "player rests on the ground, y = {y}");
    }
}
