//! Rhai console running trigger commands.
//!
//! Commands are tiny Rhai scripts such as `lock_portal("maps/cave.json", 0)`.
//! The registered functions never touch game state; they queue
//! [`ConsoleEffect`]s which the map manager applies afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Engine, EvalAltResult};
use tracing::debug;

use crate::error::CommandError;

/// Something a command asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEffect {
    LockPortal { map: String, portal: u32 },
    UnlockPortal { map: String, portal: u32 },
    LoadMap(String),
    /// Spawn items next to the player.
    SpawnItem { descriptor: String, amount: u32 },
    Message(String),
}

type Effects = Rc<RefCell<Vec<ConsoleEffect>>>;

pub struct Console {
    engine: Engine,
    effects: Effects,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn index(value: i64, what: &str) -> Result<u32, Box<EvalAltResult>> {
    u32::try_from(value).map_err(|_| format!("{what} must be a non-negative integer, got {value}").into())
}

impl Console {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        let effects: Effects = Rc::default();

        let sink = effects.clone();
        engine.register_fn("lock_portal", move |map: &str, portal: i64| {
            let portal = index(portal, "portal")?;
            sink.borrow_mut().push(ConsoleEffect::LockPortal {
                map: map.to_string(),
                portal,
            });
            Ok::<_, Box<EvalAltResult>>(())
        });

        let sink = effects.clone();
        engine.register_fn("unlock_portal", move |map: &str, portal: i64| {
            let portal = index(portal, "portal")?;
            sink.borrow_mut().push(ConsoleEffect::UnlockPortal {
                map: map.to_string(),
                portal,
            });
            Ok::<_, Box<EvalAltResult>>(())
        });

        let sink = effects.clone();
        engine.register_fn("load_map", move |map: &str| {
            sink.borrow_mut()
                .push(ConsoleEffect::LoadMap(map.to_string()));
        });

        let sink = effects.clone();
        engine.register_fn("spawn_item", move |descriptor: &str, amount: i64| {
            let amount = index(amount, "amount")?;
            sink.borrow_mut().push(ConsoleEffect::SpawnItem {
                descriptor: descriptor.to_string(),
                amount,
            });
            Ok::<_, Box<EvalAltResult>>(())
        });

        let sink = effects.clone();
        engine.register_fn("message", move |text: &str| {
            sink.borrow_mut().push(ConsoleEffect::Message(text.to_string()));
        });

        Self { engine, effects }
    }

    /// Run one command and return the effects it queued.
    ///
    /// A failing command queues nothing, even if it got partway.
    pub fn run(&self, command: &str) -> Result<Vec<ConsoleEffect>, CommandError> {
        self.effects.borrow_mut().clear();
        let result = self.engine.run(command);
        let effects = std::mem::take(&mut *self.effects.borrow_mut());

        result.map_err(|err| CommandError {
            command: command.to_string(),
            message: err.to_string(),
        })?;
        debug!(command, effects = effects.len(), "command executed");
        Ok(effects)
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
