//! Deferred main-thread callbacks.
//!
//! Callbacks are tagged with the generation current when they were
//! scheduled. [`CallbackQueue::invalidate`] drops everything pending and
//! moves to a new generation, and callers skip due callbacks whose
//! generation is no longer current, so nothing scheduled against one map can
//! run once the next map is being installed.

struct Pending<T: ?Sized> {
    remaining: f32,
    generation: u64,
    callback: Box<T>,
}

pub struct CallbackQueue<T: ?Sized> {
    generation: u64,
    pending: Vec<Pending<T>>,
}

impl<T: ?Sized> Default for CallbackQueue<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            pending: Vec::new(),
        }
    }
}

impl<T: ?Sized> CallbackQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run `callback` after `delay` seconds of [`CallbackQueue::advance`].
    pub fn schedule(&mut self, delay: f32, callback: Box<T>) {
        self.pending.push(Pending {
            remaining: delay.max(0.0),
            generation: self.generation,
            callback,
        });
    }

    /// Drop every pending callback and start a new generation.
    pub fn invalidate(&mut self) {
        self.pending.clear();
        self.generation += 1;
    }

    /// Advance time and take the callbacks that became due, in scheduling
    /// order, together with their generation.
    pub fn advance(&mut self, dt: f32) -> Vec<(u64, Box<T>)> {
        let mut due = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for mut pending in self.pending.drain(..) {
            pending.remaining -= dt;
            if pending.remaining <= 0.0 {
                due.push((pending.generation, pending.callback));
            } else {
                waiting.push(pending);
            }
        }
        self.pending = waiting;
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T: ?Sized> std::fmt::Debug for CallbackQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("generation", &self.generation)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Queue = CallbackQueue<dyn FnOnce(&mut Vec<u32>)>;

    fn run(queue: &mut Queue, dt: f32, log: &mut Vec<u32>) {
        let current = queue.generation();
        for (generation, callback) in queue.advance(dt) {
            if generation == current {
                callback(log);
            }
        }
    }

    #[test]
    fn test_callbacks_run_when_due_in_order() {
        let mut queue = Queue::new();
        let mut log = Vec::new();
        queue.schedule(0.2, Box::new(|log: &mut Vec<u32>| log.push(2)));
        queue.schedule(0.0, Box::new(|log: &mut Vec<u32>| log.push(0)));
        queue.schedule(0.1, Box::new(|log: &mut Vec<u32>| log.push(1)));

        run(&mut queue, 0.15, &mut log);
        assert_eq!(log, vec![0, 1]);
        assert_eq!(queue.len(), 1);

        run(&mut queue, 0.15, &mut log);
        assert_eq!(log, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_invalidate_drops_pending() {
        let mut queue = Queue::new();
        let mut log = Vec::new();
        queue.schedule(0.0, Box::new(|log: &mut Vec<u32>| log.push(1)));
        queue.invalidate();
        queue.schedule(0.0, Box::new(|log: &mut Vec<u32>| log.push(2)));

        run(&mut queue, 0.1, &mut log);
        assert_eq!(log, vec![2]);
        assert_eq!(queue.generation(), 1);
    }

    #[test]
    fn test_negative_delay_is_immediate() {
        let mut queue = Queue::new();
        queue.schedule(-1.0, Box::new(|log: &mut Vec<u32>| log.push(7)));
        assert_eq!(queue.advance(0.0).len(), 1);
    }
}
