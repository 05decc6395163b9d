//! Shutdown barrier for registry operations.
//!
//! Every operation enters the group through [`TaskGroup::add`] and leaves it
//! when its [`TaskGuard`] drops. [`TaskGroup::stop`] refuses new entries and
//! then waits until every guard handed out before it has been dropped.

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::ConsensusError;

#[derive(Debug, Default)]
struct State {
    active: usize,
    stopped: bool,
}

#[derive(Debug, Default)]
pub struct TaskGroup {
    state: Mutex<State>,
    idle: Condvar,
}

impl TaskGroup {
    pub fn new() -> Self {
        TaskGroup::default()
    }

    /// Register an in-flight operation, or fail if shutdown has begun
    pub fn add(&self) -> Result<TaskGuard<'_>, ConsensusError> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(ConsensusError::Stopped);
        }
        state.active += 1;
        Ok(TaskGuard { group: self })
    }

    /// Reject new operations and block until in-flight ones finish.
    ///
    /// Returns `false` if the group had already been stopped.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if state.stopped {
            return false;
        }
        state.stopped = true;
        debug!("Task group stopping with {} operations in flight", state.active);
        while state.active > 0 {
            self.idle.wait(&mut state);
        }
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Number of operations currently in flight
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    fn done(&self) {
        let mut state = self.state.lock();
        state.active -= 1;
        if state.active == 0 {
            self.idle.notify_all();
        }
    }
}

/// Proof of membership in a [`TaskGroup`]; leaves the group on drop
#[must_use = "the operation leaves the task group as soon as the guard is dropped"]
pub struct TaskGuard<'a> {
    group: &'a TaskGroup,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.group.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_guard_tracks_active() {
        let tg = TaskGroup::new();
        {
            let _a = tg.add().unwrap();
            let _b = tg.add().unwrap();
            assert_eq!(tg.active(), 2);
        }
        assert_eq!(tg.active(), 0);
    }

    #[test]
    fn test_add_after_stop_rejected() {
        let tg = TaskGroup::new();
        assert!(tg.stop());
        assert!(tg.is_stopped());
        assert!(matches!(tg.add(), Err(ConsensusError::Stopped)));
        assert!(!tg.stop());
    }

    #[test]
    fn test_stop_waits_for_in_flight() {
        let tg = Arc::new(TaskGroup::new());
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();

        let worker = {
            let tg = Arc::clone(&tg);
            thread::spawn(move || {
                let _guard = tg.add().unwrap();
                entered_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                tg.active()
            })
        };

        entered_rx.recv().unwrap();
        tg.stop();
        assert_eq!(tg.active(), 0);
        assert_eq!(worker.join().unwrap(), 1);
    }
}
