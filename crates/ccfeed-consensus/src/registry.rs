use std::sync::Arc;

use ccfeed_core::ConsensusChange;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::ConsensusError;
use crate::subscriber::ConsensusSetSubscriber;
use crate::task_group::TaskGroup;

pub type SubscriberHandle = Arc<dyn ConsensusSetSubscriber>;

/// The active subscriber set and the discipline around it.
///
/// Registration, removal and every delivery loop run under one lock, so a
/// subscriber never sees a live change interleaved with its own catch-up.
/// Every operation also holds a slot in the task group, which lets
/// [`SubscriberRegistry::close`] wait for them before tearing down.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<SubscriberHandle>>,
    tg: TaskGroup,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        SubscriberRegistry::default()
    }

    /// Add `subscriber` to the active set after `catch_up` has fed it
    /// everything it missed.
    ///
    /// `catch_up` runs under the registry lock. If it fails the subscriber
    /// is taken out again before the error is returned.
    pub fn subscribe<F>(&self, subscriber: SubscriberHandle, catch_up: F) -> Result<(), ConsensusError>
    where
        F: FnOnce(&dyn ConsensusSetSubscriber) -> Result<(), ConsensusError>,
    {
        let _guard = self.tg.add()?;
        let mut subscribers = self.subscribers.lock();

        subscribers.push(Arc::clone(&subscriber));
        if let Err(e) = catch_up(subscriber.as_ref()) {
            subscribers.pop();
            return Err(e);
        }

        debug!("Subscriber registered ({} active)", subscribers.len());
        Ok(())
    }

    /// Remove the first handle pointing at the same subscriber; no-op if it
    /// is not registered
    pub fn unsubscribe(&self, subscriber: &SubscriberHandle) -> Result<(), ConsensusError> {
        let _guard = self.tg.add()?;
        let mut subscribers = self.subscribers.lock();

        if let Some(index) = subscribers.iter().position(|s| same_subscriber(s, subscriber)) {
            subscribers.remove(index);
            debug!("Subscriber removed ({} active)", subscribers.len());
        }
        Ok(())
    }

    /// Run `f` with exclusive access to the active set.
    ///
    /// This is how new changes are produced and broadcast: nothing can
    /// subscribe or unsubscribe between the mutation `f` performs and the
    /// deliveries it makes.
    pub fn exclusive<T, F>(&self, f: F) -> Result<T, ConsensusError>
    where
        F: FnOnce(&ActiveSubscribers<'_>) -> Result<T, ConsensusError>,
    {
        let _guard = self.tg.add()?;
        let subscribers = self.subscribers.lock();
        f(&ActiveSubscribers { subscribers })
    }

    pub fn contains(&self, subscriber: &SubscriberHandle) -> bool {
        self.subscribers
            .lock()
            .iter()
            .any(|s| same_subscriber(s, subscriber))
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting operations and wait for in-flight ones to finish
    pub fn close(&self) -> bool {
        self.tg.stop()
    }

    pub fn is_closed(&self) -> bool {
        self.tg.is_stopped()
    }
}

/// The locked active set, handed out by [`SubscriberRegistry::exclusive`]
pub struct ActiveSubscribers<'a> {
    subscribers: MutexGuard<'a, Vec<SubscriberHandle>>,
}

impl ActiveSubscribers<'_> {
    /// Deliver `change` to every active subscriber in registration order
    pub fn broadcast(&self, change: &ConsensusChange) {
        for subscriber in self.subscribers.iter() {
            subscriber.process_consensus_change(change);
        }
        debug!(
            "Broadcast change {} to {} subscribers",
            change.id,
            self.subscribers.len()
        );
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Handles are equal when they point at the same object
fn same_subscriber(a: &SubscriberHandle, b: &SubscriberHandle) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
