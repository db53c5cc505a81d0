//! Change notification.
//!
//! Writes to role assignments, entity registrations or configuration are
//! broadcast to registered listeners. Delivery is synchronous: when
//! [`ChangeNotifier::publish`] returns, every live listener has handled the
//! event, so caches are already cleared before the triggering call completes.
//!
//! Listeners are held weakly. A component that owns both the notifier and a
//! listener does not form a reference cycle, and dropped listeners are pruned
//! on the next publish.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::entity::EntityId;

/// A change relevant to cached keys or metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A role was registered or unregistered.
    RolesChanged,
    /// An entity was added, replaced, removed, or its metadata refreshed.
    EntityChanged {
        /// The affected entity.
        entity_id: EntityId,
    },
    /// The authority configuration (entity id, certificates, key) changed.
    ConfigurationChanged,
}

/// Receiver of [`ChangeEvent`]s.
pub trait ChangeListener: Send + Sync {
    /// Handles a change. Must not block on external I/O.
    fn on_change(&self, event: &ChangeEvent);
}

/// Synchronous broadcaster of [`ChangeEvent`]s.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<Vec<Weak<dyn ChangeListener>>>,
}

impl ChangeNotifier {
    /// Creates a notifier without listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`. The notifier keeps only a weak reference.
    pub fn subscribe<L>(&self, listener: &Arc<L>)
    where
        L: ChangeListener + 'static,
    {
        let weak: Weak<L> = Arc::downgrade(listener);
        let weak: Weak<dyn ChangeListener> = weak;
        self.listeners.write().push(weak);
    }

    /// Delivers `event` to every live listener before returning.
    pub fn publish(&self, event: &ChangeEvent) {
        let live: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        tracing::debug!(?event, listeners = live.len(), "publishing change event");

        // The lock is released before dispatch so listeners may publish in turn.
        for listener in &live {
            listener.on_change(event);
        }

        if live.len() != self.listeners.read().len() {
            self.listeners.write().retain(|l| l.strong_count() > 0);
        }
    }

    /// Returns the number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
