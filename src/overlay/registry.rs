//! Tracks every window the fixer has started observing, matched or not.
//!
//! Registration is the idempotence guard of the whole pipeline: a window is
//! processed for matching at most once, no matter how often overlapping
//! signal deliveries hand it to us. Each entry holds the removal
//! subscription so teardown can disconnect it.

use crate::events::{Handler, SubscriptionId, WindowSignal};
use crate::host::{Window, WindowHandle, WindowId, WindowLabel};
use dashmap::DashMap;
use tracing::trace;

struct Registered {
    window: WindowHandle,
    removal_sub: SubscriptionId,
}

#[derive(Default)]
pub(crate) struct WindowRegistry {
    entries: DashMap<WindowId, Registered>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the window and subscribes `on_removed` to its removal
    /// signal. Returns false without side effects if the window is already
    /// registered.
    pub fn register_if_new(&self, window: &WindowHandle, on_removed: Handler<()>) -> bool {
        use dashmap::mapref::entry::Entry;

        if self.entries.contains_key(&window.id()) {
            trace!("{} is already being watched", WindowLabel(window.as_ref()));
            return false;
        }

        let removal_sub = window.connect(WindowSignal::Unmanaged, on_removed);
        match self.entries.entry(window.id()) {
            Entry::Occupied(_) => {
                // Lost a re-entrant race between the membership check and the
                // insert; keep the first registration.
                window.disconnect(removal_sub);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Registered {
                    window: window.clone(),
                    removal_sub,
                });
                true
            }
        }
    }

    /// Removes the entry and disconnects its removal subscription. Safe to
    /// call for windows that were never registered.
    pub fn unregister(&self, id: WindowId) -> bool {
        match self.entries.remove(&id) {
            Some((_, entry)) => {
                entry.window.disconnect(entry.removal_sub);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Disconnects every removal subscription and empties the registry.
    pub fn drain(&self) {
        let ids: Vec<WindowId> = self.entries.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::stub::StubWindow;
    use std::sync::Arc;

    #[test]
    fn registration_is_idempotent() {
        let registry = WindowRegistry::new();
        let stub = StubWindow::new(1).with_class("Foo").build();
        let window: WindowHandle = stub.clone();

        assert!(registry.register_if_new(&window, Arc::new(|_: &()| {})));
        assert!(!registry.register_if_new(&window, Arc::new(|_: &()| {})));
        assert_eq!(registry.len(), 1);
        assert_eq!(stub.handler_count(WindowSignal::Unmanaged), 1);
    }

    #[test]
    fn unregister_disconnects_removal_subscription() {
        let registry = WindowRegistry::new();
        let stub = StubWindow::new(1).build();
        let window: WindowHandle = stub.clone();

        registry.register_if_new(&window, Arc::new(|_: &()| {}));
        assert!(registry.unregister(window.id()));
        assert!(!registry.unregister(window.id()));
        assert_eq!(stub.handler_count(WindowSignal::Unmanaged), 0);
        assert!(!registry.contains(window.id()));
    }

    #[test]
    fn drain_clears_every_entry_and_subscription() {
        let registry = WindowRegistry::new();
        let stubs: Vec<_> = (1..=3).map(|i| StubWindow::new(i).build()).collect();
        for stub in &stubs {
            let window: WindowHandle = stub.clone();
            registry.register_if_new(&window, Arc::new(|_: &()| {}));
        }

        registry.drain();
        assert_eq!(registry.len(), 0);
        for stub in &stubs {
            assert_eq!(stub.handler_count(WindowSignal::Unmanaged), 0);
        }
    }
}
