//! Signal plumbing between the fixer and the host object graph.
//!
//! The fixer never owns the windows and applications it corrects; it only
//! subscribes to their signals, remembers the subscription handles, and
//! unsubscribes on teardown. `SignalBus` is the publish/subscribe primitive
//! the host objects (and the in-memory stub host) implement that contract
//! with.

use parking_lot::RwLock;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by `connect`, required by `disconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Signals a window emits that the fixer listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowSignal {
    /// The window gained window-manager focus.
    FocusIn,
    /// The window left the environment for good.
    Unmanaged,
}

/// Signals the fixer emits on a matched application so dependent shell
/// components observe the corrected association the same way they would a
/// native one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppSignal {
    WindowsChanged,
    StateChanged,
}

pub type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Slot<S, A> {
    id: SubscriptionId,
    signal: S,
    handler: Handler<A>,
}

/// Per-object publish/subscribe bus.
///
/// `emit` collects the matching handlers under the lock and invokes them
/// after releasing it, so a handler may connect or disconnect on the same
/// bus without deadlocking.
pub struct SignalBus<S, A = ()> {
    next_id: AtomicU64,
    slots: RwLock<Vec<Slot<S, A>>>,
}

impl<S, A> Default for SignalBus<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> SignalBus<S, A> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: RwLock::new(Vec::new()),
        }
    }
}

impl<S: Copy + Eq + Hash, A> SignalBus<S, A> {
    pub fn connect(&self, signal: S, handler: Handler<A>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.write().push(Slot { id, signal, handler });
        id
    }

    /// Returns false if the handle was unknown (already disconnected).
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }

    pub fn emit(&self, signal: S, arg: &A) {
        let handlers: Vec<Handler<A>> = self
            .slots
            .read()
            .iter()
            .filter(|slot| slot.signal == signal)
            .map(|slot| slot.handler.clone())
            .collect();
        for handler in handlers {
            handler(arg);
        }
    }

    pub fn handler_count(&self, signal: S) -> usize {
        self.slots
            .read()
            .iter()
            .filter(|slot| slot.signal == signal)
            .count()
    }
}
