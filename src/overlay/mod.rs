//! The association override layer.
//!
//! Leaf-first: `registry` tracks every observed window, `matcher` recovers
//! the intended application, `store` holds the corrected associations,
//! `overrides` intercepts the tracker read paths, and `controller` wires the
//! lifecycle together over the deferred-work `queue`.

pub mod matcher;
pub mod queue;

mod controller;
mod overrides;
mod registry;
mod store;

pub use controller::WindowFixer;
pub use matcher::{AppMatcher, MatchOutcome};
pub use queue::{Task, TaskQueue};

pub(crate) use registry::WindowRegistry;
pub(crate) use store::FixStore;

use crate::config::FixerConfig;
use crate::host::{AppSystem, TrackerOps, WindowManager};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// State shared between the controller, the signal handlers it registers,
/// and the installed interceptors (which reach it through the process-wide
/// context). Mutated only from the host's single-threaded loop; the
/// registry's membership guard stands in for locking against overlapping
/// signal deliveries.
pub(crate) struct Shared {
    pub(crate) config: FixerConfig,
    pub(crate) wm: Arc<dyn WindowManager>,
    pub(crate) apps: Arc<dyn AppSystem>,
    pub(crate) ops: Arc<TrackerOps>,
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) matcher: AppMatcher,
    pub(crate) registry: WindowRegistry,
    pub(crate) fixes: FixStore,
    /// Cleared first thing on teardown; every deferred task and signal
    /// handler checks it before touching state.
    pub(crate) enabled: AtomicBool,
}
