//! Lifecycle wiring: window creation and removal, deferred matching, and
//! full teardown.
//!
//! Per window the states are unseen, registered-unmatched,
//! registered-fixed, removed. The creation handler only registers the
//! window and defers the match attempt to the next idle turn of the host
//! loop, because the class hint may not be populated yet during the
//! creation signal. A window is matched at most once; a failed attempt is
//! never retried, even if the window's properties change later.

use crate::config::Config;
use crate::context;
use crate::error::Result;
use crate::events::{Handler, SubscriptionId};
use crate::host::{
    AppSystem, Application, TrackerOps, Window, WindowHandle, WindowLabel, WindowManager,
};
use crate::overlay::matcher::{AppMatcher, MatchOutcome};
use crate::overlay::overrides::TrackerOverrides;
use crate::overlay::{FixStore, Shared, TaskQueue, WindowRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

impl Shared {
    /// Entry point for both the creation signal and the startup scan.
    pub(crate) fn observe_window(self: &Arc<Self>, window: &WindowHandle) {
        let weak = Arc::downgrade(self);
        let removed_window = window.clone();
        let on_removed: Handler<()> = Arc::new(move |_: &()| {
            if let Some(shared) = weak.upgrade() {
                if !shared.enabled.load(Ordering::Relaxed) {
                    return;
                }
                shared.window_removed(&removed_window);
            }
        });

        if !self.registry.register_if_new(window, on_removed) {
            return;
        }
        debug!("watching {}", WindowLabel(window.as_ref()));

        let weak = Arc::downgrade(self);
        let deferred_window = window.clone();
        self.queue.defer(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.enabled.load(Ordering::Relaxed) {
                trace!("dropping deferred match scheduled before teardown");
                return;
            }
            shared.try_fix_window(&deferred_window);
        }));
    }

    /// Deferred match attempt. Runs once per window, at idle.
    fn try_fix_window(self: &Arc<Self>, window: &WindowHandle) {
        if !self.registry.contains(window.id()) {
            // Removed before the idle turn came around.
            return;
        }

        debug!("processing {}", WindowLabel(window.as_ref()));
        let native = (self.ops.get_window_app.get())(window);
        match self.matcher.resolve(window, native.as_ref()) {
            MatchOutcome::AlreadyTracked | MatchOutcome::NoWmClass | MatchOutcome::NoMatch => {}
            MatchOutcome::Matched { app } => {
                let on_focus = self
                    .config
                    .forward_focus_activation
                    .then(|| self.focus_activation_handler(window.clone()));
                if self.fixes.create(
                    window.clone(),
                    app.clone(),
                    native,
                    window.pid(),
                    on_focus,
                ) {
                    info!(
                        "fixed {} to app {}",
                        WindowLabel(window.as_ref()),
                        app.shell_id()
                    );
                }
            }
        }
    }

    /// Focus on a fixed window drives the matched application's activation,
    /// just as it would for a natively-matched window.
    fn focus_activation_handler(self: &Arc<Self>, window: WindowHandle) -> Handler<()> {
        let weak = Arc::downgrade(self);
        Arc::new(move |_: &()| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.enabled.load(Ordering::Relaxed) {
                return;
            }
            if let Some(app) = shared.fixes.app_for_window(window.id()) {
                let time = shared.wm.current_time();
                trace!(
                    "forwarding focus of {} to activation of {}",
                    WindowLabel(window.as_ref()),
                    app.shell_id()
                );
                app.activate_window(&window, time);
            }
        })
    }

    fn window_removed(self: &Arc<Self>, window: &WindowHandle) {
        debug!("unmanaging {}", WindowLabel(window.as_ref()));
        // Fix teardown first: its subscriptions must be gone before the
        // registry entry is.
        self.fixes.destroy(window.id());
        self.registry.unregister(window.id());
    }
}

/// The enabled override layer. Scoped resource: dropping it (or calling
/// `disable`) removes every override and subscription, restoring the host
/// to its native behavior exactly.
pub struct WindowFixer {
    shared: Arc<Shared>,
    overrides: Option<TrackerOverrides>,
    created_sub: Option<SubscriptionId>,
}

impl WindowFixer {
    /// Installs the overrides, subscribes to window creation, and feeds
    /// every currently-visible window through the same registration path
    /// new windows take. Fails if another fixer is already enabled in this
    /// process.
    pub fn enable(
        config: Config,
        wm: Arc<dyn WindowManager>,
        apps: Arc<dyn AppSystem>,
        ops: Arc<TrackerOps>,
        queue: Arc<TaskQueue>,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            config: config.fixer,
            matcher: AppMatcher::new(apps.clone()),
            fixes: FixStore::new(apps.clone()),
            wm,
            apps,
            ops,
            queue,
            registry: WindowRegistry::new(),
            enabled: AtomicBool::new(true),
        });

        context::install(shared.clone())?;
        let overrides = TrackerOverrides::install_all(&shared.ops, &shared.config);

        let weak = Arc::downgrade(&shared);
        let created_sub = shared.wm.connect_window_created(Arc::new(
            move |window: &WindowHandle| {
                if let Some(shared) = weak.upgrade() {
                    if !shared.enabled.load(Ordering::Relaxed) {
                        return;
                    }
                    debug!("new {} created", WindowLabel(window.as_ref()));
                    shared.observe_window(window);
                }
            },
        ));

        let fixer = Self {
            shared,
            overrides: Some(overrides),
            created_sub: Some(created_sub),
        };

        if fixer.shared.config.scan_existing_windows {
            for window in fixer.shared.wm.windows() {
                debug!("checking existing {}", WindowLabel(window.as_ref()));
                fixer.shared.observe_window(&window);
            }
        }

        info!("association override layer enabled");
        Ok(fixer)
    }

    /// Number of corrected associations currently held.
    pub fn fixed_window_count(&self) -> usize {
        self.shared.fixes.len()
    }

    /// Number of windows being watched, matched or not.
    pub fn watched_window_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn disable(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(overrides) = self.overrides.take() else {
            return;
        };
        self.shared.enabled.store(false, Ordering::Relaxed);

        if let Some(sub) = self.created_sub.take() {
            self.shared.wm.disconnect_window_created(sub);
        }
        self.shared.fixes.drain();
        self.shared.registry.drain();
        overrides.remove_all(&self.shared.ops);
        context::clear();
        info!("association override layer disabled");
    }
}

impl Drop for WindowFixer {
    fn drop(&mut self) {
        self.teardown();
    }
}
