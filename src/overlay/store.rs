//! Authoritative map of corrected window→application associations.
//!
//! A `WindowFix` exists only while its window does: it is created when the
//! matcher succeeds and destroyed when the window leaves the environment,
//! never for any other reason. Creating or destroying one emits the exact
//! notification surface a native match would have produced, so dependent
//! shell components cannot tell a corrected association from a native one.

use crate::events::{AppSignal, Handler, SubscriptionId, WindowSignal};
use crate::host::{
    AppHandle, AppId, AppSystem, Application, Pid, Window, WindowHandle, WindowId, WindowLabel,
};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct WindowFix {
    pub window: WindowHandle,
    pub app: AppHandle,
    /// The transient application the tracker fabricated for this window
    /// before we corrected it. Excluded from every corrected result so it is
    /// never double-counted as running.
    pub placeholder: Option<AppHandle>,
    pub pid: Pid,
    focus_sub: Option<SubscriptionId>,
}

pub(crate) struct FixStore {
    apps: Arc<dyn AppSystem>,
    fixes: DashMap<WindowId, WindowFix>,
}

impl FixStore {
    pub fn new(apps: Arc<dyn AppSystem>) -> Self {
        Self {
            apps,
            fixes: DashMap::new(),
        }
    }

    /// Records a fix and subscribes `on_focus` to the window's focus-gained
    /// signal. Returns false if the window already has one; a window is
    /// fixed at most once.
    pub fn create(
        &self,
        window: WindowHandle,
        app: AppHandle,
        placeholder: Option<AppHandle>,
        pid: Pid,
        on_focus: Option<Handler<()>>,
    ) -> bool {
        use dashmap::mapref::entry::Entry;

        if self.fixes.contains_key(&window.id()) {
            warn!("{} already has a fix", WindowLabel(window.as_ref()));
            return false;
        }

        let focus_sub = on_focus.map(|handler| window.connect(WindowSignal::FocusIn, handler));
        let notify_app = app.clone();
        match self.fixes.entry(window.id()) {
            Entry::Occupied(_) => {
                if let Some(sub) = focus_sub {
                    window.disconnect(sub);
                }
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(WindowFix {
                    window,
                    app,
                    placeholder,
                    pid,
                    focus_sub,
                });
                self.emit_changed(&notify_app);
                true
            }
        }
    }

    /// Tears the fix down: disconnects the focus subscription and re-emits
    /// the association notifications so listeners observe the application's
    /// window count and state revert.
    pub fn destroy(&self, id: WindowId) -> bool {
        let Some((_, fix)) = self.fixes.remove(&id) else {
            return false;
        };
        if let Some(sub) = fix.focus_sub {
            fix.window.disconnect(sub);
        }
        debug!(
            "{} was fixed to {}, unfixing",
            WindowLabel(fix.window.as_ref()),
            fix.app.name()
        );
        self.emit_changed(&fix.app);
        true
    }

    /// The four notifications a native association change fires, in the
    /// native order.
    fn emit_changed(&self, app: &AppHandle) {
        app.emit(AppSignal::WindowsChanged);
        app.emit(AppSignal::StateChanged);
        self.apps.emit_app_state_changed(app);
        self.apps.emit_tracked_windows_changed();
    }

    pub fn has_fix(&self, id: WindowId) -> bool {
        self.fixes.contains_key(&id)
    }

    pub fn app_for_window(&self, id: WindowId) -> Option<AppHandle> {
        self.fixes.get(&id).map(|fix| fix.app.clone())
    }

    /// Matched application of the first fix whose window carries `pid`.
    pub fn app_for_pid(&self, pid: Pid) -> Option<AppHandle> {
        self.fixes
            .iter()
            .find(|fix| fix.pid == pid)
            .map(|fix| fix.app.clone())
    }

    /// Whether `app` is the tracker-fabricated placeholder of any fix.
    pub fn is_placeholder(&self, app: AppId) -> bool {
        self.fixes
            .iter()
            .any(|fix| fix.placeholder.as_ref().is_some_and(|p| p.id() == app))
    }

    pub fn count_for_app(&self, app: AppId) -> usize {
        self.fixes.iter().filter(|fix| fix.app.id() == app).count()
    }

    pub fn pids_for_app(&self, app: AppId) -> Vec<Pid> {
        self.fixes
            .iter()
            .filter(|fix| fix.app.id() == app)
            .map(|fix| fix.pid)
            .collect()
    }

    pub fn windows_for_app(&self, app: AppId) -> Vec<WindowHandle> {
        self.fixes
            .iter()
            .filter(|fix| fix.app.id() == app)
            .map(|fix| fix.window.clone())
            .collect()
    }

    /// Every matched application plus the identity set of every placeholder,
    /// for the running-applications correction.
    pub fn fixed_and_placeholder_apps(&self) -> (Vec<AppHandle>, HashSet<AppId>) {
        let mut fixed = Vec::new();
        let mut placeholders = HashSet::new();
        for fix in self.fixes.iter() {
            fixed.push(fix.app.clone());
            if let Some(placeholder) = &fix.placeholder {
                placeholders.insert(placeholder.id());
            }
        }
        (fixed, placeholders)
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    /// Silently disconnects every focus subscription and empties the store.
    /// Shutdown path only; no notifications are emitted.
    pub fn drain(&self) {
        let ids: Vec<WindowId> = self.fixes.iter().map(|fix| *fix.key()).collect();
        for id in ids {
            if let Some((_, fix)) = self.fixes.remove(&id) {
                if let Some(sub) = fix.focus_sub {
                    fix.window.disconnect(sub);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::stub::{GlobalNotification, StubApp, StubShell, StubWindow};

    fn fixture() -> (Arc<StubShell>, FixStore) {
        let shell = StubShell::new();
        let store = FixStore::new(shell.clone());
        (shell, store)
    }

    #[test]
    fn create_is_exclusive_per_window() {
        let (_, store) = fixture();
        let window: WindowHandle = StubWindow::new(1).with_class("Foo").build();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;

        assert!(store.create(window.clone(), app.clone(), None, 42, None));
        assert!(!store.create(window.clone(), app.clone(), None, 42, None));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.app_for_window(window.id()).map(|a| a.id()),
            Some(app.id())
        );
    }

    #[test]
    fn create_emits_the_four_notifications_once() {
        let (shell, store) = fixture();
        let window: WindowHandle = StubWindow::new(1).with_class("Foo").build();
        let stub_app = StubApp::desktop(1, "foo.desktop", "Foo");
        let app = stub_app.clone() as AppHandle;

        store.create(window, app.clone(), None, 42, None);

        assert_eq!(
            stub_app.emitted(),
            vec![AppSignal::WindowsChanged, AppSignal::StateChanged]
        );
        assert_eq!(
            shell.notifications(),
            vec![
                GlobalNotification::AppStateChanged(app.id()),
                GlobalNotification::TrackedWindowsChanged,
            ]
        );
    }

    #[test]
    fn destroy_reemits_and_disconnects_focus() {
        let (shell, store) = fixture();
        let stub_win = StubWindow::new(1).with_class("Foo").build();
        let window: WindowHandle = stub_win.clone();
        let stub_app = StubApp::desktop(1, "foo.desktop", "Foo");
        let app = stub_app.clone() as AppHandle;

        store.create(window.clone(), app, None, 42, Some(Arc::new(|_: &()| {})));
        assert_eq!(stub_win.handler_count(WindowSignal::FocusIn), 1);
        stub_app.clear_emitted();
        shell.clear_notifications();

        assert!(store.destroy(window.id()));
        assert!(!store.destroy(window.id()));
        assert_eq!(stub_win.handler_count(WindowSignal::FocusIn), 0);
        assert_eq!(
            stub_app.emitted(),
            vec![AppSignal::WindowsChanged, AppSignal::StateChanged]
        );
        assert_eq!(shell.notifications().len(), 2);
    }

    #[test]
    fn queries_cover_pid_placeholder_and_windows() {
        let (_, store) = fixture();
        let win_a: WindowHandle = StubWindow::new(1).with_class("Foo").build();
        let win_b: WindowHandle = StubWindow::new(2).with_class("Foo").build();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let placeholder = StubApp::placeholder(9, "window:1") as AppHandle;

        store.create(win_a, app.clone(), Some(placeholder.clone()), 10, None);
        store.create(win_b, app.clone(), None, 11, None);

        assert_eq!(store.count_for_app(app.id()), 2);
        let mut pids = store.pids_for_app(app.id());
        pids.sort_unstable();
        assert_eq!(pids, vec![10, 11]);
        assert_eq!(store.windows_for_app(app.id()).len(), 2);
        assert_eq!(store.app_for_pid(11).map(|a| a.id()), Some(app.id()));
        assert!(store.app_for_pid(12).is_none());
        assert!(store.is_placeholder(placeholder.id()));
        assert!(!store.is_placeholder(app.id()));

        let (fixed, placeholders) = store.fixed_and_placeholder_apps();
        assert_eq!(fixed.len(), 2);
        assert_eq!(placeholders.len(), 1);
    }

    #[test]
    fn drain_is_silent() {
        let (shell, store) = fixture();
        let stub_win = StubWindow::new(1).with_class("Foo").build();
        let window: WindowHandle = stub_win.clone();
        let stub_app = StubApp::desktop(1, "foo.desktop", "Foo");

        store.create(
            window,
            stub_app.clone() as AppHandle,
            None,
            42,
            Some(Arc::new(|_: &()| {})),
        );
        stub_app.clear_emitted();
        shell.clear_notifications();

        store.drain();
        assert_eq!(store.len(), 0);
        assert_eq!(stub_win.handler_count(WindowSignal::FocusIn), 0);
        assert!(stub_app.emitted().is_empty());
        assert!(shell.notifications().is_empty());
    }
}
