//! Interception of every tracker operation the shell reads associations
//! through.
//!
//! Every interceptor follows one pattern: consult the fix store through the
//! process-wide context; if a relevant fix exists, compute the corrected
//! answer from it; otherwise fall through to (or compose with) the saved
//! native implementation. Corrections are purely additive or substitutive
//! over the native result, and the whole set installs and removes as a
//! unit so teardown restores native behavior exactly.
//!
//! Interceptors run inline at arbitrary host call sites: they are
//! synchronous, never suspend, and when no fixer is enabled they are a plain
//! call through to the original.

use crate::config::FixerConfig;
use crate::context;
use crate::host::ops::{
    ActivateFn, AppFromPidFn, FocusAppFn, IsRemoteFn, NWindowsFn, OnWorkspaceFn, PidsFn, RunningFn,
    StateFn, TrackerOps, WindowAppFn, WindowAppIdFn, WindowsFn,
};
use crate::host::{AppHandle, AppState, Application, Window, WindowHandle, WindowType};
use std::sync::Arc;
use tracing::{debug, trace};

/// Overlay verdict for operations that special-case placeholder
/// applications.
enum Overlayed<T> {
    /// The queried application is some fix's placeholder; report it empty.
    Placeholder,
    Extra(T),
}

/// Saved originals of every installed override. Dropping this without
/// calling `remove_all` would leave interceptors installed, so the
/// controller owns it for exactly the enabled lifetime.
pub(crate) struct TrackerOverrides {
    window_app: Arc<WindowAppFn>,
    app_from_pid: Arc<AppFromPidFn>,
    focus_app: Arc<FocusAppFn>,
    n_windows: Arc<NWindowsFn>,
    pids: Arc<PidsFn>,
    windows: Arc<WindowsFn>,
    on_workspace: Arc<OnWorkspaceFn>,
    state: Arc<StateFn>,
    running: Arc<RunningFn>,
    activate: Option<Arc<ActivateFn>>,
    window_app_id: Arc<WindowAppIdFn>,
    is_remote: Arc<IsRemoteFn>,
}

impl TrackerOverrides {
    /// Swaps every slot for its interceptor, keeping the originals for
    /// restoration. The activation override is skipped when configured off.
    pub fn install_all(ops: &TrackerOps, config: &FixerConfig) -> Self {
        debug!("installing tracker overrides");
        Self {
            window_app: override_get_window_app(ops),
            app_from_pid: override_get_app_from_pid(ops),
            focus_app: override_get_focus_app(ops),
            n_windows: override_get_n_windows(ops),
            pids: override_get_pids(ops),
            windows: override_get_windows(ops),
            on_workspace: override_is_on_workspace(ops),
            state: override_get_state(ops),
            running: override_get_running(ops),
            activate: config.simulate_activation.then(|| override_activate(ops)),
            window_app_id: override_get_window_app_id(ops),
            is_remote: override_is_remote(ops),
        }
    }

    /// Restores every original implementation exactly as saved.
    pub fn remove_all(self, ops: &TrackerOps) {
        debug!("removing tracker overrides");
        ops.get_window_app.set(self.window_app);
        ops.get_app_from_pid.set(self.app_from_pid);
        ops.get_focus_app.set(self.focus_app);
        ops.get_n_windows.set(self.n_windows);
        ops.get_pids.set(self.pids);
        ops.get_windows.set(self.windows);
        ops.is_on_workspace.set(self.on_workspace);
        ops.get_state.set(self.state);
        ops.get_running.set(self.running);
        if let Some(activate) = self.activate {
            ops.activate.set(activate);
        }
        ops.get_window_app_id.set(self.window_app_id);
        ops.is_remote.set(self.is_remote);
    }
}

fn override_get_window_app(ops: &TrackerOps) -> Arc<WindowAppFn> {
    let orig = ops.get_window_app.get();
    ops.get_window_app.set(Arc::new(move |win: &WindowHandle| {
        let fixed = context::with(|cx| cx.fixes.app_for_window(win.id())).flatten();
        match fixed {
            Some(app) => {
                trace!("get_window_app({}) answered from fix", win.id());
                Some(app)
            }
            None => orig(win),
        }
    }))
}

fn override_get_app_from_pid(ops: &TrackerOps) -> Arc<AppFromPidFn> {
    let orig = ops.get_app_from_pid.get();
    ops.get_app_from_pid.set(Arc::new(move |pid| {
        let fixed = context::with(|cx| cx.fixes.app_for_pid(pid)).flatten();
        match fixed {
            Some(app) => Some(app),
            None => orig(pid),
        }
    }))
}

fn override_get_focus_app(ops: &TrackerOps) -> Arc<FocusAppFn> {
    let orig = ops.get_focus_app.get();
    ops.get_focus_app.set(Arc::new(move || {
        let fixed = context::with(|cx| {
            cx.wm
                .focused_window()
                .and_then(|win| cx.fixes.app_for_window(win.id()))
        })
        .flatten();
        match fixed {
            Some(app) => Some(app),
            None => orig(),
        }
    }))
}

fn override_get_n_windows(ops: &TrackerOps) -> Arc<NWindowsFn> {
    let orig = ops.get_n_windows.get();
    ops.get_n_windows.set(Arc::new(move |app: &AppHandle| {
        let overlay = context::with(|cx| {
            if cx.fixes.is_placeholder(app.id()) {
                Overlayed::Placeholder
            } else {
                Overlayed::Extra(cx.fixes.count_for_app(app.id()))
            }
        });
        match overlay {
            None => orig(app),
            Some(Overlayed::Placeholder) => 0,
            Some(Overlayed::Extra(extra)) => orig(app) + extra,
        }
    }))
}

fn override_get_pids(ops: &TrackerOps) -> Arc<PidsFn> {
    let orig = ops.get_pids.get();
    ops.get_pids.set(Arc::new(move |app: &AppHandle| {
        let overlay = context::with(|cx| {
            if cx.fixes.is_placeholder(app.id()) {
                Overlayed::Placeholder
            } else {
                Overlayed::Extra(cx.fixes.pids_for_app(app.id()))
            }
        });
        match overlay {
            None => orig(app),
            Some(Overlayed::Placeholder) => Vec::new(),
            Some(Overlayed::Extra(extra)) => {
                let mut pids = orig(app);
                pids.extend(extra);
                pids
            }
        }
    }))
}

fn override_get_windows(ops: &TrackerOps) -> Arc<WindowsFn> {
    let orig = ops.get_windows.get();
    ops.get_windows.set(Arc::new(move |app: &AppHandle| {
        let overlay = context::with(|cx| {
            if cx.fixes.is_placeholder(app.id()) {
                Overlayed::Placeholder
            } else {
                Overlayed::Extra(cx.fixes.windows_for_app(app.id()))
            }
        });
        match overlay {
            None => orig(app),
            Some(Overlayed::Placeholder) => Vec::new(),
            Some(Overlayed::Extra(extra)) => {
                let mut windows = orig(app);
                windows.extend(extra);
                windows
            }
        }
    }))
}

fn override_is_on_workspace(ops: &TrackerOps) -> Arc<OnWorkspaceFn> {
    let orig = ops.is_on_workspace.get();
    ops.is_on_workspace.set(Arc::new(move |app, workspace| {
        let overlay = context::with(|cx| {
            if cx.fixes.is_placeholder(app.id()) {
                Overlayed::Placeholder
            } else {
                Overlayed::Extra(
                    cx.fixes
                        .windows_for_app(app.id())
                        .iter()
                        .any(|win| win.workspace() == Some(workspace)),
                )
            }
        });
        match overlay {
            None => orig(app, workspace),
            Some(Overlayed::Placeholder) => false,
            Some(Overlayed::Extra(true)) => true,
            Some(Overlayed::Extra(false)) => orig(app, workspace),
        }
    }))
}

fn override_get_state(ops: &TrackerOps) -> Arc<StateFn> {
    let orig = ops.get_state.get();
    ops.get_state.set(Arc::new(move |app: &AppHandle| {
        let overlay = context::with(|cx| {
            if cx.fixes.is_placeholder(app.id()) {
                Overlayed::Placeholder
            } else {
                Overlayed::Extra(cx.fixes.windows_for_app(app.id()))
            }
        });
        match overlay {
            None => orig(app),
            Some(Overlayed::Placeholder) => AppState::Stopped,
            Some(Overlayed::Extra(windows)) => {
                let native = orig(app);
                let running = windows.iter().any(|win| win.workspace().is_some());
                if native == AppState::Stopped && running {
                    AppState::Running
                } else {
                    native
                }
            }
        }
    }))
}

fn override_get_running(ops: &TrackerOps) -> Arc<RunningFn> {
    let orig = ops.get_running.get();
    ops.get_running.set(Arc::new(move || {
        match context::with(|cx| cx.fixes.fixed_and_placeholder_apps()) {
            None => orig(),
            Some((fixed, placeholders)) => {
                // Native result, plus our matched apps, minus every
                // placeholder.
                let mut running = orig();
                running.extend(fixed);
                running.retain(|app| !placeholders.contains(&app.id()));
                running
            }
        }
    }))
}

fn override_activate(ops: &TrackerOps) -> Arc<ActivateFn> {
    let orig = ops.activate.get();
    ops.activate.set(Arc::new(move |app: &AppHandle, time| {
        let overlay = context::with(|cx| {
            if cx.fixes.is_placeholder(app.id()) {
                Overlayed::Placeholder
            } else {
                Overlayed::Extra(cx.fixes.windows_for_app(app.id()))
            }
        });
        match overlay {
            None => orig(app, time),
            Some(Overlayed::Placeholder) => {
                debug!("ignoring activation of placeholder {}", app.shell_id());
            }
            Some(Overlayed::Extra(windows)) if windows.is_empty() => orig(app, time),
            Some(Overlayed::Extra(windows)) => {
                // Toggle the fixed windows between minimized and shown,
                // keyed off the first normal-type window, then let the
                // native activation run for its unrelated side effects.
                let lead = windows
                    .iter()
                    .find(|win| win.window_type() == WindowType::Normal)
                    .unwrap_or(&windows[0]);
                if lead.is_minimized() {
                    for win in &windows {
                        win.activate(time);
                    }
                } else {
                    for win in &windows {
                        win.minimize();
                    }
                }
                orig(app, time);
            }
        }
    }))
}

fn override_get_window_app_id(ops: &TrackerOps) -> Arc<WindowAppIdFn> {
    let orig = ops.get_window_app_id.get();
    ops.get_window_app_id.set(Arc::new(move |win: &WindowHandle| {
        let fixed = context::with(|cx| cx.fixes.app_for_window(win.id())).flatten();
        match fixed {
            Some(app) => Some(app.shell_id()),
            None => orig(win),
        }
    }))
}

fn override_is_remote(ops: &TrackerOps) -> Arc<IsRemoteFn> {
    let orig = ops.is_remote.get();
    ops.is_remote.set(Arc::new(move |win: &WindowHandle| {
        let fixed = context::with(|cx| cx.fixes.has_fix(win.id())).unwrap_or(false);
        fixed || orig(win)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::host::stub::{StubApp, StubShell, StubWindow};
    use crate::host::{AppId, AppSystem, WindowManager, WorkspaceId};
    use crate::overlay::{FixStore, Shared, TaskQueue, WindowRegistry};
    use crate::overlay::matcher::AppMatcher;
    use std::sync::atomic::AtomicBool;

    struct Enabled {
        shell: Arc<StubShell>,
        ops: Arc<TrackerOps>,
        overrides: Option<TrackerOverrides>,
        _guard: parking_lot::MutexGuard<'static, ()>,
    }

    impl Enabled {
        fn new() -> Self {
            let guard = context::exclusive();
            let shell = StubShell::new();
            let ops = shell.tracker_ops();
            let apps: Arc<dyn AppSystem> = shell.clone();
            let shared = Arc::new(Shared {
                config: FixerConfig::default(),
                wm: shell.clone() as Arc<dyn WindowManager>,
                apps: apps.clone(),
                ops: ops.clone(),
                queue: Arc::new(TaskQueue::new()),
                matcher: AppMatcher::new(apps.clone()),
                registry: WindowRegistry::new(),
                fixes: FixStore::new(apps),
                enabled: AtomicBool::new(true),
            });
            context::install(shared).expect("no other fixer enabled");
            let overrides = TrackerOverrides::install_all(&ops, &FixerConfig::default());
            Self {
                shell,
                ops,
                overrides: Some(overrides),
                _guard: guard,
            }
        }

        fn fix(
            &self,
            window: &WindowHandle,
            app: &AppHandle,
            placeholder: Option<&AppHandle>,
        ) {
            context::with(|cx| {
                assert!(cx.fixes.create(
                    window.clone(),
                    app.clone(),
                    placeholder.cloned(),
                    window.pid(),
                    None,
                ));
            })
            .expect("context installed");
        }
    }

    impl Drop for Enabled {
        fn drop(&mut self) {
            if let Some(overrides) = self.overrides.take() {
                overrides.remove_all(&self.ops);
            }
            context::clear();
        }
    }

    fn ids(apps: &[AppHandle]) -> Vec<AppId> {
        apps.iter().map(|app| app.id()).collect()
    }

    #[test]
    fn window_app_prefers_the_fix() {
        let env = Enabled::new();
        let window: WindowHandle = StubWindow::new(1).with_class("Foo").with_pid(10).build();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        env.fix(&window, &app, None);

        assert_eq!(
            (env.ops.get_window_app.get())(&window).map(|a| a.id()),
            Some(app.id())
        );
        assert_eq!(
            (env.ops.get_app_from_pid.get())(10).map(|a| a.id()),
            Some(app.id())
        );
        assert_eq!(
            (env.ops.get_window_app_id.get())(&window),
            Some("foo.desktop".to_string())
        );
        assert!((env.ops.is_remote.get())(&window));
    }

    #[test]
    fn unfixed_windows_see_native_results() {
        let env = Enabled::new();
        let stub_win = StubWindow::new(1).with_class("Foo").with_pid(10).build();
        let window: WindowHandle = stub_win.clone();
        env.shell.add_window(stub_win);

        assert!((env.ops.get_window_app.get())(&window).is_none());
        assert!((env.ops.get_app_from_pid.get())(10).is_none());
        assert_eq!((env.ops.get_window_app_id.get())(&window), None);
        assert!(!(env.ops.is_remote.get())(&window));
    }

    #[test]
    fn focus_app_reports_fix_of_focused_window() {
        let env = Enabled::new();
        let stub_win = StubWindow::new(1).with_class("Foo").build();
        let window: WindowHandle = stub_win.clone();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        env.shell.add_window(stub_win.clone());
        env.fix(&window, &app, None);

        assert!((env.ops.get_focus_app.get())().is_none());
        env.shell.focus_window(&stub_win);
        assert_eq!((env.ops.get_focus_app.get())().map(|a| a.id()), Some(app.id()));
    }

    #[test]
    fn counts_pids_and_windows_are_additive() {
        let env = Enabled::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;

        // One window tracked natively.
        let native_win = StubWindow::new(1).with_class("Foo").with_pid(10).build();
        env.shell.add_window(native_win.clone());
        env.shell.set_native_window_app(native_win.id(), &app);

        // One window corrected by us.
        let fixed: WindowHandle = StubWindow::new(2).with_class("Foo").with_pid(11).build();
        env.fix(&fixed, &app, None);

        assert_eq!((env.ops.get_n_windows.get())(&app), 2);
        let mut pids = (env.ops.get_pids.get())(&app);
        pids.sort_unstable();
        assert_eq!(pids, vec![10, 11]);
        assert_eq!((env.ops.get_windows.get())(&app).len(), 2);
    }

    #[test]
    fn placeholder_reports_empty_everything() {
        let env = Enabled::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let placeholder = StubApp::placeholder(2, "window:1") as AppHandle;

        // Natively the placeholder owns the window.
        let stub_win = StubWindow::new(1).with_class("Foo").with_pid(10).build();
        let window: WindowHandle = stub_win.clone();
        env.shell.add_window(stub_win);
        env.shell.set_native_window_app(window.id(), &placeholder);
        env.shell.add_native_running(&placeholder);
        env.fix(&window, &app, Some(&placeholder));

        assert_eq!((env.ops.get_n_windows.get())(&placeholder), 0);
        assert!((env.ops.get_pids.get())(&placeholder).is_empty());
        assert!((env.ops.get_windows.get())(&placeholder).is_empty());
        assert!(!(env.ops.is_on_workspace.get())(&placeholder, WorkspaceId(0)));
        assert_eq!((env.ops.get_state.get())(&placeholder), AppState::Stopped);
        assert_eq!(ids(&(env.ops.get_running.get())()), vec![app.id()]);
    }

    #[test]
    fn state_upgrades_stopped_to_running_for_fixed_windows() {
        let env = Enabled::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let stub_win = StubWindow::new(1).with_class("Foo").build();
        let window: WindowHandle = stub_win.clone();
        env.fix(&window, &app, None);

        assert_eq!((env.ops.get_state.get())(&app), AppState::Running);

        // A fixed window off every workspace no longer counts as running.
        stub_win.set_workspace(None);
        assert_eq!((env.ops.get_state.get())(&app), AppState::Stopped);
    }

    #[test]
    fn on_workspace_checks_fixed_windows_then_native() {
        let env = Enabled::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let stub_win = StubWindow::new(1)
            .with_class("Foo")
            .with_workspace(Some(WorkspaceId(2)))
            .build();
        let window: WindowHandle = stub_win.clone();
        env.fix(&window, &app, None);

        assert!((env.ops.is_on_workspace.get())(&app, WorkspaceId(2)));
        assert!(!(env.ops.is_on_workspace.get())(&app, WorkspaceId(3)));
    }

    #[test]
    fn activation_toggles_fixed_windows_then_calls_native() {
        let env = Enabled::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let stub_win = StubWindow::new(1).with_class("Foo").minimized().build();
        let window: WindowHandle = stub_win.clone();
        env.fix(&window, &app, None);

        (env.ops.activate.get())(&app, 111);
        assert!(!stub_win.is_minimized());
        assert_eq!(stub_win.activations(), vec![111]);
        assert_eq!(env.shell.native_activations(), vec![(app.id(), 111)]);

        // Shown windows get minimized on the next activation.
        (env.ops.activate.get())(&app, 222);
        assert!(stub_win.is_minimized());
        assert_eq!(env.shell.native_activations().len(), 2);
    }

    #[test]
    fn activating_a_placeholder_is_a_no_op() {
        let env = Enabled::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let placeholder = StubApp::placeholder(2, "window:1") as AppHandle;
        let window: WindowHandle = StubWindow::new(1).with_class("Foo").build();
        env.fix(&window, &app, Some(&placeholder));

        (env.ops.activate.get())(&placeholder, 50);
        assert!(env.shell.native_activations().is_empty());
    }

    #[test]
    fn remove_all_restores_native_behavior() {
        let env = Enabled::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let window: WindowHandle = StubWindow::new(1).with_class("Foo").with_pid(10).build();
        env.fix(&window, &app, None);

        assert!((env.ops.get_window_app.get())(&window).is_some());

        let mut env = env;
        let overrides = env.overrides.take().expect("installed");
        overrides.remove_all(&env.ops);

        // Even with the fix still stored, every operation is native again.
        assert!((env.ops.get_window_app.get())(&window).is_none());
        assert!((env.ops.get_app_from_pid.get())(10).is_none());
        assert!(!(env.ops.is_remote.get())(&window));
    }
}
