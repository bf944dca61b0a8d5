//! In-memory host environment for tests.
//!
//! `StubShell` plays both external roles at once: the window manager and the
//! application tracker, including the native `WindowTracker` the operation
//! table is seeded from. All native state is explicit and test-controlled,
//! and every notification and activation the fixer triggers is recorded so
//! tests can assert on exact emission counts.

use super::ops::{TrackerOps, WindowTracker};
use super::{
    AppHandle, AppId, AppState, Application, DesktopEntry, EventTime, Pid, Window, WindowHandle,
    WindowId, WindowManager, WindowType, WorkspaceId,
};
use crate::events::{AppSignal, Handler, SignalBus, SubscriptionId, WindowSignal};
use crate::host::AppSystem;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DisplaySignal {
    WindowCreated,
}

/// Globally-scoped notifications the fixer emitted through the app system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalNotification {
    AppStateChanged(AppId),
    TrackedWindowsChanged,
}

struct WindowState {
    wm_class: Option<String>,
    title: String,
    pid: Pid,
    workspace: Option<WorkspaceId>,
    window_type: WindowType,
    minimized: bool,
    gtk_app_id: Option<String>,
    remote: bool,
}

pub struct StubWindow {
    id: WindowId,
    state: RwLock<WindowState>,
    bus: SignalBus<WindowSignal>,
    activations: RwLock<Vec<EventTime>>,
}

impl StubWindow {
    pub fn new(id: u64) -> StubWindowBuilder {
        StubWindowBuilder {
            id: WindowId(id),
            state: WindowState {
                wm_class: None,
                title: String::new(),
                pid: 0,
                workspace: Some(WorkspaceId(0)),
                window_type: WindowType::Normal,
                minimized: false,
                gtk_app_id: None,
                remote: false,
            },
        }
    }

    pub fn set_wm_class(&self, wm_class: Option<&str>) {
        self.state.write().wm_class = wm_class.map(str::to_owned);
    }

    pub fn set_workspace(&self, workspace: Option<WorkspaceId>) {
        self.state.write().workspace = workspace;
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.state.write().minimized = minimized;
    }

    pub fn set_gtk_app_id(&self, id: Option<&str>) {
        self.state.write().gtk_app_id = id.map(str::to_owned);
    }

    pub fn set_remote(&self, remote: bool) {
        self.state.write().remote = remote;
    }

    pub fn emit_focus(&self) {
        self.bus.emit(WindowSignal::FocusIn, &());
    }

    pub fn emit_unmanaged(&self) {
        self.bus.emit(WindowSignal::Unmanaged, &());
    }

    /// Activation timestamps recorded through `Window::activate`.
    pub fn activations(&self) -> Vec<EventTime> {
        self.activations.read().clone()
    }

    pub fn handler_count(&self, signal: WindowSignal) -> usize {
        self.bus.handler_count(signal)
    }
}

pub struct StubWindowBuilder {
    id: WindowId,
    state: WindowState,
}

impl StubWindowBuilder {
    pub fn with_class(mut self, wm_class: &str) -> Self {
        self.state.wm_class = Some(wm_class.to_owned());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.state.title = title.to_owned();
        self
    }

    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.state.pid = pid;
        self
    }

    pub fn with_workspace(mut self, workspace: Option<WorkspaceId>) -> Self {
        self.state.workspace = workspace;
        self
    }

    pub fn with_type(mut self, window_type: WindowType) -> Self {
        self.state.window_type = window_type;
        self
    }

    pub fn minimized(mut self) -> Self {
        self.state.minimized = true;
        self
    }

    pub fn build(self) -> Arc<StubWindow> {
        Arc::new(StubWindow {
            id: self.id,
            state: RwLock::new(self.state),
            bus: SignalBus::new(),
            activations: RwLock::new(Vec::new()),
        })
    }
}

impl Window for StubWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn wm_class(&self) -> Option<String> {
        self.state.read().wm_class.clone()
    }

    fn title(&self) -> String {
        self.state.read().title.clone()
    }

    fn pid(&self) -> Pid {
        self.state.read().pid
    }

    fn workspace(&self) -> Option<WorkspaceId> {
        self.state.read().workspace
    }

    fn window_type(&self) -> WindowType {
        self.state.read().window_type
    }

    fn is_minimized(&self) -> bool {
        self.state.read().minimized
    }

    fn activate(&self, time: EventTime) {
        self.state.write().minimized = false;
        self.activations.write().push(time);
    }

    fn minimize(&self) {
        self.state.write().minimized = true;
    }

    fn connect(&self, signal: WindowSignal, handler: Handler<()>) -> SubscriptionId {
        self.bus.connect(signal, handler)
    }

    fn disconnect(&self, sub: SubscriptionId) {
        self.bus.disconnect(sub);
    }
}

pub struct StubApp {
    id: AppId,
    shell_id: String,
    name: String,
    entry: Option<DesktopEntry>,
    emitted: RwLock<Vec<AppSignal>>,
    window_activations: RwLock<Vec<(WindowId, EventTime)>>,
}

impl StubApp {
    /// An installed application with desktop-file metadata.
    pub fn desktop(id: u64, desktop_id: &str, name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: AppId(id),
            shell_id: desktop_id.to_owned(),
            name: name.to_owned(),
            entry: Some(DesktopEntry {
                id: desktop_id.to_owned(),
                name: name.to_owned(),
            }),
            emitted: RwLock::new(Vec::new()),
            window_activations: RwLock::new(Vec::new()),
        })
    }

    /// A placeholder application the tracker fabricates for an unclassified
    /// window: it has a synthetic id and no desktop-file metadata.
    pub fn placeholder(id: u64, shell_id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: AppId(id),
            shell_id: shell_id.to_owned(),
            name: shell_id.to_owned(),
            entry: None,
            emitted: RwLock::new(Vec::new()),
            window_activations: RwLock::new(Vec::new()),
        })
    }

    /// App-level signals emitted so far, in order.
    pub fn emitted(&self) -> Vec<AppSignal> {
        self.emitted.read().clone()
    }

    pub fn clear_emitted(&self) {
        self.emitted.write().clear();
    }

    pub fn window_activations(&self) -> Vec<(WindowId, EventTime)> {
        self.window_activations.read().clone()
    }
}

impl Application for StubApp {
    fn id(&self) -> AppId {
        self.id
    }

    fn shell_id(&self) -> String {
        self.shell_id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn descriptor(&self) -> Option<DesktopEntry> {
        self.entry.clone()
    }

    fn activate_window(&self, window: &WindowHandle, time: EventTime) {
        self.window_activations.write().push((window.id(), time));
    }

    fn emit(&self, signal: AppSignal) {
        self.emitted.write().push(signal);
    }
}

/// Combined window manager + application tracker with explicit native state.
#[derive(Default)]
pub struct StubShell {
    windows: RwLock<Vec<Arc<StubWindow>>>,
    focused: RwLock<Option<Arc<StubWindow>>>,
    clock: AtomicU32,
    created_bus: SignalBus<DisplaySignal, WindowHandle>,

    desktop_lookup: RwLock<HashMap<String, AppHandle>>,
    heuristic_lookup: RwLock<HashMap<String, AppHandle>>,
    startup_lookup: RwLock<HashMap<String, AppHandle>>,
    window_apps: RwLock<HashMap<WindowId, AppHandle>>,
    pid_apps: RwLock<HashMap<Pid, AppHandle>>,
    native_running: RwLock<Vec<AppHandle>>,

    notifications: RwLock<Vec<GlobalNotification>>,
    native_activations: RwLock<Vec<(AppId, EventTime)>>,
}

impl StubShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Operation table seeded with this shell's native tracker.
    pub fn tracker_ops(self: &Arc<Self>) -> Arc<TrackerOps> {
        TrackerOps::from_native(self.clone())
    }

    /// Adds a window without firing the creation signal (pre-existing at
    /// startup).
    pub fn add_window(&self, window: Arc<StubWindow>) {
        self.windows.write().push(window);
    }

    /// Adds a window and fires the creation signal.
    pub fn create_window(&self, window: Arc<StubWindow>) {
        self.add_window(window.clone());
        let handle: WindowHandle = window;
        self.created_bus.emit(DisplaySignal::WindowCreated, &handle);
    }

    /// Re-fires the creation signal for an already-added window, as
    /// overlapping signal deliveries do.
    pub fn emit_window_created(&self, window: &Arc<StubWindow>) {
        let handle: WindowHandle = window.clone();
        self.created_bus.emit(DisplaySignal::WindowCreated, &handle);
    }

    /// Drops the window from the environment and fires its removal signal.
    pub fn remove_window(&self, window: &Arc<StubWindow>) {
        self.windows.write().retain(|w| w.id() != window.id());
        self.window_apps.write().remove(&window.id());
        let mut focused = self.focused.write();
        if focused.as_ref().is_some_and(|w| w.id() == window.id()) {
            *focused = None;
        }
        drop(focused);
        window.emit_unmanaged();
    }

    pub fn focus_window(&self, window: &Arc<StubWindow>) {
        *self.focused.write() = Some(window.clone());
        window.emit_focus();
    }

    pub fn set_time(&self, time: EventTime) {
        self.clock.store(time, Ordering::Relaxed);
    }

    /// Registers a desktop-file-class lookup hit for the exact key queried.
    pub fn register_desktop_class(&self, key: &str, app: &AppHandle) {
        self.desktop_lookup.write().insert(key.to_owned(), app.clone());
    }

    pub fn register_heuristic_basename(&self, key: &str, app: &AppHandle) {
        self.heuristic_lookup.write().insert(key.to_owned(), app.clone());
    }

    pub fn register_startup_class(&self, key: &str, app: &AppHandle) {
        self.startup_lookup.write().insert(key.to_owned(), app.clone());
    }

    /// Sets the native tracker's window→application mapping (placeholders
    /// included).
    pub fn set_native_window_app(&self, window: WindowId, app: &AppHandle) {
        self.window_apps.write().insert(window, app.clone());
    }

    pub fn set_native_pid_app(&self, pid: Pid, app: &AppHandle) {
        self.pid_apps.write().insert(pid, app.clone());
    }

    pub fn add_native_running(&self, app: &AppHandle) {
        self.native_running.write().push(app.clone());
    }

    pub fn notifications(&self) -> Vec<GlobalNotification> {
        self.notifications.read().clone()
    }

    pub fn clear_notifications(&self) {
        self.notifications.write().clear();
    }

    pub fn native_activations(&self) -> Vec<(AppId, EventTime)> {
        self.native_activations.read().clone()
    }

    pub fn created_handler_count(&self) -> usize {
        self.created_bus.handler_count(DisplaySignal::WindowCreated)
    }

    fn native_windows_of(&self, app: &AppHandle) -> Vec<Arc<StubWindow>> {
        let window_apps = self.window_apps.read();
        self.windows
            .read()
            .iter()
            .filter(|w| {
                window_apps
                    .get(&w.id())
                    .is_some_and(|mapped| mapped.id() == app.id())
            })
            .cloned()
            .collect()
    }
}

impl WindowManager for StubShell {
    fn windows(&self) -> Vec<WindowHandle> {
        self.windows
            .read()
            .iter()
            .map(|w| w.clone() as WindowHandle)
            .collect()
    }

    fn focused_window(&self) -> Option<WindowHandle> {
        self.focused.read().clone().map(|w| w as WindowHandle)
    }

    fn current_time(&self) -> EventTime {
        self.clock.load(Ordering::Relaxed)
    }

    fn connect_window_created(&self, handler: Handler<WindowHandle>) -> SubscriptionId {
        self.created_bus.connect(DisplaySignal::WindowCreated, handler)
    }

    fn disconnect_window_created(&self, sub: SubscriptionId) {
        self.created_bus.disconnect(sub);
    }
}

impl AppSystem for StubShell {
    fn lookup_desktop_wmclass(&self, wm_class: &str) -> Option<AppHandle> {
        self.desktop_lookup.read().get(wm_class).cloned()
    }

    fn lookup_heuristic_basename(&self, name: &str) -> Option<AppHandle> {
        self.heuristic_lookup.read().get(name).cloned()
    }

    fn lookup_startup_wmclass(&self, wm_class: &str) -> Option<AppHandle> {
        self.startup_lookup.read().get(wm_class).cloned()
    }

    fn emit_app_state_changed(&self, app: &AppHandle) {
        self.notifications
            .write()
            .push(GlobalNotification::AppStateChanged(app.id()));
    }

    fn emit_tracked_windows_changed(&self) {
        self.notifications
            .write()
            .push(GlobalNotification::TrackedWindowsChanged);
    }
}

impl WindowTracker for StubShell {
    fn window_app(&self, window: &WindowHandle) -> Option<AppHandle> {
        self.window_apps.read().get(&window.id()).cloned()
    }

    fn app_from_pid(&self, pid: Pid) -> Option<AppHandle> {
        self.pid_apps.read().get(&pid).cloned()
    }

    fn focus_app(&self) -> Option<AppHandle> {
        let focused = self.focused.read().clone()?;
        self.window_apps.read().get(&focused.id()).cloned()
    }

    fn app_window_count(&self, app: &AppHandle) -> usize {
        self.native_windows_of(app).len()
    }

    fn app_pids(&self, app: &AppHandle) -> Vec<Pid> {
        self.native_windows_of(app).iter().map(|w| w.pid()).collect()
    }

    fn app_windows(&self, app: &AppHandle) -> Vec<WindowHandle> {
        self.native_windows_of(app)
            .into_iter()
            .map(|w| w as WindowHandle)
            .collect()
    }

    fn app_on_workspace(&self, app: &AppHandle, workspace: WorkspaceId) -> bool {
        self.native_windows_of(app)
            .iter()
            .any(|w| w.workspace() == Some(workspace))
    }

    fn app_state(&self, app: &AppHandle) -> AppState {
        if self.native_windows_of(app).is_empty() {
            AppState::Stopped
        } else {
            AppState::Running
        }
    }

    fn running_apps(&self) -> Vec<AppHandle> {
        self.native_running.read().clone()
    }

    fn activate_app(&self, app: &AppHandle, time: EventTime) {
        self.native_activations.write().push((app.id(), time));
    }

    fn window_app_id(&self, window: &WindowHandle) -> Option<String> {
        let windows = self.windows.read();
        let win = windows.iter().find(|w| w.id() == window.id())?;
        let app_id = win.state.read().gtk_app_id.clone();
        app_id
    }

    fn window_is_remote(&self, window: &WindowHandle) -> bool {
        let windows = self.windows.read();
        windows
            .iter()
            .find(|w| w.id() == window.id())
            .is_some_and(|w| w.state.read().remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_tracker_reflects_window_app_map() {
        let shell = StubShell::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let win = StubWindow::new(1).with_class("Foo").with_pid(42).build();

        shell.add_window(win.clone());
        shell.set_native_window_app(win.id(), &app);

        let handle: WindowHandle = win.clone();
        assert_eq!(shell.window_app(&handle).map(|a| a.id()), Some(app.id()));
        assert_eq!(shell.app_window_count(&app), 1);
        assert_eq!(shell.app_pids(&app), vec![42]);
        assert_eq!(shell.app_state(&app), AppState::Running);
        assert!(shell.app_on_workspace(&app, WorkspaceId(0)));

        shell.remove_window(&win);
        assert_eq!(shell.app_window_count(&app), 0);
        assert_eq!(shell.app_state(&app), AppState::Stopped);
    }

    #[test]
    fn create_window_fires_creation_signal() {
        let shell = StubShell::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        let seen_cl = seen.clone();
        shell.connect_window_created(Arc::new(move |win: &WindowHandle| {
            seen_cl.write().push(win.id());
        }));

        shell.create_window(StubWindow::new(9).with_title("t").build());
        assert_eq!(*seen.read(), vec![WindowId(9)]);
    }
}
