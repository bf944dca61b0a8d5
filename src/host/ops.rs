//! Swappable operation table over the native window tracker.
//!
//! Every read path the shell uses to learn about window/application
//! relationships goes through one `OpSlot` of this table. The host seeds the
//! table from its native tracker; the override layer later swaps each slot
//! for an interceptor that closes over the saved original, and restores the
//! originals on teardown. Callers always dispatch through the slot, so they
//! observe whichever implementation is currently installed.

use super::{AppHandle, AppState, EventTime, Pid, WindowHandle, WorkspaceId};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

pub type WindowAppFn = dyn Fn(&WindowHandle) -> Option<AppHandle> + Send + Sync;
pub type AppFromPidFn = dyn Fn(Pid) -> Option<AppHandle> + Send + Sync;
pub type FocusAppFn = dyn Fn() -> Option<AppHandle> + Send + Sync;
pub type NWindowsFn = dyn Fn(&AppHandle) -> usize + Send + Sync;
pub type PidsFn = dyn Fn(&AppHandle) -> Vec<Pid> + Send + Sync;
pub type WindowsFn = dyn Fn(&AppHandle) -> Vec<WindowHandle> + Send + Sync;
pub type OnWorkspaceFn = dyn Fn(&AppHandle, WorkspaceId) -> bool + Send + Sync;
pub type StateFn = dyn Fn(&AppHandle) -> AppState + Send + Sync;
pub type RunningFn = dyn Fn() -> Vec<AppHandle> + Send + Sync;
pub type ActivateFn = dyn Fn(&AppHandle, EventTime) + Send + Sync;
pub type WindowAppIdFn = dyn Fn(&WindowHandle) -> Option<String> + Send + Sync;
pub type IsRemoteFn = dyn Fn(&WindowHandle) -> bool + Send + Sync;

/// The native implementations behind the table, provided by the host.
pub trait WindowTracker: Send + Sync {
    fn window_app(&self, window: &WindowHandle) -> Option<AppHandle>;
    fn app_from_pid(&self, pid: Pid) -> Option<AppHandle>;
    fn focus_app(&self) -> Option<AppHandle>;
    fn app_window_count(&self, app: &AppHandle) -> usize;
    fn app_pids(&self, app: &AppHandle) -> Vec<Pid>;
    fn app_windows(&self, app: &AppHandle) -> Vec<WindowHandle>;
    fn app_on_workspace(&self, app: &AppHandle, workspace: WorkspaceId) -> bool;
    fn app_state(&self, app: &AppHandle) -> AppState;
    fn running_apps(&self) -> Vec<AppHandle>;
    fn activate_app(&self, app: &AppHandle, time: EventTime);
    fn window_app_id(&self, window: &WindowHandle) -> Option<String>;
    fn window_is_remote(&self, window: &WindowHandle) -> bool;
}

/// One replaceable operation. Holds the currently-installed implementation;
/// `set` swaps it and hands back the previous one so the caller can keep it
/// for restoration.
pub struct OpSlot<F: ?Sized + Send + Sync> {
    name: &'static str,
    current: RwLock<Arc<F>>,
}

impl<F: ?Sized + Send + Sync> OpSlot<F> {
    pub fn new(name: &'static str, implementation: Arc<F>) -> Self {
        Self {
            name,
            current: RwLock::new(implementation),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Currently-installed implementation. Cloned out so the caller invokes
    /// it without holding the slot lock.
    pub fn get(&self) -> Arc<F> {
        self.current.read().clone()
    }

    /// Installs a new implementation, returning the previous one.
    pub fn set(&self, implementation: Arc<F>) -> Arc<F> {
        trace!("swapping implementation of {}", self.name);
        std::mem::replace(&mut *self.current.write(), implementation)
    }
}

/// The full dispatch table: one slot per tracker operation the shell reads
/// window/application relationships through.
pub struct TrackerOps {
    pub get_window_app: OpSlot<WindowAppFn>,
    pub get_app_from_pid: OpSlot<AppFromPidFn>,
    pub get_focus_app: OpSlot<FocusAppFn>,
    pub get_n_windows: OpSlot<NWindowsFn>,
    pub get_pids: OpSlot<PidsFn>,
    pub get_windows: OpSlot<WindowsFn>,
    pub is_on_workspace: OpSlot<OnWorkspaceFn>,
    pub get_state: OpSlot<StateFn>,
    pub get_running: OpSlot<RunningFn>,
    pub activate: OpSlot<ActivateFn>,
    pub get_window_app_id: OpSlot<WindowAppIdFn>,
    pub is_remote: OpSlot<IsRemoteFn>,
}

impl TrackerOps {
    /// Seeds every slot from the host's native tracker.
    pub fn from_native(native: Arc<dyn WindowTracker>) -> Arc<Self> {
        let n = native.clone();
        let get_window_app: Arc<WindowAppFn> = Arc::new(move |win| n.window_app(win));
        let n = native.clone();
        let get_app_from_pid: Arc<AppFromPidFn> = Arc::new(move |pid| n.app_from_pid(pid));
        let n = native.clone();
        let get_focus_app: Arc<FocusAppFn> = Arc::new(move || n.focus_app());
        let n = native.clone();
        let get_n_windows: Arc<NWindowsFn> = Arc::new(move |app| n.app_window_count(app));
        let n = native.clone();
        let get_pids: Arc<PidsFn> = Arc::new(move |app| n.app_pids(app));
        let n = native.clone();
        let get_windows: Arc<WindowsFn> = Arc::new(move |app| n.app_windows(app));
        let n = native.clone();
        let is_on_workspace: Arc<OnWorkspaceFn> = Arc::new(move |app, ws| n.app_on_workspace(app, ws));
        let n = native.clone();
        let get_state: Arc<StateFn> = Arc::new(move |app| n.app_state(app));
        let n = native.clone();
        let get_running: Arc<RunningFn> = Arc::new(move || n.running_apps());
        let n = native.clone();
        let activate: Arc<ActivateFn> = Arc::new(move |app, time| n.activate_app(app, time));
        let n = native.clone();
        let get_window_app_id: Arc<WindowAppIdFn> = Arc::new(move |win| n.window_app_id(win));
        let n = native;
        let is_remote: Arc<IsRemoteFn> = Arc::new(move |win| n.window_is_remote(win));

        Arc::new(Self {
            get_window_app: OpSlot::new("get_window_app", get_window_app),
            get_app_from_pid: OpSlot::new("get_app_from_pid", get_app_from_pid),
            get_focus_app: OpSlot::new("get_focus_app", get_focus_app),
            get_n_windows: OpSlot::new("get_n_windows", get_n_windows),
            get_pids: OpSlot::new("get_pids", get_pids),
            get_windows: OpSlot::new("get_windows", get_windows),
            is_on_workspace: OpSlot::new("is_on_workspace", is_on_workspace),
            get_state: OpSlot::new("get_state", get_state),
            get_running: OpSlot::new("get_running", get_running),
            activate: OpSlot::new("activate", activate),
            get_window_app_id: OpSlot::new("get_window_app_id", get_window_app_id),
            is_remote: OpSlot::new("is_remote", is_remote),
        })
    }
}
