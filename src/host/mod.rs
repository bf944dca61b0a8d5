//! Interfaces to the host environment.
//!
//! The fixer consumes a window manager and an application-tracking subsystem
//! it does not own. These traits are the full surface it relies on; the
//! corresponding live objects are identity-keyed and reached through
//! `Arc<dyn ...>` handles. `stub` provides an in-memory implementation for
//! tests and embedder test suites.

pub mod ops;
pub mod stub;

use crate::events::{AppSignal, Handler, SubscriptionId, WindowSignal};
use std::fmt;
use std::sync::Arc;

pub use ops::{TrackerOps, WindowTracker};

/// Identity key of a window. Stable for the window's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// Identity key of an application descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(pub u64);

/// Identity key of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceId(pub u32);

pub type Pid = u32;

/// Event timestamp the window manager expects on activation calls.
pub type EventTime = u32;

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowType {
    Normal,
    Dialog,
    Dock,
    Utility,
    Splash,
    Other,
}

/// Aggregate run state an application reports to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Stopped,
    Starting,
    Running,
}

/// Resolved desktop-file metadata of an installed application.
///
/// Placeholder applications the tracker synthesizes for unclassified windows
/// have none; that absence is how the fixer recognizes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub id: String,
    pub name: String,
}

pub type WindowHandle = Arc<dyn Window>;
pub type AppHandle = Arc<dyn Application>;

/// A live window owned by the window manager.
///
/// The fixer only reads its properties, attaches signal subscriptions, and
/// issues activate/minimize commands; it never mutates the window at rest.
pub trait Window: Send + Sync {
    fn id(&self) -> WindowId;

    /// Class hint the window advertises, if any. May be unset right after
    /// creation and populated later.
    fn wm_class(&self) -> Option<String>;

    fn title(&self) -> String;
    fn pid(&self) -> Pid;
    fn workspace(&self) -> Option<WorkspaceId>;
    fn window_type(&self) -> WindowType;
    fn is_minimized(&self) -> bool;

    /// Raise and unminimize the window.
    fn activate(&self, time: EventTime);
    fn minimize(&self);

    fn connect(&self, signal: WindowSignal, handler: Handler<()>) -> SubscriptionId;
    fn disconnect(&self, sub: SubscriptionId);
}

/// A live application descriptor owned by the tracking subsystem.
pub trait Application: Send + Sync {
    fn id(&self) -> AppId;

    /// Shell-visible identifier, e.g. `firefox.desktop` for an installed
    /// application or a synthetic `window:...` id for a placeholder.
    fn shell_id(&self) -> String;

    fn name(&self) -> String;

    /// Desktop-file metadata; `None` for placeholder applications.
    fn descriptor(&self) -> Option<DesktopEntry>;

    /// Activate the application for one specific window.
    fn activate_window(&self, window: &WindowHandle, time: EventTime);

    fn emit(&self, signal: AppSignal);
}

/// Window-manager surface the fixer consumes.
pub trait WindowManager: Send + Sync {
    /// All currently-visible windows, for the startup scan.
    fn windows(&self) -> Vec<WindowHandle>;

    fn focused_window(&self) -> Option<WindowHandle>;

    /// Current event timestamp for activation calls.
    fn current_time(&self) -> EventTime;

    fn connect_window_created(&self, handler: Handler<WindowHandle>) -> SubscriptionId;
    fn disconnect_window_created(&self, sub: SubscriptionId);
}

/// Application-tracking surface the fixer consumes: the fallback lookups of
/// the matching chain plus the global change notifications a native match
/// would have fired.
pub trait AppSystem: Send + Sync {
    /// Desktop-file-class lookup with the class string verbatim.
    fn lookup_desktop_wmclass(&self, wm_class: &str) -> Option<AppHandle>;

    /// Heuristic lookup by executable basename.
    fn lookup_heuristic_basename(&self, name: &str) -> Option<AppHandle>;

    /// Lookup via startup-notification class declarations.
    fn lookup_startup_wmclass(&self, wm_class: &str) -> Option<AppHandle>;

    fn emit_app_state_changed(&self, app: &AppHandle);
    fn emit_tracked_windows_changed(&self);
}

/// Log label for a window: `Foo window "Title"`, or `window "Title"` when
/// the class hint is absent.
pub struct WindowLabel<'a>(pub &'a dyn Window);

impl fmt::Display for WindowLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.wm_class() {
            Some(class) => write!(f, "{} window \"{}\"", class, self.0.title()),
            None => write!(f, "window \"{}\"", self.0.title()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubWindow;
    use super::*;

    #[test]
    fn window_label_includes_class_when_present() {
        let win = StubWindow::new(1)
            .with_class("Firefox")
            .with_title("Mozilla Firefox")
            .build();
        assert_eq!(
            WindowLabel(win.as_ref()).to_string(),
            "Firefox window \"Mozilla Firefox\""
        );

        let bare = StubWindow::new(2).with_title("popup").build();
        assert_eq!(WindowLabel(bare.as_ref()).to_string(), "window \"popup\"");
    }
}
