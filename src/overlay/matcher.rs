//! Best-effort recovery of the application a window belongs to.
//!
//! The fallback chain compensates for the case-sensitivity and naming
//! variance of desktop-file classes, which is the real-world failure mode
//! behind unmatched windows. The order is deliberate contract, not an
//! optimization: desktop-file class verbatim, then lowercased, then the
//! heuristic basename lookup, then startup-notification classes. First hit
//! wins; a window with no class hint cannot be matched at all.

use crate::host::{AppHandle, AppSystem, Application, Window, WindowHandle, WindowLabel};
use std::sync::Arc;
use tracing::debug;

pub struct AppMatcher {
    apps: Arc<dyn AppSystem>,
}

#[derive(Clone)]
pub enum MatchOutcome {
    /// The native tracker already resolved the window to a real application;
    /// nothing to correct.
    AlreadyTracked,
    /// No class hint, no way to link the window to anything.
    NoWmClass,
    /// Every fallback lookup came up empty.
    NoMatch,
    Matched { app: AppHandle },
}

impl AppMatcher {
    pub fn new(apps: Arc<dyn AppSystem>) -> Self {
        Self { apps }
    }

    /// `native` is whatever the tracker currently associates with the
    /// window, placeholder or not.
    pub fn resolve(&self, window: &WindowHandle, native: Option<&AppHandle>) -> MatchOutcome {
        if let Some(app) = native {
            if let Some(entry) = app.descriptor() {
                debug!(
                    "{} is already linked to {}",
                    WindowLabel(window.as_ref()),
                    entry.name
                );
                return MatchOutcome::AlreadyTracked;
            }
        }

        let Some(wm_class) = window.wm_class() else {
            debug!(
                "{} has no class hint, so it can't be linked to an app",
                WindowLabel(window.as_ref())
            );
            return MatchOutcome::NoWmClass;
        };

        match self.lookup_chain(&wm_class) {
            Some(app) => MatchOutcome::Matched { app },
            None => {
                debug!("found no local app matching window class {wm_class}");
                MatchOutcome::NoMatch
            }
        }
    }

    fn lookup_chain(&self, wm_class: &str) -> Option<AppHandle> {
        if let Some(app) = self.lookup_desktop(wm_class) {
            return Some(app);
        }

        let lower = wm_class.to_lowercase();
        if lower != wm_class {
            if let Some(app) = self.lookup_desktop(&lower) {
                return Some(app);
            }
        }

        if let Some(app) = self.apps.lookup_heuristic_basename(wm_class) {
            debug!("heuristic basename lookup matched {}", app.name());
            return Some(app);
        }

        if let Some(app) = self.apps.lookup_startup_wmclass(wm_class) {
            debug!("startup-notification class lookup matched {}", app.name());
            return Some(app);
        }

        None
    }

    fn lookup_desktop(&self, wm_class: &str) -> Option<AppHandle> {
        match self.apps.lookup_desktop_wmclass(wm_class) {
            Some(app) => {
                debug!("desktop class {wm_class} refers to app {}", app.name());
                Some(app)
            }
            None => {
                debug!("no desktop entry for class {wm_class}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::stub::{StubApp, StubShell, StubWindow};
    use crate::host::AppId;

    fn matched_id(outcome: MatchOutcome) -> Option<AppId> {
        match outcome {
            MatchOutcome::Matched { app } => Some(app.id()),
            _ => None,
        }
    }

    #[test]
    fn verbatim_desktop_class_wins() {
        let shell = StubShell::new();
        let app = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        shell.register_desktop_class("Foo", &app);

        let window: WindowHandle = StubWindow::new(1).with_class("Foo").build();
        let matcher = AppMatcher::new(shell);
        assert_eq!(matched_id(matcher.resolve(&window, None)), Some(app.id()));
    }

    #[test]
    fn falls_back_to_lowercased_class() {
        let shell = StubShell::new();
        let app = StubApp::desktop(1, "bar.desktop", "Bar") as AppHandle;
        shell.register_desktop_class("bar", &app);

        let window: WindowHandle = StubWindow::new(1).with_class("Bar").build();
        let matcher = AppMatcher::new(shell);
        assert_eq!(matched_id(matcher.resolve(&window, None)), Some(app.id()));
    }

    #[test]
    fn heuristic_runs_before_startup_class() {
        let shell = StubShell::new();
        let heuristic = StubApp::desktop(1, "baz.desktop", "Baz") as AppHandle;
        let startup = StubApp::desktop(2, "other.desktop", "Other") as AppHandle;
        shell.register_heuristic_basename("Baz", &heuristic);
        shell.register_startup_class("Baz", &startup);

        let window: WindowHandle = StubWindow::new(1).with_class("Baz").build();
        let matcher = AppMatcher::new(shell);
        assert_eq!(
            matched_id(matcher.resolve(&window, None)),
            Some(heuristic.id())
        );
    }

    #[test]
    fn startup_class_is_the_last_resort() {
        let shell = StubShell::new();
        let app = StubApp::desktop(1, "qux.desktop", "Qux") as AppHandle;
        shell.register_startup_class("Qux", &app);

        let window: WindowHandle = StubWindow::new(1).with_class("Qux").build();
        let matcher = AppMatcher::new(shell);
        assert_eq!(matched_id(matcher.resolve(&window, None)), Some(app.id()));
    }

    #[test]
    fn native_match_with_descriptor_short_circuits() {
        let shell = StubShell::new();
        let real = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        shell.register_desktop_class("Foo", &real);

        let window: WindowHandle = StubWindow::new(1).with_class("Foo").build();
        let matcher = AppMatcher::new(shell);
        assert!(matches!(
            matcher.resolve(&window, Some(&real)),
            MatchOutcome::AlreadyTracked
        ));
    }

    #[test]
    fn placeholder_native_match_does_not_short_circuit() {
        let shell = StubShell::new();
        let real = StubApp::desktop(1, "foo.desktop", "Foo") as AppHandle;
        let placeholder = StubApp::placeholder(2, "window:1") as AppHandle;
        shell.register_desktop_class("Foo", &real);

        let window: WindowHandle = StubWindow::new(1).with_class("Foo").build();
        let matcher = AppMatcher::new(shell);
        assert_eq!(
            matched_id(matcher.resolve(&window, Some(&placeholder))),
            Some(real.id())
        );
    }

    #[test]
    fn missing_class_hint_is_unmatchable() {
        let shell = StubShell::new();
        let matcher = AppMatcher::new(shell);
        let window: WindowHandle = StubWindow::new(1).with_title("anonymous").build();
        assert!(matches!(
            matcher.resolve(&window, None),
            MatchOutcome::NoWmClass
        ));
    }

    #[test]
    fn empty_chain_reports_no_match() {
        let shell = StubShell::new();
        let matcher = AppMatcher::new(shell);
        let window: WindowHandle = StubWindow::new(1).with_class("Nope").build();
        assert!(matches!(
            matcher.resolve(&window, None),
            MatchOutcome::NoMatch
        ));
    }
}
