//! Process-wide handle to the enabled fixer's shared state.
//!
//! Intercepted tracker operations execute inline at arbitrary host call
//! sites with no channel back to the fixer, so the interceptors reach its
//! state through this single statically-owned reference. It is installed
//! once when the fixer is enabled and cleared on teardown; an interceptor
//! that finds it empty falls through to the saved native implementation.

use crate::error::{FixerError, Result};
use crate::overlay::Shared;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

static CURRENT: Lazy<RwLock<Option<Arc<Shared>>>> = Lazy::new(|| RwLock::new(None));

/// Installs the context. Fails if a fixer is already enabled in this
/// process.
pub(crate) fn install(shared: Arc<Shared>) -> Result<()> {
    let mut current = CURRENT.write();
    if current.is_some() {
        return Err(FixerError::AlreadyEnabled);
    }
    *current = Some(shared);
    Ok(())
}

pub(crate) fn clear() {
    *CURRENT.write() = None;
}

/// Runs `f` against the installed context, or returns `None` when no fixer
/// is enabled. The read guard is held for the duration of `f`, so `f` must
/// stay synchronous and must not enable or disable a fixer.
pub(crate) fn with<R>(f: impl FnOnce(&Shared) -> R) -> Option<R> {
    CURRENT.read().as_deref().map(f)
}

#[cfg(test)]
pub(crate) fn exclusive() -> parking_lot::MutexGuard<'static, ()> {
    // Tests that enable a fixer share the process-wide context; serialize
    // them.
    static LOCK: Lazy<parking_lot::Mutex<()>> = Lazy::new(|| parking_lot::Mutex::new(()));
    LOCK.lock()
}
