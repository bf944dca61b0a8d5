//! winfix corrects application identity for windows a desktop shell's
//! native window-to-application matcher fails to classify, typically
//! windows of remote, forwarded, or sandbox-isolated processes whose class
//! hint matches no locally installed application descriptor.
//!
//! The crate does not reimplement the native matcher. It supplements it:
//! when a window stays unmatched, a fallback lookup chain recovers the
//! intended application, the corrected association is stored, and every
//! tracker read path the shell consumes is intercepted so all consumers
//! observe the corrected view without knowing a correction occurred.
//!
//! Embedding: seed a [`host::TrackerOps`] table from your native tracker,
//! route the shell's reads through it, and call [`WindowFixer::enable`].
//! Drive [`TaskQueue::run_pending`] from an idle turn of your event loop.
//! Dropping or disabling the fixer restores native behavior exactly.

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod overlay;

mod context;

pub use config::Config;
pub use error::{FixerError, Result};
pub use overlay::{AppMatcher, MatchOutcome, TaskQueue, WindowFixer};

/// Initializes the tracing subscriber; `level` applies when `RUST_LOG` is
/// unset.
pub fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| FixerError::Config(anyhow::anyhow!(e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
