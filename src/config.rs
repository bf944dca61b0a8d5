use anyhow::Context;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub fixer: FixerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

/// Behavior knobs of the fixer itself.
///
/// The activation and focus-forwarding overrides shipped later than the rest
/// of the interception surface; they default to on but can be switched off
/// to fall back to the plain read-path corrections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FixerConfig {
    /// Run the startup scan over already-visible windows.
    pub scan_existing_windows: bool,
    /// Install the activation override that toggles fixed windows between
    /// minimized and shown before invoking native activation.
    pub simulate_activation: bool,
    /// Forward a fixed window's focus-gained signal to the matched
    /// application's activation.
    pub forward_focus_activation: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            filter: "winfix=info".to_string(),
        }
    }
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            scan_existing_windows: true,
            simulate_activation: true,
            forward_focus_activation: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            fixer: FixerConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("WINFIX_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("failed to load configuration from {:?}", config_path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(anyhow::anyhow!("invalid logging level: {other}").into()),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => return Err(anyhow::anyhow!("invalid logging format: {other}").into()),
        }

        Ok(())
    }
}
