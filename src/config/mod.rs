//! Runtime configuration.
//!
//! Sizing limits and timeouts for the fabric, session, and exchange
//! tables. Values come from defaults, an optional TOML file, and
//! `WEAVE_*` environment variables, in that order of precedence.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, WeaveError};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Fabric table sizing.
    pub fabric: FabricConfig,
    /// Session table sizing.
    pub session: SessionConfig,
    /// Exchange table sizing and timeouts.
    pub exchange: ExchangeConfig,
}

/// Fabric table sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Slots in the fabric table.
    pub max_fabrics: usize,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self { max_fabrics: 16 }
    }
}

/// Session table sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Live secure sessions allowed at once.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_sessions: 64 }
    }
}

/// Exchange table sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Open exchanges allowed at once.
    pub max_exchanges: usize,
    /// Default response deadline in milliseconds.
    pub response_timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            max_exchanges: 32,
            response_timeout_ms: 4000,
        }
    }
}

impl Config {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WeaveError::Config(format!("{}: {e}", path.display())))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| WeaveError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Apply `WEAVE_*` environment overrides on top of `self`.
    pub fn apply_env(mut self) -> Self {
        if let Some(v) = env_usize("WEAVE_MAX_FABRICS") {
            self.fabric.max_fabrics = v;
        }
        if let Some(v) = env_usize("WEAVE_MAX_SESSIONS") {
            self.session.max_sessions = v;
        }
        if let Some(v) = env_usize("WEAVE_MAX_EXCHANGES") {
            self.exchange.max_exchanges = v;
        }
        if let Some(v) = env_u64("WEAVE_RESPONSE_TIMEOUT_MS") {
            self.exchange.response_timeout_ms = v;
        }
        self
    }

    /// Defaults, file (if given), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        Ok(base.apply_env())
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}
