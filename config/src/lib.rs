//! Configuration loading for pledge.
//!
//! Reads `~/.pledge/config.toml`, or the file named by `PLEDGE_CONFIG`.
//! Every section and field is optional:
//!
//! ```toml
//! [event_loop]
//! microtask_budget = 100000
//! catch_task_panics = true
//!
//! [log]
//! filter = "pledge_core=trace"
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use pledge_scheduler::EventLoopConfig;

pub const CONFIG_ENV_VAR: &str = "PLEDGE_CONFIG";

#[derive(Debug, Default, Deserialize)]
pub struct PledgeConfig {
    pub event_loop: Option<EventLoopConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. "pledge_core=debug".
    /// Ignored when `PLEDGE_LOG` or `RUST_LOG` is set.
    pub filter: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl PledgeConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        Self::parse(&content).map_err(|err| {
            tracing::warn!("Failed to parse config at {}: {}", path.display(), err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn event_loop(&self) -> EventLoopConfig {
        self.event_loop.unwrap_or_default()
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref().and_then(|log| log.filter.as_deref())
    }
}

/// `PLEDGE_CONFIG` if set, otherwise `~/.pledge/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_ENV_VAR)
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".pledge").join("config.toml"))
}
