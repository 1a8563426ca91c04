//! Persistent configuration for logbench.
//!
//! Stores user settings in `~/.logbench/config.json`: where the browser
//! agent listens, how long waits may take, and whether run reports are
//! recorded. Set `LOGBENCH_HOME` to use another directory.
//!
//! # Example
//!
//! ```no_run
//! use logbench_core::config::HarnessConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = HarnessConfig::load();
//! println!("agent at {}:{}", config.agent_host, config.agent_port);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::DriverConfig;

const CONFIG_FILENAME: &str = "config.json";

/// Environment variable overriding the logbench directory.
pub const HOME_ENV: &str = "LOGBENCH_HOME";

pub const DEFAULT_AGENT_HOST: &str = "127.0.0.1";
pub const DEFAULT_AGENT_PORT: u16 = 9223;
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;

/// Returns the logbench directory (`$LOGBENCH_HOME` or `~/.logbench/`).
///
/// Creates the directory if it doesn't exist.
pub fn logbench_dir() -> PathBuf {
    let dir = match std::env::var_os(HOME_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".logbench"),
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Persistent harness configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Host of the browser automation agent.
    pub agent_host: String,
    /// TCP port of the browser automation agent.
    pub agent_port: u16,
    /// Default bound for visibility waits, in milliseconds.
    pub wait_timeout_ms: u64,
    /// Append run reports under `runs/`.
    pub record_runs: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            agent_host: DEFAULT_AGENT_HOST.to_string(),
            agent_port: DEFAULT_AGENT_PORT,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            record_runs: true,
        }
    }
}

impl HarnessConfig {
    /// Path of the config file in the logbench directory.
    pub fn path() -> PathBuf {
        logbench_dir().join(CONFIG_FILENAME)
    }

    /// Load config from the logbench directory.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Like [`load`](Self::load) for an explicit file.
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to the logbench directory.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Agent backend at the configured address.
    pub fn agent(&self) -> DriverConfig {
        DriverConfig::Agent {
            host: self.agent_host.clone(),
            port: self.agent_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.agent_host, "127.0.0.1");
        assert_eq!(config.agent_port, 9223);
        assert_eq!(config.wait_timeout(), Duration::from_millis(5000));
        assert!(config.record_runs);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let loaded: HarnessConfig = serde_json::from_str(r#"{"agent_port": 9300}"#).unwrap();
        assert_eq!(loaded.agent_port, 9300);
        assert_eq!(loaded.agent_host, DEFAULT_AGENT_HOST);
        assert!(loaded.record_runs);
    }

    #[test]
    fn save_then_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = HarnessConfig {
            wait_timeout_ms: 1500,
            record_runs: false,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(HarnessConfig::load_from(&path), config);
    }

    #[test]
    fn unparsable_or_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        assert_eq!(HarnessConfig::load_from(&path), HarnessConfig::default());
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(HarnessConfig::load_from(&path), HarnessConfig::default());
    }

    #[test]
    fn agent_driver_config() {
        assert_eq!(
            HarnessConfig::default().agent(),
            DriverConfig::Agent {
                host: "127.0.0.1".into(),
                port: 9223
            }
        );
    }
}
