use crate::orchestrator::OrchestratorConfig;
use keylock_gpio::keypad::KeypadConfig;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime configuration, stored as JSON.
///
/// Every field falls back to its default when missing from the file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The passcodes that unlock the door.
    pub passcodes: Vec<String>,
    /// Number of keys in a code.
    pub code_length: usize,
    pub inter_key_timeout_ms: u64,
    pub unlock_hold_secs: u64,
    pub poll_interval_ms: u64,
    pub reject_cue_ms: u64,
    pub accept_cue_ms: u64,
    pub key_flash_ms: u64,
    pub self_test_ms: u64,
    /// How long the door stays released after an unlock before the hold is acknowledged.
    pub consumer_hold_secs: u64,
}

impl Config {
    /// Gets the config file path from `CONFIG_FILE`, defaulting to `config.json`.
    pub fn path() -> PathBuf {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("config.json"));
        PathBuf::from(config_str)
    }

    /// Loads the config from `path`. Returns `Ok(None)` if the file doesn't exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn keypad(&self) -> KeypadConfig {
        KeypadConfig {
            code_length: self.code_length,
            inter_key_timeout: Duration::from_millis(self.inter_key_timeout_ms),
            reject_cue: Duration::from_millis(self.reject_cue_ms),
            key_flash: Duration::from_millis(self.key_flash_ms),
            self_test: Duration::from_millis(self.self_test_ms),
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            unlock_hold: Duration::from_secs(self.unlock_hold_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            accept_cue: Duration::from_millis(self.accept_cue_ms),
        }
    }

    pub fn consumer_hold(&self) -> Duration {
        Duration::from_secs(self.consumer_hold_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            passcodes: vec!["1234".to_string()],
            code_length: 4,
            inter_key_timeout_ms: 6000,
            unlock_hold_secs: 90,
            poll_interval_ms: 500,
            reject_cue_ms: 1500,
            accept_cue_ms: 2000,
            key_flash_ms: 250,
            self_test_ms: 4000,
            consumer_hold_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_driver_defaults() {
        let config = Config::default();
        assert_eq!(config.keypad(), KeypadConfig::default());
        assert_eq!(config.orchestrator(), OrchestratorConfig::default());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{ "passcodes": ["0000"], "code_length": 6 }"#).unwrap();
        assert_eq!(config.passcodes, vec!["0000"]);
        assert_eq!(config.code_length, 6);
        assert_eq!(config.unlock_hold_secs, 90);
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir().join(format!("keylock-config-{}.json", std::process::id()));
        let config = Config {
            passcodes: vec!["9876".to_string()],
            unlock_hold_secs: 30,
            ..Config::default()
        };

        config.save(&path).unwrap();
        let loaded = Config::try_load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, Some(config));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let path = Path::new("/nonexistent/keylock/config.json");
        assert!(Config::try_load(path).unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("keylock-bad-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let result = Config::try_load(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
