//! Configuration system for courier.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $COURIER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/courier/config.toml
//!   3. ~/.config/courier/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::wire::{DEFAULT_END_OF_DATA_MARK, DEFAULT_MAX_FRAGMENT_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub transfer: TransferConfig,
    pub network: NetworkConfig,
    pub worker: WorkerConfig,
}

/// Fragmenting parameters. Both ends of a link must agree on these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Largest single transport write, in bytes.
    pub max_fragment_size: usize,
    /// Payload terminator, hex-encoded in the config file.
    #[serde(with = "hex_serde")]
    pub end_of_data_mark: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local UDP address the daemon sends from.
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Capacity of the send worker's command channel.
    pub command_buffer: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            end_of_data_mark: DEFAULT_END_OF_DATA_MARK.to_vec(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "[::]:0".to_string(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { command_buffer: 256 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("courier")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

// ── Validation ────────────────────────────────────────────────────────────────

impl TransferConfig {
    /// Reject settings the transfer queue cannot make progress with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fragment_size == 0 {
            return Err(ConfigError::Invalid("max_fragment_size must be non-zero"));
        }
        if self.end_of_data_mark.is_empty() {
            return Err(ConfigError::Invalid("end_of_data_mark must not be empty"));
        }
        if self.end_of_data_mark.len() > self.max_fragment_size {
            return Err(ConfigError::Invalid(
                "end_of_data_mark must fit in a single fragment",
            ));
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CourierConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.transfer.validate()?;
        Ok(config)
    }

    /// Read a config file, falling back to defaults if it does not exist.
    /// No env overrides, no validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("COURIER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text =
            toml::to_string_pretty(&Self::default()).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply COURIER_* overrides from `var`. Unparseable values are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("COURIER_TRANSFER__MAX_FRAGMENT_SIZE") {
            if let Ok(n) = v.parse() {
                self.transfer.max_fragment_size = n;
            }
        }
        if let Some(v) = var("COURIER_TRANSFER__END_OF_DATA_MARK") {
            if let Ok(mark) = hex::decode(&v) {
                self.transfer.end_of_data_mark = mark;
            }
        }
        if let Some(v) = var("COURIER_NETWORK__BIND") {
            self.network.bind = v;
        }
        if let Some(v) = var("COURIER_WORKER__COMMAND_BUFFER") {
            if let Ok(n) = v.parse() {
                self.worker.command_buffer = n;
            }
        }
    }
}

mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
