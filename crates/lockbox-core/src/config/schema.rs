//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main Lockbox configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store location and on-disk encoding.
    #[serde(default)]
    pub store: StoreConfig,

    /// Which collaborators a context takes ownership of.
    #[serde(default)]
    pub ownership: OwnershipConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file. Defaults to `~/.lockbox/store.msgpack`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How credential values are written.
    #[serde(default)]
    pub value_encoding: ValueEncoding,

    /// How wire records are matched to fields on read.
    #[serde(default)]
    pub decode_mode: DecodeMode,

    /// How a decoded batch is committed to the repository.
    #[serde(default)]
    pub commit_mode: CommitMode,
}

/// Encoding of the credential `value` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// Write the ciphertext with its exact length.
    #[default]
    Explicit,
    /// Legacy layout: zero-padded buffer, length recovered by scanning
    /// backward for the last non-zero byte.
    Padded,
}

/// Field matching applied when decoding a wire record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Look fields up by key, in any order.
    #[default]
    Keyed,
    /// Legacy decoder: exactly `name, iv, description, value`, in that order.
    Strict,
}

/// Commit policy for a decoded batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Decode every record first; insert only if the whole batch is valid.
    #[default]
    Atomic,
    /// Insert record by record; the first failure leaves earlier records in place.
    Partial,
}

/// Ownership section: which collaborators the context destroys at teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipConfig {
    #[serde(default = "default_true")]
    pub acquire_persister: bool,

    #[serde(default = "default_true")]
    pub acquire_repository: bool,

    #[serde(default)]
    pub acquire_cryptor: bool,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            acquire_persister: true,
            acquire_repository: true,
            acquire_cryptor: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn default_true() -> bool {
    true
}
