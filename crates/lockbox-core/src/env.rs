//! Environment variable handling.

use std::env;
use std::path::PathBuf;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Get an environment variable as a path, expanding a leading `~/`.
pub fn get_path(name: &str) -> Option<PathBuf> {
    get_var(name).map(|v| crate::paths::expand_tilde(&v))
}

/// Common environment variable names.
pub mod vars {
    /// Lockbox home directory override.
    pub const LOCKBOX_HOME: &str = "LOCKBOX_HOME";

    /// Lockbox config file override.
    pub const LOCKBOX_CONFIG: &str = "LOCKBOX_CONFIG";

    /// Store file override.
    pub const LOCKBOX_STORE: &str = "LOCKBOX_STORE";

    /// Hex-encoded session key.
    pub const LOCKBOX_KEY: &str = "LOCKBOX_KEY";

    /// Log filter directive.
    pub const LOCKBOX_LOG: &str = "LOCKBOX_LOG";
}
