//! Path resolution utilities.

use crate::env::{self, vars};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the Lockbox base directory (`~/.lockbox`, or `$LOCKBOX_HOME`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_path(vars::LOCKBOX_HOME) {
        return Ok(home);
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".lockbox"))
}

/// Get the main config file path (~/.lockbox/lockbox.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_path(vars::LOCKBOX_CONFIG) {
        return Ok(path);
    }
    Ok(base_dir()?.join("lockbox.json5"))
}

/// Get the default store file path (~/.lockbox/store.msgpack).
pub fn store_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("store.msgpack"))
}

/// Ensure the base directory exists with owner-only permissions.
pub fn ensure_dirs() -> Result<(), ConfigError> {
    let dir = base_dir()?;
    std::fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Sibling path used for atomic writes of `path`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/test");
        assert!(!expanded.to_string_lossy().contains('~'));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/store"), PathBuf::from("/tmp/store"));
        assert_eq!(expand_tilde("relative/~"), PathBuf::from("relative/~"));
    }

    #[test]
    fn test_temp_sibling() {
        let tmp = temp_sibling(Path::new("/var/lib/store.msgpack"));
        assert_eq!(tmp, PathBuf::from("/var/lib/store.msgpack.tmp"));
    }

    #[test]
    fn test_store_file_under_base_dir() {
        let base = base_dir().unwrap();
        let store = store_file().unwrap();
        assert!(store.starts_with(&base));
        assert!(store.ends_with("store.msgpack"));
    }
}
