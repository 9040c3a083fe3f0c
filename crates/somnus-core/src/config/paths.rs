//! Standard locations for Somnus files

use std::path::PathBuf;

/// Per-user configuration directory: `<config dir>/somnus`
///
/// Falls back to `./.somnus` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("somnus"))
        .unwrap_or_else(|| PathBuf::from(".somnus"))
}

/// A file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
