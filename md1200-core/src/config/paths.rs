//! Default path resolution for the configuration file

use std::path::PathBuf;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "MD1200_CONFIG";

/// Returns the default path for the configuration file.
///
/// Uses XDG config directory if available:
/// - Linux/macOS: `~/.config/md1200/config.toml`
/// - Fallback: `/etc/md1200/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("md1200")
        .join("config.toml")
}
