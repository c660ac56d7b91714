//! Config path resolution
//!
//! Follows the XDG Base Directory Specification with an env var override.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SUGGESTBOX_CONFIG` | Config file | `~/.config/suggestbox/config.toml` |

use std::path::PathBuf;

/// Get the XDG config directory for suggestbox
///
/// Priority: `XDG_CONFIG_HOME` > `~/.config`
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("suggestbox");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config/suggestbox");
    }

    // Last resort: current directory
    PathBuf::from(".")
}

/// Get the config file path
///
/// Priority: `SUGGESTBOX_CONFIG` env var > `config_dir()/config.toml`
pub fn config_path() -> PathBuf {
    std::env::var("SUGGESTBOX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.toml"))
}
