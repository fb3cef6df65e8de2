//! Path utilities

use std::path::PathBuf;

/// WebPilot data directory (~/.webpilot)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".webpilot")
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Default browser profile location
pub fn profile_dir() -> PathBuf {
    data_dir().join("profile")
}
