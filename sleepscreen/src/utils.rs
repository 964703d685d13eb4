//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a random UUID v4 without hyphens
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A file name that is unique per call, e.g. `rm_suspended_<id>.png`
pub fn unique_file_name(prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, generate_id(), extension)
}

/// Local wall-clock stamp used in report notes
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
