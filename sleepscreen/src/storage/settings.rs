//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ManagerError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Last used connection parameters (the password is never persisted)
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Resize images to the device resolution before upload
    #[serde(default = "default_true")]
    pub auto_resize: bool,

    /// Online gallery configuration
    #[serde(default)]
    pub gallery: GallerySettings,

    /// Also write logs to a daily rolling file under the storage directory
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            connection: ConnectionSettings::default(),
            auto_resize: true,
            gallery: GallerySettings::default(),
            log_to_file: false,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent or unreadable
    pub async fn load_or_default(file: &File) -> Settings {
        if !file.exists().await {
            debug!("No settings file at {}, using defaults", file.path().display());
            return Settings::default();
        }

        match file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings from {}: {}", file.path().display(), e);
                Settings::default()
            }
        }
    }

    /// Write the settings back as pretty JSON
    pub async fn save(&self, file: &File) -> Result<(), ManagerError> {
        file.write_json(self).await?;
        debug!("Settings saved to {}", file.path().display());
        Ok(())
    }

    /// Record the host and user of a successful connection.
    /// Returns whether anything changed.
    pub fn remember_connection(&mut self, host: &str, username: &str) -> bool {
        if self.connection.host == host && self.connection.username == username {
            return false;
        }
        self.connection.host = host.to_string();
        self.connection.username = username.to_string();
        true
    }
}

/// Device connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Device address on the LAN (USB networking default)
    #[serde(default = "default_host")]
    pub host: String,

    /// SSH user
    #[serde(default = "default_username")]
    pub username: String,

    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Connect and authenticate timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "10.11.99.1".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

impl ConnectionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: default_username(),
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Gallery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GallerySettings {
    /// URL of the catalog index
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_index_url() -> String {
    "https://roropastis.github.io/ReMarkable-Sleep-Screen-Manager/gallery/index.json".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}
