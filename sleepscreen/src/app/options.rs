//! Application configuration options

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::ManagerError;
use crate::remote::session::ConnectionSpec;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Environment variable consulted when `--password` is not given
pub const PASSWORD_ENV: &str = "RMSLEEP_PASSWORD";

/// Split `--key=value` and `--flag` arguments into a map.
/// Standalone flags map to `"true"`; anything else is ignored.
pub fn parse_args<I>(args: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = String>,
{
    let mut cli_args = HashMap::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once('=') {
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    cli_args
}

/// What the invocation asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TestConnection,
    Apply { image: PathBuf, resize: bool },
    Restore,
    UploadScreens { folder: PathBuf },
    InstallRotation,
    UninstallRotation,
    TestRotation,
    RotationStatus,
    Gallery,
    GalleryInstall { id: String },
    GalleryDownload { id: String },
}

impl Command {
    /// Pick the command from parsed arguments; the first match wins
    pub fn from_args(
        cli_args: &HashMap<String, String>,
        auto_resize: bool,
    ) -> Result<Command, ManagerError> {
        if let Some(image) = cli_args.get("apply") {
            let resize = auto_resize && !cli_args.contains_key("no-resize");
            return Ok(Command::Apply {
                image: PathBuf::from(image),
                resize,
            });
        }
        if let Some(folder) = cli_args.get("upload-screens") {
            return Ok(Command::UploadScreens {
                folder: PathBuf::from(folder),
            });
        }
        if let Some(id) = cli_args.get("gallery-install") {
            return Ok(Command::GalleryInstall { id: id.clone() });
        }
        if let Some(id) = cli_args.get("gallery-download") {
            return Ok(Command::GalleryDownload { id: id.clone() });
        }

        let flags = [
            ("test-connection", Command::TestConnection),
            ("restore", Command::Restore),
            ("install-rotation", Command::InstallRotation),
            ("uninstall-rotation", Command::UninstallRotation),
            ("test-rotation", Command::TestRotation),
            ("rotation-status", Command::RotationStatus),
            ("gallery", Command::Gallery),
        ];
        flags
            .into_iter()
            .find(|(flag, _)| cli_args.contains_key(*flag))
            .map(|(_, command)| command)
            .ok_or_else(|| ManagerError::ConfigError("no command given, see --help".into()))
    }

    /// Whether the command talks to the device
    pub fn needs_device(&self) -> bool {
        !matches!(
            self,
            Command::Gallery | Command::GalleryDownload { .. }
        )
    }
}

/// Device connection options
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub password: SecretString,
    pub connect_timeout: Duration,
}

impl ConnectionOptions {
    /// The connection spec handed to every workflow of this invocation
    pub fn spec(&self) -> ConnectionSpec {
        ConnectionSpec::new(
            self.host.as_str(),
            self.username.as_str(),
            self.password.expose_secret(),
        )
        .with_port(self.port)
        .with_connect_timeout(self.connect_timeout)
    }
}

/// Gallery options
#[derive(Debug, Clone)]
pub struct GalleryOptions {
    pub index_url: String,
    pub request_timeout: Duration,
}

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub command: Command,

    pub connection: ConnectionOptions,

    pub gallery: GalleryOptions,

    /// Storage layout paths
    pub layout: StorageLayout,
}

impl AppOptions {
    /// Combine the settings file with command-line overrides.
    /// `env_password` is the value of [`PASSWORD_ENV`], if set.
    pub fn resolve(
        cli_args: &HashMap<String, String>,
        settings: &Settings,
        env_password: Option<String>,
        layout: StorageLayout,
    ) -> Result<AppOptions, ManagerError> {
        let command = Command::from_args(cli_args, settings.auto_resize)?;

        let port = match cli_args.get("port") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ManagerError::ConfigError(format!("invalid port: {}", raw)))?,
            None => settings.connection.port,
        };
        let password = cli_args
            .get("password")
            .cloned()
            .or(env_password)
            .unwrap_or_default();

        Ok(AppOptions {
            command,
            connection: ConnectionOptions {
                host: cli_args
                    .get("host")
                    .cloned()
                    .unwrap_or_else(|| settings.connection.host.clone()),
                username: cli_args
                    .get("user")
                    .cloned()
                    .unwrap_or_else(|| settings.connection.username.clone()),
                port,
                password: SecretString::from(password),
                connect_timeout: settings.connection.connect_timeout(),
            },
            gallery: GalleryOptions {
                index_url: settings.gallery.index_url.clone(),
                request_timeout: Duration::from_secs(settings.gallery.request_timeout_secs),
            },
            layout,
        })
    }
}
