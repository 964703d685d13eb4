//! Bundled default sleep screen

use std::path::PathBuf;

use async_trait::async_trait;
use rust_embed::RustEmbed;
use tracing::debug;

use crate::errors::ManagerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Name of the stock image inside the embedded assets
pub const DEFAULT_IMAGE: &str = "suspended.png";

#[derive(RustEmbed)]
#[folder = "assets"]
struct Assets;

/// Supplies a local file holding the device's stock sleep screen
#[async_trait]
pub trait DefaultArtifactProvider: Send + Sync {
    async fn default_image(&self) -> Result<PathBuf, ManagerError>;
}

/// Extracts the embedded stock image to a fixed scratch path. An existing
/// file is reused only while it matches the embedded bytes.
#[derive(Debug, Clone)]
pub struct EmbeddedDefaultImage {
    target: File,
}

impl EmbeddedDefaultImage {
    pub fn new(target: File) -> Self {
        Self { target }
    }

    async fn is_current(&self, data: &[u8]) -> bool {
        if !self.target.exists().await {
            return false;
        }
        match self.target.read_bytes().await {
            Ok(existing) => existing == data,
            Err(e) => {
                debug!("Could not read {}: {}", self.target.path().display(), e);
                false
            }
        }
    }
}

impl Default for EmbeddedDefaultImage {
    fn default() -> Self {
        Self::new(Dir::scratch().file("suspended_embedded.png"))
    }
}

#[async_trait]
impl DefaultArtifactProvider for EmbeddedDefaultImage {
    async fn default_image(&self) -> Result<PathBuf, ManagerError> {
        let asset = Assets::get(DEFAULT_IMAGE).ok_or_else(|| {
            ManagerError::ResourceError(format!(
                "embedded image {} is missing; the application may be corrupted",
                DEFAULT_IMAGE
            ))
        })?;

        if !self.is_current(&asset.data).await {
            self.target.replace_bytes(&asset.data).await.map_err(|e| {
                ManagerError::ResourceError(format!(
                    "embedded image could not be extracted to {}: {}",
                    self.target.path().display(),
                    e
                ))
            })?;
            debug!("Extracted default image to {}", self.target.path().display());
        }

        Ok(self.target.path().to_path_buf())
    }
}
