//! Remote filesystem helpers

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::ManagerError;
use crate::remote::session::TransferSession;

/// Where the bytes of an upload come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A file on the local machine
    LocalFile(PathBuf),

    /// Generated text, uploaded as UTF-8
    Text(String),
}

/// Something to place at one absolute path on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub source: ArtifactSource,
    pub destination: String,
}

impl RemoteArtifact {
    pub fn file(local: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source: ArtifactSource::LocalFile(local.into()),
            destination: destination.into(),
        }
    }

    pub fn text(content: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: ArtifactSource::Text(content.into()),
            destination: destination.into(),
        }
    }
}

/// Make sure `path` exists as a directory on the device.
///
/// Missing segments are created root to leaf. A failure partway leaves the
/// segments created so far in place.
pub async fn ensure_directory(
    transfer: &mut dyn TransferSession,
    path: &str,
) -> Result<(), ManagerError> {
    if transfer.exists(path).await? {
        return Ok(());
    }

    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        if !transfer.exists(&current).await? {
            debug!("Creating remote directory {}", current);
            transfer.create_dir(&current).await?;
        }
    }
    Ok(())
}

/// Stream a local file to `remote_path`, overwriting
pub async fn upload_file(
    transfer: &mut dyn TransferSession,
    local_path: &Path,
    remote_path: &str,
) -> Result<u64, ManagerError> {
    let mut file = tokio::fs::File::open(local_path).await.map_err(|e| {
        ManagerError::TransferError(format!("cannot read {}: {}", local_path.display(), e))
    })?;

    let written = transfer.write(remote_path, &mut file).await?;
    debug!(
        "Uploaded {} -> {} ({} bytes)",
        local_path.display(),
        remote_path,
        written
    );
    Ok(written)
}

/// Upload `content` as UTF-8 to `remote_path`, overwriting
pub async fn upload_text(
    transfer: &mut dyn TransferSession,
    content: &str,
    remote_path: &str,
) -> Result<u64, ManagerError> {
    let mut bytes = content.as_bytes();
    let written = transfer.write(remote_path, &mut bytes).await?;
    debug!("Uploaded text -> {} ({} bytes)", remote_path, written);
    Ok(written)
}

/// Upload an artifact to its destination
pub async fn stage(
    transfer: &mut dyn TransferSession,
    artifact: &RemoteArtifact,
) -> Result<u64, ManagerError> {
    match &artifact.source {
        ArtifactSource::LocalFile(path) => upload_file(transfer, path, &artifact.destination).await,
        ArtifactSource::Text(content) => upload_text(transfer, content, &artifact.destination).await,
    }
}
