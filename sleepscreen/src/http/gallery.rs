//! Gallery catalog client

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::errors::ManagerError;
use crate::filesys::dir::Dir;
use crate::http::client::HttpClient;
use crate::models::gallery::{GalleryCatalog, GalleryItem};
use crate::utils::unique_file_name;

/// Source of downloadable sleep screens
#[async_trait]
pub trait GalleryClient: Send + Sync {
    /// Fetch the catalog index
    async fn fetch_catalog(&self) -> Result<GalleryCatalog, ManagerError>;

    /// Download the item's image to a fresh local file
    async fn download(&self, item: &GalleryItem) -> Result<PathBuf, ManagerError>;
}

/// Gallery served as static files over HTTP
pub struct HttpGalleryClient {
    http: HttpClient,
    index_url: String,
    download_dir: Dir,
}

impl HttpGalleryClient {
    pub fn new(http: HttpClient, index_url: impl Into<String>, download_dir: Dir) -> Self {
        Self {
            http,
            index_url: index_url.into(),
            download_dir,
        }
    }
}

#[async_trait]
impl GalleryClient for HttpGalleryClient {
    async fn fetch_catalog(&self) -> Result<GalleryCatalog, ManagerError> {
        let catalog: GalleryCatalog = self
            .http
            .get_json(&self.index_url)
            .await
            .map_err(|e| ManagerError::GalleryError(format!("Failed to load gallery: {}", e)))?;

        info!("Gallery loaded: {} items", catalog.items.len());
        Ok(catalog)
    }

    async fn download(&self, item: &GalleryItem) -> Result<PathBuf, ManagerError> {
        if item.download_url.trim().is_empty() {
            return Err(ManagerError::ValidationError(format!(
                "gallery item {} has no download URL",
                item.id
            )));
        }

        let bytes = self.http.get_bytes(&item.download_url).await?;
        let file = self
            .download_dir
            .file(&unique_file_name("rm_downloaded", "png"));
        file.write_bytes(&bytes).await?;

        info!("Downloaded {} ({} bytes) to {}", item.id, bytes.len(), file.path().display());
        Ok(file.path().to_path_buf())
    }
}
