//! Gallery catalog models

use serde::{Deserialize, Serialize};

/// Resolution string the gallery uses for images already sized for the Paper Pro
pub const PAPER_PRO_NATIVE_RESOLUTION: &str = "2160x1620";

/// One downloadable sleep screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub license: String,

    /// Target device class (`paperpro`, `rm2`)
    #[serde(default = "default_device")]
    pub device: String,

    /// `WIDTHxHEIGHT`
    #[serde(default = "default_resolution")]
    pub resolution: String,

    #[serde(default, alias = "previewUrl")]
    pub preview_url: String,

    #[serde(default, alias = "downloadUrl")]
    pub download_url: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_device() -> String {
    "paperpro".to_string()
}

fn default_resolution() -> String {
    PAPER_PRO_NATIVE_RESOLUTION.to_string()
}

impl GalleryItem {
    /// Paper Pro items not published at the native resolution get resized
    /// before upload.
    pub fn needs_resize(&self) -> bool {
        self.device.eq_ignore_ascii_case("paperpro")
            && !self
                .resolution
                .eq_ignore_ascii_case(PAPER_PRO_NATIVE_RESOLUTION)
    }
}

/// The gallery index document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryCatalog {
    #[serde(default)]
    pub updated: Option<String>,

    #[serde(default)]
    pub items: Vec<GalleryItem>,
}

impl GalleryCatalog {
    /// Look an item up by id
    pub fn find(&self, id: &str) -> Option<&GalleryItem> {
        self.items.iter().find(|item| item.id == id)
    }
}
