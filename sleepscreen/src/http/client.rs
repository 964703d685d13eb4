//! HTTP client implementation

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::errors::ManagerError;

/// HTTP client for the public gallery site
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self, ManagerError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rmsleep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ManagerError> {
        let response = self.get(url).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Make a GET request and return the raw body
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ManagerError> {
        let response = self.get(url).await?;
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    async fn get(&self, url: &str) -> Result<Response, ManagerError> {
        let url = parse_url(url)?;
        debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET {} failed: {} - {}", url, status, body);
            return Err(ManagerError::GalleryError(format!("{}: {}", status, url)));
        }

        Ok(response)
    }
}

/// Only absolute http(s) URLs are fetched
pub fn parse_url(raw: &str) -> Result<Url, ManagerError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ManagerError::GalleryError(format!("invalid URL {:?}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ManagerError::GalleryError(format!(
            "unsupported URL scheme {:?} in {}",
            other, raw
        ))),
    }
}
