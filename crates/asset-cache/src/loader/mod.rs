//! Asset loading from origin.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tokio::fs;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::identifier::{is_network_location, local_path};
use crate::types::{Asset, CacheConfig, LoadOptions};

mod helpers;
mod http;

pub use helpers::format_from_signature;

use helpers::format_from_path;
use http::HttpBackend;

/// User agent sent with origin requests.
pub const LOADER_USER_AGENT: &str = concat!("asset-cache/", env!("CARGO_PKG_VERSION"));

/// Fetches and decodes assets from their origin.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Load an asset from wherever `identifier` points.
    async fn fetch(&self, identifier: &str, options: &LoadOptions) -> CacheResult<Asset>;

    /// Load an asset from a local file.
    async fn read_local(&self, path: &Path, options: &LoadOptions) -> CacheResult<Asset>;
}

/// Default loader: HTTP(S) for network identifiers, `tokio::fs` for paths.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    http: HttpBackend,
}

impl HttpLoader {
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        Self::with_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Build a loader whose origin requests give up after `timeout`.
    ///
    /// A zero timeout would fail every request, so it is rejected.
    pub fn with_timeout(timeout: Duration) -> CacheResult<Self> {
        if timeout.is_zero() {
            return Err(CacheError::Config {
                message: "origin timeout must be greater than zero".to_string(),
            });
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(LOADER_USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| CacheError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend { client },
        })
    }

    async fn read_file(&self, path: &Path, options: &LoadOptions) -> std::io::Result<Asset> {
        let data = fs::read(path).await?;
        let format = format_from_signature(&data)
            .map(String::from)
            .unwrap_or_else(|| format_from_path(path));
        Ok(Asset::new(options.kind, format, data))
    }
}

#[async_trait]
impl AssetLoader for HttpLoader {
    async fn fetch(&self, identifier: &str, options: &LoadOptions) -> CacheResult<Asset> {
        if is_network_location(identifier) {
            debug!(identifier, kind = %options.kind, "fetching from network");
            return self.http.get(identifier, options).await;
        }

        let path = Path::new(local_path(identifier));
        debug!(path = %path.display(), kind = %options.kind, "reading local asset");
        self.read_file(path, options)
            .await
            .map_err(|e| CacheError::fetch(identifier, format!("failed to read file: {}", e)))
    }

    async fn read_local(&self, path: &Path, options: &LoadOptions) -> CacheResult<Asset> {
        self.read_file(path, options)
            .await
            .map_err(|e| CacheError::CacheRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}
