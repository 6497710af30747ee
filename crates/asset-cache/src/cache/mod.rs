//! Read-through file cache.
//!
//! Image requests resolve in this order:
//! 1. Cached artifact at the image key (read failures are hard errors)
//! 2. Offline gate (network identifiers are refused)
//! 3. Origin fetch, then best-effort transcode and persist
//!
//! Height fields and nodes are passed straight through to the loader.
//!
//! # Cache Structure
//!
//! ```text
//! {cache_dir}/{authority}/{sanitized remote path}.{image_extension}
//! ```

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::{Codec, NoopCodec};
use crate::error::{CacheError, CacheResult};
use crate::fs::{Filesystem, LocalFs};
use crate::identifier::is_network_location;
use crate::key::{CacheKey, CacheKeyDeriver};
use crate::loader::{AssetLoader, HttpLoader};
use crate::types::{Asset, AssetKind, AssetSource, CacheConfig, LoadOptions, ResolvedAsset};

mod flight;
mod store;

use flight::InFlight;

/// Read-through disk cache in front of an asset loader.
pub struct FileCache {
    deriver: CacheKeyDeriver,
    image_extension: String,
    offline: AtomicBool,
    in_flight: Option<InFlight>,
    loader: Arc<dyn AssetLoader>,
    codec: Arc<dyn Codec>,
    fs: Arc<dyn Filesystem>,
}

impl FileCache {
    /// Cache in front of `loader`, storing on local disk without transcoding.
    pub fn new(config: CacheConfig, loader: Arc<dyn AssetLoader>) -> Self {
        Self::with_components(config, loader, Arc::new(NoopCodec), Arc::new(LocalFs))
    }

    /// Cache with the default HTTP loader.
    pub fn with_config(config: CacheConfig) -> CacheResult<Self> {
        let loader = HttpLoader::new(&config)?;
        Ok(Self::new(config, Arc::new(loader)))
    }

    /// Cache configured from `ASSET_CACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::with_config(CacheConfig::from_env())
    }

    /// Cache with explicit collaborators.
    pub fn with_components(
        config: CacheConfig,
        loader: Arc<dyn AssetLoader>,
        codec: Arc<dyn Codec>,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        Self {
            deriver: CacheKeyDeriver::new(&config.cache_dir),
            image_extension: config.image_extension,
            offline: AtomicBool::new(config.offline),
            in_flight: config.single_flight.then(InFlight::new),
            loader,
            codec,
            fs,
        }
    }

    /// Cache root directory.
    pub fn cache_dir(&self) -> &Path {
        Path::new(self.deriver.root())
    }

    /// Extension images are stored under.
    pub fn image_extension(&self) -> &str {
        &self.image_extension
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// Toggle offline mode; takes effect for requests that have not yet
    /// passed the offline gate.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Cache key for an identifier, before any extension rewrite.
    pub fn cache_key(&self, identifier: &str) -> CacheKey {
        self.deriver.derive_cache_key(identifier)
    }

    /// Location an image for `identifier` is stored at.
    pub fn image_key(&self, identifier: &str) -> CacheKey {
        self.deriver
            .derive_representation_key(identifier, &self.image_extension)
    }

    /// Load an image, serving it from the cache when possible.
    pub async fn request_image(
        &self,
        identifier: &str,
        options: &LoadOptions,
    ) -> CacheResult<ResolvedAsset> {
        let options = options.for_kind(AssetKind::Image);
        let key = self.image_key(identifier);

        let _flight = match &self.in_flight {
            Some(table) if !key.is_empty() => Some(table.acquire(key.as_str()).await),
            _ => None,
        };

        if !key.is_empty() && self.fs.exists(key.as_path()).await? {
            debug!(identifier, path = %key, "reading from cache");
            let asset = self
                .loader
                .read_local(key.as_path(), &options)
                .await
                .map_err(|e| into_read_error(&key, e))?;

            return Ok(ResolvedAsset {
                asset,
                source: AssetSource::Cache(key.as_path().to_path_buf()),
                stored: false,
            });
        }

        if self.is_offline() && is_network_location(identifier) {
            info!(identifier, "offline mode, skipping network fetch");
            return Err(CacheError::OfflineRefusal {
                identifier: identifier.to_string(),
            });
        }

        let asset = self
            .loader
            .fetch(identifier, &options)
            .await
            .map_err(|e| into_fetch_error(identifier, e))?;

        let (asset, stored) = if key.is_empty() {
            (asset, false)
        } else {
            store::persist_impl(
                self.fs.as_ref(),
                self.codec.as_ref(),
                &self.image_extension,
                &key,
                identifier,
                asset,
            )
            .await
        };

        info!(identifier, stored, digest = %asset.digest(), "loaded image from origin");
        Ok(ResolvedAsset {
            asset,
            source: AssetSource::Origin(identifier.to_string()),
            stored,
        })
    }

    /// Load a height field from origin. Height fields are not cached.
    pub async fn request_height_field(
        &self,
        identifier: &str,
        options: &LoadOptions,
    ) -> CacheResult<Asset> {
        self.pass_through(identifier, AssetKind::HeightField, options)
            .await
    }

    /// Load a scene graph node from origin. Nodes are not cached.
    pub async fn request_node(&self, identifier: &str, options: &LoadOptions) -> CacheResult<Asset> {
        self.pass_through(identifier, AssetKind::Node, options).await
    }

    async fn pass_through(
        &self,
        identifier: &str,
        kind: AssetKind,
        options: &LoadOptions,
    ) -> CacheResult<Asset> {
        debug!(identifier, %kind, "uncached asset kind, loading from origin");
        self.loader
            .fetch(identifier, &options.for_kind(kind))
            .await
            .map_err(|e| into_fetch_error(identifier, e))
    }
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("cache_dir", &self.deriver.root())
            .field("image_extension", &self.image_extension)
            .field("offline", &self.is_offline())
            .field("single_flight", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

fn into_read_error(key: &CacheKey, err: CacheError) -> CacheError {
    match err {
        CacheError::CacheRead { .. } => err,
        other => CacheError::CacheRead {
            path: key.as_path().to_path_buf(),
            message: other.to_string(),
        },
    }
}

fn into_fetch_error(identifier: &str, err: CacheError) -> CacheError {
    match err {
        CacheError::Fetch { .. } => err,
        other => CacheError::fetch(identifier, other),
    }
}
