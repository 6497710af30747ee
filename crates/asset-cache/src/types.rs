//! Asset, request and configuration types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::sha256_hex_bytes;

/// Kind of asset being requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Raster image. The only kind that is cached.
    #[default]
    Image,

    /// Terrain elevation grid (pass-through, uncached).
    HeightField,

    /// Scene graph node (pass-through, uncached).
    Node,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::HeightField => write!(f, "height_field"),
            Self::Node => write!(f, "node"),
        }
    }
}

/// A loaded asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// What kind of asset this is.
    pub kind: AssetKind,

    /// Lowercase format tag (e.g. "png", "dds").
    pub format: String,

    /// Payload bytes.
    pub data: Vec<u8>,
}

impl Asset {
    pub fn new(kind: AssetKind, format: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            format: format.into().to_ascii_lowercase(),
            data: data.into(),
        }
    }

    /// Content digest (sha256:...).
    pub fn digest(&self) -> String {
        sha256_hex_bytes(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Options passed through to the asset loader untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Kind of asset the loader should produce.
    pub kind: AssetKind,

    /// Extra request headers for network fetches.
    pub headers: BTreeMap<String, String>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Copy of these options with the asset kind overridden.
    pub fn for_kind(&self, kind: AssetKind) -> Self {
        Self {
            kind,
            headers: self.headers.clone(),
        }
    }
}

/// Where a resolved asset came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Read from a cached artifact.
    Cache(PathBuf),

    /// Fetched from its origin.
    Origin(String),
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache(path) => write!(f, "cache:{}", path.display()),
            Self::Origin(identifier) => write!(f, "origin:{}", identifier),
        }
    }
}

/// Result of a cached image request.
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    /// The asset handed back to the caller.
    pub asset: Asset,

    /// Where it was resolved from.
    pub source: AssetSource,

    /// Whether an origin fetch was persisted to the cache.
    pub stored: bool,
}

impl ResolvedAsset {
    pub fn is_cache_hit(&self) -> bool {
        matches!(self.source, AssetSource::Cache(_))
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for cached artifacts.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Extension images are stored under.
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Refuse network fetches, serve cache only.
    #[serde(default)]
    pub offline: bool,

    /// Serialize concurrent requests for the same cache key.
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,

    /// Origin request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Default cache root: `{platform cache dir}/asset-cache`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("asset-cache")
}

fn default_image_extension() -> String {
    "dds".to_string()
}

fn default_single_flight() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            image_extension: default_image_extension(),
            offline: false,
            single_flight: default_single_flight(),
            timeout_secs: default_timeout(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `ASSET_CACHE_DIR` | Cache root directory |
    /// | `ASSET_CACHE_IMAGE_EXTENSION` | Stored image extension (empty disables rewriting) |
    /// | `ASSET_CACHE_OFFLINE` | Start in offline mode (`1`/`true`) |
    /// | `ASSET_CACHE_SINGLE_FLIGHT` | Deduplicate concurrent misses (`0`/`false` disables) |
    /// | `ASSET_CACHE_TIMEOUT` | Origin request timeout in seconds (must be positive) |
    pub fn from_env() -> Self {
        Self {
            cache_dir: std::env::var_os("ASSET_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_dir),
            image_extension: std::env::var("ASSET_CACHE_IMAGE_EXTENSION")
                .unwrap_or_else(|_| default_image_extension()),
            offline: std::env::var("ASSET_CACHE_OFFLINE")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(false),
            single_flight: std::env::var("ASSET_CACHE_SINGLE_FLIGHT")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or_else(default_single_flight),
            timeout_secs: std::env::var("ASSET_CACHE_TIMEOUT")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or_else(default_timeout),
        }
    }

    /// Set the cache root.
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the stored image extension.
    pub fn with_image_extension(mut self, extension: impl Into<String>) -> Self {
        self.image_extension = extension.into();
        self
    }

    /// Start in offline mode.
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Enable or disable per-key request deduplication.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}
