//! Read-through disk cache for remotely loaded rendering assets.
//!
//! This crate sits in front of an asset loader and provides:
//!
//! - Deterministic, filesystem-safe cache keys derived from source identifiers
//! - Read-through image caching (check → fetch → transcode → persist → return)
//! - Offline mode that refuses network fetches and serves cache only
//! - Optional transcoding into a compressed storage format via a [`Codec`]
//! - Per-key deduplication of concurrent misses
//!
//! Caching is best-effort: failing to create a directory or write an artifact
//! never fails a request. Only an unreadable existing artifact, a failed
//! origin fetch, or an offline refusal reach the caller.
//!
//! # Quick Start
//!
//! ```no_run
//! use asset_cache::{CacheConfig, FileCache, LoadOptions};
//!
//! # async fn example() -> asset_cache::CacheResult<()> {
//! let cache = FileCache::with_config(CacheConfig::default().with_cache_dir("/var/cache/tiles"))?;
//!
//! let tile = cache
//!     .request_image("http://tiles.example.com/z3/x5/y2.png", &LoadOptions::new())
//!     .await?;
//! println!("{} bytes from {}", tile.asset.len(), tile.source);
//!
//! cache.set_offline(true);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `ASSET_CACHE_DIR` | Cache root (default: platform cache dir + `/asset-cache`) |
//! | `ASSET_CACHE_IMAGE_EXTENSION` | Stored image extension (default: `dds`) |
//! | `ASSET_CACHE_OFFLINE` | Start in offline mode |
//! | `ASSET_CACHE_SINGLE_FLIGHT` | Deduplicate concurrent misses (default: on) |
//! | `ASSET_CACHE_TIMEOUT` | Origin request timeout in seconds, positive (default: 30) |

pub mod cache;
pub mod codec;
mod digest;
pub mod error;
pub mod fs;
pub mod identifier;
pub mod key;
pub mod loader;
pub mod types;

// Re-export main types
pub use cache::FileCache;
pub use codec::{Codec, NoopCodec};
pub use error::{CacheError, CacheResult};
pub use fs::{Filesystem, LocalFs};
pub use identifier::{
    is_network_location, network_authority, network_path, SourceId, NETWORK_SCHEMES,
};
pub use key::{CacheKey, CacheKeyDeriver};
pub use loader::{format_from_signature, AssetLoader, HttpLoader, LOADER_USER_AGENT};
pub use types::{
    default_cache_dir, Asset, AssetKind, AssetSource, CacheConfig, LoadOptions, ResolvedAsset,
};
