//! Error types for the asset cache.

use std::path::PathBuf;

/// Asset cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Origin fetch or decode failed.
    #[error("fetch failed for {identifier}: {message}")]
    Fetch { identifier: String, message: String },

    /// An existing cached artifact could not be read.
    #[error("failed to read cached artifact {}: {message}", .path.display())]
    CacheRead { path: PathBuf, message: String },

    /// Directory creation or artifact write failed.
    #[error("failed to write cache entry {}: {message}", .path.display())]
    CacheWrite { path: PathBuf, message: String },

    /// Network fetch refused because offline mode is enabled.
    #[error("offline mode: refusing network fetch of {identifier}")]
    OfflineRefusal { identifier: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CacheError {
    /// Whether the request was refused by the offline policy rather than failing.
    pub fn is_offline_refusal(&self) -> bool {
        matches!(self, Self::OfflineRefusal { .. })
    }

    /// Short stable name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::CacheRead { .. } => "cache_read",
            Self::CacheWrite { .. } => "cache_write",
            Self::OfflineRefusal { .. } => "offline_refusal",
            Self::Config { .. } => "config",
        }
    }

    pub(crate) fn fetch(identifier: &str, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            identifier: identifier.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::CacheWrite {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
