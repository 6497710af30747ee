//! Filesystem primitives used by the cache.
//!
//! `LocalFs` writes through a temp file in the target directory and renames
//! it into place, so a reader never sees a partially written artifact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::Rng;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::types::Asset;

/// Filesystem capability.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Whether anything exists at `path`.
    ///
    /// `Ok(false)` means definitely absent. A path whose existence can't be
    /// determined (permissions, a file where a directory should be) is an error.
    async fn exists(&self, path: &Path) -> CacheResult<bool>;

    /// Create `path` and its missing parents. Already existing is success.
    async fn make_directory(&self, path: &Path) -> CacheResult<()>;

    /// Persist the asset payload at `path`.
    async fn write(&self, path: &Path, asset: &Asset) -> CacheResult<()>;
}

/// Local disk via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl Filesystem for LocalFs {
    async fn exists(&self, path: &Path) -> CacheResult<bool> {
        match fs::try_exists(path).await {
            Ok(found) => Ok(found),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "couldn't check cache path");
                Err(CacheError::CacheRead {
                    path: path.to_path_buf(),
                    message: format!("failed to check existence: {}", e),
                })
            }
        }
    }

    async fn make_directory(&self, path: &Path) -> CacheResult<()> {
        match fs::create_dir_all(path).await {
            Ok(()) => Ok(()),
            // Another request created it between our check and create_dir_all.
            Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(e) => Err(CacheError::write(path, format!("failed to create directory: {}", e))),
        }
    }

    async fn write(&self, path: &Path, asset: &Asset) -> CacheResult<()> {
        write_atomic(path, &asset.data).await
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let nonce: u64 = rand::thread_rng().gen();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{:016x}.tmp", file_name, nonce))
}

pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> CacheResult<()> {
    let temp_path = temp_path_for(path);

    if let Err(e) = fs::write(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(CacheError::write(path, format!("failed to write temp file: {}", e)));
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(CacheError::write(path, format!("failed to rename temp file: {}", e)));
    }

    debug!(path = %path.display(), bytes = content.len(), "wrote cache artifact");
    Ok(())
}
