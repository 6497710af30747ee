//! Best-effort persistence of freshly fetched images.
//!
//! Nothing here can fail a request: every error is logged and the fetched
//! asset is handed back untouched.

use tracing::{debug, warn};

use crate::codec::Codec;
use crate::fs::Filesystem;
use crate::key::CacheKey;
use crate::types::Asset;

/// Whether `codec` should transcode `asset` for storage under `image_extension`.
pub(crate) fn should_transcode(codec: &dyn Codec, image_extension: &str, asset: &Asset) -> bool {
    !image_extension.is_empty()
        && codec.extension().eq_ignore_ascii_case(image_extension)
        && codec.is_eligible_for_compression(asset)
}

/// Create the key's directory, transcode if eligible, and write.
///
/// Returns the asset the caller should receive and whether it was stored.
pub(crate) async fn persist_impl(
    fs: &dyn Filesystem,
    codec: &dyn Codec,
    image_extension: &str,
    key: &CacheKey,
    identifier: &str,
    asset: Asset,
) -> (Asset, bool) {
    if let Some(dir) = key.parent() {
        let created = match fs.exists(&dir).await {
            Ok(true) => Ok(()),
            Ok(false) => fs.make_directory(&dir).await,
            Err(e) => Err(e),
        };
        if let Err(e) = created {
            warn!(
                identifier,
                path = %dir.display(),
                kind = e.kind(),
                error = %e,
                "couldn't create cache directory, not caching"
            );
            return (asset, false);
        }
    }

    let asset = if should_transcode(codec, image_extension, &asset) {
        match codec.compress(&asset) {
            Ok(compressed) => {
                debug!(
                    identifier,
                    from = %asset.format,
                    to = %compressed.format,
                    "transcoded image for cache"
                );
                compressed
            }
            Err(e) => {
                warn!(
                    identifier,
                    kind = e.kind(),
                    error = %e,
                    "transcoding failed, not caching"
                );
                return (asset, false);
            }
        }
    } else {
        asset
    };

    debug!(identifier, path = %key, "writing to cache");
    match fs.write(key.as_path(), &asset).await {
        Ok(()) => (asset, true),
        Err(e) => {
            warn!(
                identifier,
                path = %key,
                kind = e.kind(),
                error = %e,
                "failed to write cache artifact"
            );
            (asset, false)
        }
    }
}
