//! Optional transcoding applied to images before they are persisted.

use crate::error::CacheResult;
use crate::types::Asset;

/// Transcoder into a compressed storage representation.
pub trait Codec: Send + Sync {
    /// Extension of the representation this codec produces (e.g. "dds").
    ///
    /// The cache only transcodes when this matches its configured image
    /// extension.
    fn extension(&self) -> &str;

    /// Whether `asset` can be transcoded.
    fn is_eligible_for_compression(&self, asset: &Asset) -> bool;

    /// Produce the transcoded equivalent of `asset`.
    fn compress(&self, asset: &Asset) -> CacheResult<Asset>;
}

/// Codec that never transcodes; assets are stored as fetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCodec;

impl Codec for NoopCodec {
    fn extension(&self) -> &str {
        ""
    }

    fn is_eligible_for_compression(&self, _asset: &Asset) -> bool {
        false
    }

    fn compress(&self, asset: &Asset) -> CacheResult<Asset> {
        Ok(asset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetKind;

    #[test]
    fn test_noop_codec_never_eligible() {
        let asset = Asset::new(AssetKind::Image, "png", b"png".to_vec());
        assert!(!NoopCodec.is_eligible_for_compression(&asset));
        assert_eq!(NoopCodec.compress(&asset).unwrap(), asset);
    }
}
