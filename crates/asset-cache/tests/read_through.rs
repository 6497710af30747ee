//! Integration tests for the read-through image protocol.
//!
//! Uses an in-memory origin loader with fetch counting so tests can assert
//! when the origin is (and is not) contacted. Cached artifacts live on real
//! disk under a temp dir.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use asset_cache::{
    format_from_signature, Asset, AssetKind, AssetLoader, AssetSource, CacheConfig, CacheError,
    CacheResult, Codec, FileCache, Filesystem, LoadOptions, LocalFs, NoopCodec,
};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::fs;

const CORRUPT: &[u8] = b"corrupt";
const PNG_TILE: &[u8] = b"\x89PNG\r\n\x1a\ntile bytes";
const JPEG_PHOTO: &[u8] = b"\xff\xd8\xff\xe0photo bytes";

#[derive(Default)]
struct MockOrigin {
    assets: HashMap<String, Asset>,
    fetches: AtomicUsize,
    delay: Option<Duration>,
    kinds: Mutex<Vec<AssetKind>>,
}

impl MockOrigin {
    fn with_image(mut self, identifier: &str, format: &str, data: &[u8]) -> Self {
        self.assets.insert(
            identifier.to_string(),
            Asset::new(AssetKind::Image, format, data.to_vec()),
        );
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn kinds(&self) -> Vec<AssetKind> {
        self.kinds.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetLoader for MockOrigin {
    async fn fetch(&self, identifier: &str, options: &LoadOptions) -> CacheResult<Asset> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.kinds.lock().unwrap().push(options.kind);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.assets
            .get(identifier)
            .map(|asset| Asset {
                kind: options.kind,
                ..asset.clone()
            })
            .ok_or_else(|| CacheError::Fetch {
                identifier: identifier.to_string(),
                message: "HTTP 404 Not Found".to_string(),
            })
    }

    async fn read_local(&self, path: &Path, options: &LoadOptions) -> CacheResult<Asset> {
        let data = fs::read(path).await.map_err(|e| CacheError::CacheRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if data == CORRUPT {
            return Err(CacheError::CacheRead {
                path: path.to_path_buf(),
                message: "not a valid image".to_string(),
            });
        }
        // Decode the way a real loader would: the bytes say what they are.
        let format = format_from_signature(&data)
            .map(String::from)
            .or_else(|| path.extension().map(|e| e.to_string_lossy().into_owned()))
            .unwrap_or_default();
        Ok(Asset::new(options.kind, format, data))
    }
}

/// Pretends to compress PNGs into DDS by prefixing the payload.
struct DdsCodec {
    fail: bool,
}

impl Codec for DdsCodec {
    fn extension(&self) -> &str {
        "dds"
    }

    fn is_eligible_for_compression(&self, asset: &Asset) -> bool {
        asset.format == "png"
    }

    fn compress(&self, asset: &Asset) -> CacheResult<Asset> {
        if self.fail {
            return Err(CacheError::Config {
                message: "encoder unavailable".to_string(),
            });
        }
        let mut data = b"DDS ".to_vec();
        data.extend_from_slice(&asset.data);
        Ok(Asset::new(asset.kind, "dds", data))
    }
}

/// Local disk whose writes always fail.
struct ReadOnlyFs;

#[async_trait]
impl Filesystem for ReadOnlyFs {
    async fn exists(&self, path: &Path) -> CacheResult<bool> {
        LocalFs.exists(path).await
    }

    async fn make_directory(&self, path: &Path) -> CacheResult<()> {
        LocalFs.make_directory(path).await
    }

    async fn write(&self, path: &Path, _asset: &Asset) -> CacheResult<()> {
        Err(CacheError::CacheWrite {
            path: path.to_path_buf(),
            message: "read-only filesystem".to_string(),
        })
    }
}

/// Local disk that refuses to create directories.
struct NoMkdirFs;

#[async_trait]
impl Filesystem for NoMkdirFs {
    async fn exists(&self, path: &Path) -> CacheResult<bool> {
        LocalFs.exists(path).await
    }

    async fn make_directory(&self, path: &Path) -> CacheResult<()> {
        Err(CacheError::CacheWrite {
            path: path.to_path_buf(),
            message: "permission denied".to_string(),
        })
    }

    async fn write(&self, path: &Path, asset: &Asset) -> CacheResult<()> {
        LocalFs.write(path, asset).await
    }
}

struct Fixture {
    cache: Arc<FileCache>,
    origin: Arc<MockOrigin>,
    temp_dir: TempDir,
}

impl Fixture {
    fn root(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("cache")
    }
}

fn fixture_with(
    origin: MockOrigin,
    config: CacheConfig,
    codec: Arc<dyn Codec>,
    fs: Arc<dyn Filesystem>,
) -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let config = config.with_cache_dir(temp_dir.path().join("cache"));
    let origin = Arc::new(origin);
    let cache = FileCache::with_components(config, origin.clone(), codec, fs);
    Fixture {
        cache: Arc::new(cache),
        origin,
        temp_dir,
    }
}

fn fixture(origin: MockOrigin) -> Fixture {
    fixture_with(
        origin,
        CacheConfig::default(),
        Arc::new(NoopCodec),
        Arc::new(LocalFs),
    )
}

const TILE: &str = "http://host/dir/tile.png";

#[tokio::test]
async fn test_miss_then_hit() {
    let f = fixture(MockOrigin::default().with_image(TILE, "png", PNG_TILE));

    let first = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert_eq!(first.source, AssetSource::Origin(TILE.to_string()));
    assert!(first.stored);
    assert_eq!(first.asset.data, PNG_TILE);

    // Stored untranscoded under the `.dds` name.
    let artifact = f.root().join("host/dir/tile.dds");
    assert_eq!(fs::read(&artifact).await.unwrap(), PNG_TILE);

    let second = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert!(second.is_cache_hit());
    assert!(!second.stored);
    assert_eq!(second.asset, first.asset);
    assert_eq!(second.asset.format, "png");
    assert_eq!(f.origin.fetch_count(), 1);
}

#[tokio::test]
async fn test_query_string_identifier_layout() {
    let id = "http://tiles.example.com/z3/x5/y2.png?v=2";
    let f = fixture(MockOrigin::default().with_image(id, "png", b"y2"));

    let resolved = f.cache.request_image(id, &LoadOptions::new()).await.unwrap();
    assert!(resolved.stored);

    let artifact = f.root().join("tiles.example.com/z3/x5/y2.dds");
    assert!(artifact.exists(), "expected artifact at {}", artifact.display());
}

#[tokio::test]
async fn test_offline_refuses_network_fetch() {
    let f = fixture_with(
        MockOrigin::default().with_image("http://host/missing.png", "png", b"x"),
        CacheConfig::default().with_offline(true),
        Arc::new(NoopCodec),
        Arc::new(LocalFs),
    );

    let err = f
        .cache
        .request_image("http://host/missing.png", &LoadOptions::new())
        .await
        .unwrap_err();

    assert!(err.is_offline_refusal(), "unexpected error: {:?}", err);
    assert_eq!(f.origin.fetch_count(), 0);
    assert!(!f.root().exists(), "offline refusal must not touch the filesystem");
}

#[tokio::test]
async fn test_offline_serves_existing_artifact() {
    let f = fixture(MockOrigin::default().with_image(TILE, "png", b"tile"));

    f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    f.cache.set_offline(true);

    let resolved = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert!(resolved.is_cache_hit());
    assert_eq!(f.origin.fetch_count(), 1);
}

#[tokio::test]
async fn test_offline_toggled_at_runtime() {
    let f = fixture(MockOrigin::default().with_image(TILE, "png", b"tile"));

    f.cache.set_offline(true);
    let err = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap_err();
    assert!(err.is_offline_refusal());

    f.cache.set_offline(false);
    let resolved = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert!(resolved.stored);
}

#[tokio::test]
async fn test_local_identifier_is_loaded_but_never_cached() {
    let local = "/data/imagery/world.png";
    let f = fixture_with(
        MockOrigin::default().with_image(local, "png", b"world"),
        CacheConfig::default().with_offline(true),
        Arc::new(NoopCodec),
        Arc::new(LocalFs),
    );

    for _ in 0..2 {
        let resolved = f.cache.request_image(local, &LoadOptions::new()).await.unwrap();
        assert_eq!(resolved.source, AssetSource::Origin(local.to_string()));
        assert!(!resolved.stored);
    }

    assert_eq!(f.origin.fetch_count(), 2);
    assert!(!f.root().exists());
}

#[tokio::test]
async fn test_fetch_failure_writes_nothing() {
    let f = fixture(MockOrigin::default());

    let err = f
        .cache
        .request_image("http://host/gone.png", &LoadOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::Fetch { .. }));
    assert!(!f.root().exists());
}

#[tokio::test]
async fn test_directory_creation_failure_still_returns_asset() {
    let f = fixture_with(
        MockOrigin::default().with_image(TILE, "png", b"tile"),
        CacheConfig::default(),
        Arc::new(NoopCodec),
        Arc::new(NoMkdirFs),
    );

    let resolved = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert_eq!(resolved.asset.data, b"tile");
    assert!(!resolved.stored);
    assert!(!f.root().join("host/dir/tile.dds").exists());

    f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert_eq!(f.origin.fetch_count(), 2);
}

#[tokio::test]
async fn test_uncheckable_cache_path_is_a_read_failure() {
    let f = fixture(MockOrigin::default().with_image(TILE, "png", b"tile"));

    // A regular file where the authority directory should go.
    fs::create_dir_all(f.root()).await.unwrap();
    fs::write(f.root().join("host"), b"in the way").await.unwrap();

    let err = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap_err();
    assert!(
        matches!(err, CacheError::CacheRead { .. }),
        "should surface the broken cache path: {:?}",
        err
    );
    assert_eq!(f.origin.fetch_count(), 0, "must not treat it as a miss");
}

#[tokio::test]
async fn test_write_failure_still_returns_asset() {
    let f = fixture_with(
        MockOrigin::default().with_image(TILE, "png", b"tile"),
        CacheConfig::default(),
        Arc::new(NoopCodec),
        Arc::new(ReadOnlyFs),
    );

    let resolved = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert!(!resolved.stored);
    assert_eq!(resolved.asset.data, b"tile");

    // Not cached, so the next request goes back to origin.
    f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert_eq!(f.origin.fetch_count(), 2);
}

#[tokio::test]
async fn test_unreadable_artifact_is_a_hard_failure() {
    let f = fixture(MockOrigin::default().with_image(TILE, "png", b"tile"));

    let artifact = f.cache.image_key(TILE);
    fs::create_dir_all(artifact.parent().unwrap()).await.unwrap();
    fs::write(artifact.as_path(), CORRUPT).await.unwrap();

    let err = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap_err();
    assert!(
        matches!(err, CacheError::CacheRead { .. }),
        "should surface read failure: {:?}",
        err
    );
    assert_eq!(f.origin.fetch_count(), 0, "must not silently refetch");
}

#[tokio::test]
async fn test_eligible_image_is_transcoded_before_persisting() {
    let f = fixture_with(
        MockOrigin::default().with_image(TILE, "png", b"rgba"),
        CacheConfig::default(),
        Arc::new(DdsCodec { fail: false }),
        Arc::new(LocalFs),
    );

    let resolved = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert!(resolved.stored);
    assert_eq!(resolved.asset.format, "dds");
    assert_eq!(resolved.asset.data, b"DDS rgba");

    let on_disk = fs::read(f.root().join("host/dir/tile.dds")).await.unwrap();
    assert_eq!(on_disk, b"DDS rgba");

    let hit = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert!(hit.is_cache_hit());
    assert_eq!(hit.asset, resolved.asset);
}

#[tokio::test]
async fn test_ineligible_image_is_stored_as_fetched() {
    let id = "http://host/dir/photo.jpg";
    let f = fixture_with(
        MockOrigin::default().with_image(id, "jpeg", JPEG_PHOTO),
        CacheConfig::default(),
        Arc::new(DdsCodec { fail: false }),
        Arc::new(LocalFs),
    );

    let resolved = f.cache.request_image(id, &LoadOptions::new()).await.unwrap();
    assert!(resolved.stored);
    assert_eq!(resolved.asset.format, "jpeg");
    assert_eq!(fs::read(f.root().join("host/dir/photo.dds")).await.unwrap(), JPEG_PHOTO);

    // The `.dds` name must not relabel a JPEG on the way back out.
    let hit = f.cache.request_image(id, &LoadOptions::new()).await.unwrap();
    assert!(hit.is_cache_hit());
    assert_eq!(hit.asset, resolved.asset);
    assert_eq!(f.origin.fetch_count(), 1);
}

#[tokio::test]
async fn test_codec_skipped_when_extension_differs() {
    let f = fixture_with(
        MockOrigin::default().with_image(TILE, "png", b"rgba"),
        CacheConfig::default().with_image_extension("png"),
        Arc::new(DdsCodec { fail: false }),
        Arc::new(LocalFs),
    );

    let resolved = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert_eq!(resolved.asset.format, "png");
    assert_eq!(fs::read(f.root().join("host/dir/tile.png")).await.unwrap(), b"rgba");
}

#[tokio::test]
async fn test_codec_failure_skips_caching() {
    let f = fixture_with(
        MockOrigin::default().with_image(TILE, "png", b"rgba"),
        CacheConfig::default(),
        Arc::new(DdsCodec { fail: true }),
        Arc::new(LocalFs),
    );

    let resolved = f.cache.request_image(TILE, &LoadOptions::new()).await.unwrap();
    assert!(!resolved.stored);
    assert_eq!(resolved.asset.format, "png");
    assert!(!f.root().join("host/dir/tile.dds").exists());
}

#[tokio::test]
async fn test_concurrent_misses_fetch_once() {
    let f = fixture(
        MockOrigin::default()
            .with_image(TILE, "png", b"tile")
            .with_delay(Duration::from_millis(50)),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = f.cache.clone();
        handles.push(tokio::spawn(async move {
            cache.request_image(TILE, &LoadOptions::new()).await
        }));
    }

    let mut hits = 0;
    for handle in handles {
        let resolved = handle.await.unwrap().unwrap();
        assert_eq!(resolved.asset.data, b"tile");
        if resolved.is_cache_hit() {
            hits += 1;
        }
    }

    assert_eq!(f.origin.fetch_count(), 1);
    assert_eq!(hits, 7);
}

#[tokio::test]
async fn test_concurrent_misses_without_single_flight_all_succeed() {
    let f = fixture_with(
        MockOrigin::default()
            .with_image(TILE, "png", b"tile")
            .with_delay(Duration::from_millis(20)),
        CacheConfig::default().with_single_flight(false),
        Arc::new(NoopCodec),
        Arc::new(LocalFs),
    );

    let mut handles = Vec::new();
    for _ in 0..4 {
        let cache = f.cache.clone();
        handles.push(tokio::spawn(async move {
            cache.request_image(TILE, &LoadOptions::new()).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().asset.data, b"tile");
    }

    assert!(f.origin.fetch_count() >= 1);
    assert_eq!(fs::read(f.root().join("host/dir/tile.dds")).await.unwrap(), b"tile");
}

#[tokio::test]
async fn test_height_fields_and_nodes_pass_through() {
    let dem = "http://host/dem/n45e007.tif";
    let model = "http://host/models/tower.ive";
    let f = fixture_with(
        MockOrigin::default()
            .with_image(dem, "tif", b"elevation")
            .with_image(model, "ive", b"scene"),
        CacheConfig::default().with_offline(true),
        Arc::new(NoopCodec),
        Arc::new(LocalFs),
    );

    for _ in 0..2 {
        let grid = f
            .cache
            .request_height_field(dem, &LoadOptions::new())
            .await
            .unwrap();
        assert_eq!(grid.kind, AssetKind::HeightField);
        assert_eq!(grid.data, b"elevation");
    }

    let node = f.cache.request_node(model, &LoadOptions::new()).await.unwrap();
    assert_eq!(node.kind, AssetKind::Node);

    assert_eq!(f.origin.fetch_count(), 3);
    assert_eq!(
        f.origin.kinds(),
        vec![AssetKind::HeightField, AssetKind::HeightField, AssetKind::Node]
    );
    assert!(!f.root().exists(), "pass-through kinds must not be cached");
}

#[tokio::test]
async fn test_pass_through_failure_is_fetch_error() {
    let f = fixture(MockOrigin::default());
    let err = f
        .cache
        .request_height_field("http://host/dem/missing.tif", &LoadOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Fetch { .. }));
}

#[tokio::test]
async fn test_image_requests_force_image_kind() {
    let f = fixture(MockOrigin::default().with_image(TILE, "png", b"tile"));
    let options = LoadOptions {
        kind: AssetKind::Node,
        ..LoadOptions::default()
    };

    let resolved = f.cache.request_image(TILE, &options).await.unwrap();
    assert_eq!(resolved.asset.kind, AssetKind::Image);
    assert_eq!(f.origin.kinds(), vec![AssetKind::Image]);
}
