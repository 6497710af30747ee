//! Cache key derivation.
//!
//! Maps a source identifier to a filesystem-safe location under the cache
//! root:
//!
//! ```text
//! http://tiles.example.com/z3/x5/y2.png?v=2
//!   → {root}/tiles.example.com/z3/x5/y2.png_v=2    (cache key)
//!   → {root}/tiles.example.com/z3/x5/y2.dds        (image key, extension "dds")
//! ```
//!
//! Local identifiers derive the empty key and are never cached.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::identifier::SourceId;

/// A derived cache location. Empty means "do not cache".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// The "do not cache" key.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Directory portion of the key (everything before the last `/` or `\`).
    ///
    /// Returns `None` for the empty key or a key without any separator.
    pub fn parent(&self) -> Option<PathBuf> {
        self.0
            .rfind(is_separator)
            .map(|pos| PathBuf::from(&self.0[..pos]))
    }

    /// Replace the extension with `extension`.
    ///
    /// The extension is whatever follows the last `.` that comes after the
    /// last path separator; without one, `.{extension}` is appended. Empty
    /// keys and empty extensions are returned unchanged.
    pub fn with_extension(&self, extension: &str) -> Self {
        if self.is_empty() || extension.is_empty() {
            return self.clone();
        }

        let stem = match (self.0.rfind('.'), self.0.rfind(is_separator)) {
            (Some(dot), Some(sep)) if dot < sep => self.0.as_str(),
            (Some(dot), _) => &self.0[..dot],
            (None, _) => self.0.as_str(),
        };

        Self(format!("{}.{}", stem, extension))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for CacheKey {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Replace `?` with `_`, and every `:` except one at byte index 1 (drive letter).
fn sanitize(raw: String) -> String {
    raw.char_indices()
        .map(|(i, c)| match c {
            '?' => '_',
            ':' if i != 1 => '_',
            other => other,
        })
        .collect()
}

/// Derives cache keys rooted under a fixed cache directory.
#[derive(Debug, Clone)]
pub struct CacheKeyDeriver {
    root: String,
}

impl CacheKeyDeriver {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_string_lossy().into_owned(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Derive the cache key for an identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use asset_cache::CacheKeyDeriver;
    ///
    /// let deriver = CacheKeyDeriver::new("/cache");
    /// let key = deriver.derive_cache_key("http://tiles.example.com/z3/x5/y2.png?v=2");
    /// assert_eq!(key.as_str(), "/cache/tiles.example.com/z3/x5/y2.png_v=2");
    ///
    /// assert!(deriver.derive_cache_key("/local/path/image.png").is_empty());
    /// ```
    pub fn derive_cache_key(&self, identifier: &str) -> CacheKey {
        let SourceId::Remote {
            authority, path, ..
        } = SourceId::parse(identifier)
        else {
            return CacheKey::empty();
        };

        if self.root.is_empty() {
            return CacheKey::empty();
        }

        CacheKey(sanitize(format!("{}/{}/{}", self.root, authority, path)))
    }

    /// Derive the key for a specific stored representation.
    pub fn derive_representation_key(&self, identifier: &str, target_extension: &str) -> CacheKey {
        self.derive_cache_key(identifier)
            .with_extension(target_extension)
    }
}
