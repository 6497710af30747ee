//! Source identifier parsing.
//!
//! Identifiers are opaque strings. Only network locators get cached:
//! - `http://tiles.example.com/z3/x5/y2.png` → remote, authority `tiles.example.com`
//! - `ftp://mirror:21/dem.tif` → remote, authority `mirror:21`
//! - `/data/image.png`, `C:\data\image.png`, `file:///data/image.png` → local

/// Schemes treated as network locations (compared case-insensitively).
pub const NETWORK_SCHEMES: &[&str] = &["http", "https", "ftp"];

const SCHEME_SEPARATOR: &str = "://";

/// A parsed source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceId<'a> {
    /// Network locator split into its parts.
    Remote {
        scheme: &'a str,
        authority: &'a str,
        /// Path after the first `/` following the authority, without that slash.
        path: &'a str,
    },

    /// Local filesystem path (or any non-network identifier).
    Local(&'a str),
}

impl<'a> SourceId<'a> {
    /// Parse an identifier. Never fails; anything that is not a network
    /// locator is local.
    ///
    /// # Examples
    ///
    /// ```
    /// use asset_cache::SourceId;
    ///
    /// let remote = SourceId::parse("http://host:8080/dir/tile.png?v=2");
    /// assert_eq!(
    ///     remote,
    ///     SourceId::Remote { scheme: "http", authority: "host:8080", path: "dir/tile.png?v=2" }
    /// );
    ///
    /// assert_eq!(SourceId::parse("/local/image.png"), SourceId::Local("/local/image.png"));
    /// ```
    pub fn parse(identifier: &'a str) -> Self {
        let Some(sep) = identifier.find(SCHEME_SEPARATOR) else {
            return Self::Local(identifier);
        };

        let scheme = &identifier[..sep];
        if !NETWORK_SCHEMES
            .iter()
            .any(|known| known.eq_ignore_ascii_case(scheme))
        {
            return Self::Local(identifier);
        }

        let rest = &identifier[sep + SCHEME_SEPARATOR.len()..];
        let (authority, path) = match rest.find('/') {
            Some(slash) => (&rest[..slash], &rest[slash + 1..]),
            None => (rest, ""),
        };

        Self::Remote {
            scheme,
            authority,
            path,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Whether the identifier names a network location.
pub fn is_network_location(identifier: &str) -> bool {
    SourceId::parse(identifier).is_remote()
}

/// Authority (host and optional port) of a network identifier; empty for local ones.
pub fn network_authority(identifier: &str) -> &str {
    match SourceId::parse(identifier) {
        SourceId::Remote { authority, .. } => authority,
        SourceId::Local(_) => "",
    }
}

/// Remote path of a network identifier; local identifiers are returned as-is.
pub fn network_path(identifier: &str) -> &str {
    match SourceId::parse(identifier) {
        SourceId::Remote { path, .. } => path,
        SourceId::Local(path) => path,
    }
}

/// Strip a `file://` prefix from a local identifier.
pub(crate) fn local_path(identifier: &str) -> &str {
    identifier.strip_prefix("file://").unwrap_or(identifier)
}
