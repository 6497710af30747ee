//! HTTP layer: the ONLY place for status code handling.
//!
//! One-shot requests: a failed fetch is reported, never retried here.

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::types::{Asset, LoadOptions};

use super::helpers::{format_from_content_type, format_from_signature, format_from_url};

/// HTTP backend (holds the reqwest client).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
}

impl HttpBackend {
    /// GET `url`; any non-2xx status is a fetch failure.
    pub(crate) async fn get(&self, url: &str, options: &LoadOptions) -> CacheResult<Asset> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CacheError::fetch(url, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "origin returned error status");
            return Err(CacheError::fetch(url, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(format_from_content_type);

        let data = response
            .bytes()
            .await
            .map_err(|e| CacheError::fetch(url, format!("failed to read response body: {}", e)))?;

        // Same precedence as a cached read-back, so hits and misses agree.
        let format = format_from_signature(&data)
            .map(String::from)
            .or(content_type)
            .unwrap_or_else(|| format_from_url(url));

        debug!(url, bytes = data.len(), format = %format, "fetched from origin");
        Ok(Asset::new(options.kind, format, data.to_vec()))
    }
}
