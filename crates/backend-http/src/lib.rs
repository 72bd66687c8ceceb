//! HTTP shared-cache tier.
//!
//! Implements the `RemoteTier` trait against a REST key-value cache service
//! (one `GET`/`PUT`/`DELETE` per key under `/kv/`). Keeping the engine
//! behind the trait means the tier can be swapped for Redis or memcached
//! without touching cache or scoring logic.

use grocermatch_cache::{RemoteCacheError, RemoteTier};
use std::time::Duration;

/// Shared cache service configuration.
#[derive(Debug, Clone)]
pub struct HttpCacheConfig {
    /// Base URL for the cache service
    pub base_url: String,
    /// Request timeout; the engine must never hang on cache round trips
    pub timeout: Duration,
}

impl Default for HttpCacheConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7700".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// HTTP-backed shared cache tier.
pub struct HttpCacheTier {
    config: HttpCacheConfig,
    client: reqwest::Client,
}

impl HttpCacheTier {
    /// Create a new HTTP cache tier.
    pub fn new(config: HttpCacheConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn entry_url(&self, key: &str) -> String {
        format!("{}/kv/{}", self.config.base_url, key)
    }

    fn flush_url(&self) -> String {
        format!("{}/kv", self.config.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url)
    }
}

impl RemoteTier for HttpCacheTier {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteCacheError> {
        let url = self.entry_url(key);
        tracing::debug!(url = %url, "cache tier get");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RemoteCacheError::Connection(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteCacheError::RequestFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteCacheError::Codec(e.to_string()))?;
        Ok(Some(body))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RemoteCacheError> {
        let url = self.entry_url(key);
        tracing::debug!(url = %url, ttl_secs = ttl.as_secs(), "cache tier put");

        let response = self
            .client
            .put(&url)
            .query(&[("ttl", ttl.as_secs().to_string())])
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| RemoteCacheError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteCacheError::RequestFailed(format!(
                "HTTP {}",
                response.status()
            )))
        }
    }

    async fn flush(&self) -> Result<(), RemoteCacheError> {
        let response = self
            .client
            .delete(self.flush_url())
            .send()
            .await
            .map_err(|e| RemoteCacheError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteCacheError::RequestFailed(format!(
                "HTTP {}",
                response.status()
            )))
        }
    }

    async fn health_check(&self) -> Result<(), RemoteCacheError> {
        let response = self
            .client
            .get(self.health_url())
            .send()
            .await
            .map_err(|e| RemoteCacheError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteCacheError::Unavailable)
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_url() {
        let tier = HttpCacheTier::new(HttpCacheConfig::default());
        assert_eq!(tier.entry_url("abc123"), "http://127.0.0.1:7700/kv/abc123");
    }

    #[test]
    fn test_flush_and_health_urls() {
        let tier = HttpCacheTier::new(HttpCacheConfig {
            base_url: "http://cache:9000".to_string(),
            ..Default::default()
        });
        assert_eq!(tier.flush_url(), "http://cache:9000/kv");
        assert_eq!(tier.health_url(), "http://cache:9000/health");
    }

    #[test]
    fn test_tier_name() {
        let tier = HttpCacheTier::new(HttpCacheConfig::default());
        assert_eq!(tier.name(), "http");
    }
}
