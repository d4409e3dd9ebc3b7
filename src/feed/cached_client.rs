//! Feed client wrapped with transparent caching.

use chrono::Duration;
use serde_json::Value;

use crate::cache::{CacheLayer, CacheResult, CacheStorage};

use super::client::{FeedClient, Transport};
use super::FetchError;

/// Feed client with cache-read-before / cache-write-after semantics.
///
/// This wraps the underlying FeedClient and provides the same fetch, but
/// serves fresh-enough data from the cache and repopulates it after a
/// network fetch.
pub struct CachedFeedClient<T: Transport, S: CacheStorage> {
  inner: FeedClient<T>,
  cache: CacheLayer<S>,
}

impl<T: Transport, S: CacheStorage> CachedFeedClient<T, S> {
  pub fn new(inner: FeedClient<T>, cache: CacheLayer<S>) -> Self {
    Self { inner, cache }
  }

  /// Resolve the payload for `target` from cache or network.
  ///
  /// With `use_cache` off the cache is neither read nor written. Cache
  /// problems never surface here; only `Request` and `Parse` errors do.
  pub async fn fetch(
    &self,
    target: &str,
    use_cache: bool,
    ttl: Duration,
  ) -> Result<CacheResult<Value>, FetchError> {
    if !use_cache {
      let data = self.inner.fetch_incidents(target).await?;
      return Ok(CacheResult::from_network(data));
    }

    self
      .cache
      .fetch(target, ttl, || self.inner.fetch_incidents(target))
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheEntry, CacheKey, CacheSource, FileStorage};
  use crate::diagnostics::testing::CollectingSink;
  use crate::feed::client::testing::StubTransport;
  use serde_json::json;
  use std::sync::Arc;
  use tempfile::TempDir;

  const BODY: &str = r#"{"incidents": [{"id": "a", "created_at": "2025-01-15T00:00:00Z", "impact": "major"}]}"#;
  const TARGET: &str = "https://example.com/api/v2/incidents.json";

  fn client(
    transport: StubTransport,
    dir: &TempDir,
  ) -> CachedFeedClient<StubTransport, FileStorage> {
    let sink = Arc::new(CollectingSink::default());
    CachedFeedClient::new(
      FeedClient::new(transport),
      CacheLayer::new(FileStorage::new(dir.path()), sink),
    )
  }

  #[tokio::test]
  async fn test_network_at_most_once_within_ttl() {
    let dir = TempDir::new().unwrap();
    let transport = StubTransport::ok(BODY);
    let client = client(transport.clone(), &dir);

    let first = client
      .fetch(TARGET, true, Duration::seconds(3600))
      .await
      .unwrap();
    let second = client
      .fetch(TARGET, true, Duration::seconds(3600))
      .await
      .unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(first.data, second.data);
  }

  #[tokio::test]
  async fn test_cache_disabled_always_hits_network_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let transport = StubTransport::ok(BODY);
    let client = client(transport.clone(), &dir);

    for _ in 0..2 {
      client
        .fetch(TARGET, false, Duration::seconds(3600))
        .await
        .unwrap();
    }

    assert_eq!(transport.calls(), 2);
    assert!(!FileStorage::new(dir.path()).exists(&CacheKey::for_target(TARGET)));
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched() {
    let dir = TempDir::new().unwrap();
    let transport = StubTransport::ok(BODY);
    let storage = FileStorage::new(dir.path());
    let stale = CacheEntry::with_timestamp(
      json!({"incidents": []}),
      chrono::Utc::now() - Duration::seconds(61),
    );
    storage
      .write(&CacheKey::for_target(TARGET), &stale)
      .unwrap();
    let client = client(transport.clone(), &dir);

    let result = client
      .fetch(TARGET, true, Duration::seconds(60))
      .await
      .unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(result.data["incidents"][0]["impact"], "major");
  }

  #[tokio::test]
  async fn test_empty_cache_file_falls_back_without_error() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    std::fs::write(storage.path_for(&CacheKey::for_target(TARGET)), "").unwrap();
    let transport = StubTransport::ok(BODY);
    let client = client(transport.clone(), &dir);

    let result = client
      .fetch(TARGET, true, Duration::seconds(3600))
      .await
      .unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(result.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_fresh_cache_serves_without_network() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    storage
      .write(
        &CacheKey::for_target(TARGET),
        &CacheEntry::new(json!({"incidents": [], "from": "cache"})),
      )
      .unwrap();
    let transport = StubTransport::failing("offline");
    let client = client(transport.clone(), &dir);

    let result = client
      .fetch(TARGET, true, Duration::seconds(3600))
      .await
      .unwrap();

    assert_eq!(transport.calls(), 0);
    assert_eq!(result.data["from"], "cache");
  }

  #[tokio::test]
  async fn test_request_error_surfaces_on_miss() {
    let dir = TempDir::new().unwrap();
    let client = client(StubTransport::failing("timed out"), &dir);

    let err = client
      .fetch(TARGET, true, Duration::seconds(3600))
      .await
      .unwrap_err();

    assert_eq!(err, FetchError::Request("timed out".to_string()));
  }

  #[tokio::test]
  async fn test_parse_error_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let client = client(StubTransport::ok(r#"{"components": []}"#), &dir);

    let err = client
      .fetch(TARGET, true, Duration::seconds(3600))
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Parse(_)));
    assert!(!FileStorage::new(dir.path()).exists(&CacheKey::for_target(TARGET)));
  }
}
