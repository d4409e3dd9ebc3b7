//! Cache layer that orchestrates cache lookups with network fetching.

use chrono::{Duration, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::storage::CacheStorage;
use super::traits::{CacheEntry, CacheKey, CacheLookup, CacheResult, MissReason};
use crate::diagnostics::DiagnosticSink;

/// Cache layer that manages staleness checks and write-back.
///
/// This layer sits between the application and the network client. Storage
/// failures never escape it: reads degrade to a miss and write failures are
/// reported to the diagnostic sink.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  sink: Arc<dyn DiagnosticSink>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S, sink: Arc<dyn DiagnosticSink>) -> Self {
    Self {
      storage: Arc::new(storage),
      sink,
    }
  }

  #[cfg(test)]
  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Look up `target`, treating entries older than `ttl` as missing.
  pub fn lookup(&self, target: &str, ttl: Duration) -> CacheLookup {
    let key = CacheKey::for_target(target);

    let entry = match self.storage.read(&key) {
      Ok(Some(entry)) => entry,
      Ok(None) => return CacheLookup::Miss(MissReason::Absent),
      Err(e) => return CacheLookup::Miss(MissReason::Unreadable(e.to_string())),
    };

    let Some(cached_at) = entry.cached_at() else {
      return CacheLookup::Miss(MissReason::Unreadable(format!(
        "invalid timestamp {}",
        entry.timestamp
      )));
    };

    if Utc::now() - cached_at > ttl {
      return CacheLookup::Miss(MissReason::Expired { cached_at });
    }

    CacheLookup::Hit {
      data: entry.data,
      cached_at,
    }
  }

  /// Store `data` for `target` stamped with the current time.
  ///
  /// Returns whether the write succeeded; failures are only reported.
  pub fn store(&self, target: &str, data: &Value) -> bool {
    let key = CacheKey::for_target(target);
    let replaced = self.storage.exists(&key);
    match self.storage.write(&key, &CacheEntry::new(data.clone())) {
      Ok(()) => {
        tracing::info!(location = %self.storage.location(&key), replaced, "data cached successfully");
        true
      }
      Err(e) => {
        self.sink.cache_write_failed(&self.storage.location(&key), &e);
        false
      }
    }
  }

  /// Fetch with a cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale, missing or unreadable, fetch from network
  /// 3. Write the fetched data back to the cache
  ///
  /// Fetcher errors are returned unchanged; nothing is written in that case.
  pub async fn fetch<F, Fut, E>(
    &self,
    target: &str,
    ttl: Duration,
    fetcher: F,
  ) -> Result<CacheResult<Value>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, E>>,
  {
    match self.lookup(target, ttl) {
      CacheLookup::Hit { data, cached_at } => {
        tracing::info!(cached_at = %cached_at.to_rfc3339(), "using cached data");
        return Ok(CacheResult::from_cache(data, cached_at));
      }
      CacheLookup::Miss(reason) => {
        let location = self.storage.location(&CacheKey::for_target(target));
        self.sink.cache_miss(&location, &reason);
      }
    }

    let data = fetcher().await?;
    self.store(target, &data);
    Ok(CacheResult::from_network(data))
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      sink: Arc::clone(&self.sink),
    }
  }
}
