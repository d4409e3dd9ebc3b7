//! Core types for the payload cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable, filesystem-safe key derived from a fetch target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  /// Derive the key for a fetch target (e.g. a feed URL).
  pub fn for_target(target: &str) -> Self {
    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(target.as_bytes());
    Self(hex::encode(hasher.finalize()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A persisted payload together with the moment it was written.
///
/// Serialized as `{"timestamp": <seconds since epoch>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// Seconds since the Unix epoch, fractional.
  pub timestamp: f64,
  /// The fetched payload, stored verbatim.
  pub data: Value,
}

impl CacheEntry {
  /// Create an entry stamped with the current time.
  pub fn new(data: Value) -> Self {
    Self::with_timestamp(data, Utc::now())
  }

  pub fn with_timestamp(data: Value, written_at: DateTime<Utc>) -> Self {
    Self {
      timestamp: written_at.timestamp_millis() as f64 / 1000.0,
      data,
    }
  }

  /// When the entry was written, if the stored timestamp is representable.
  pub fn cached_at(&self) -> Option<DateTime<Utc>> {
    if !self.timestamp.is_finite() {
      return None;
    }
    DateTime::from_timestamp_millis((self.timestamp * 1000.0).round() as i64)
  }
}

/// Outcome of a cache read. Every failure mode collapses into `Miss`.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
  /// Fresh entry found.
  Hit {
    data: Value,
    cached_at: DateTime<Utc>,
  },
  /// Nothing usable in the cache.
  Miss(MissReason),
}

/// Why a lookup missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
  /// No entry stored for the key
  Absent,
  /// Entry is older than the TTL
  Expired { cached_at: DateTime<Utc> },
  /// Entry could not be read or is structurally invalid
  Unreadable(String),
}

/// Result from a cached fetch, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, within its TTL
  Cache,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_cache_key_is_hex_sha256() {
    let key = CacheKey::for_target("https://www.githubstatus.com/api/v2/incidents.json");
    assert_eq!(key.as_str().len(), 64);
    assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_cache_key_distinguishes_targets_naive_escaping_would_merge() {
    // Replacing '/' and '?' with '_' maps both of these to the same name.
    let a = CacheKey::for_target("https://example.com/a_b");
    let b = CacheKey::for_target("https://example.com/a/b");
    let c = CacheKey::for_target("https://example.com/a?b");
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_eq!(a, CacheKey::for_target("https://example.com/a_b"));
  }

  #[test]
  fn test_entry_serializes_with_timestamp_and_data() {
    let written_at = DateTime::from_timestamp(1_700_000_000, 500_000_000).unwrap();
    let entry = CacheEntry::with_timestamp(json!({"incidents": []}), written_at);
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value, json!({"timestamp": 1_700_000_000.5, "data": {"incidents": []}}));
    assert_eq!(entry.cached_at(), Some(written_at));
  }

  #[test]
  fn test_entry_missing_data_field_is_rejected() {
    let parsed = serde_json::from_str::<CacheEntry>(r#"{"timestamp": 1.0}"#);
    assert!(parsed.is_err());
  }

  #[test]
  fn test_entry_with_integer_timestamp_parses() {
    let entry: CacheEntry = serde_json::from_str(r#"{"timestamp": 1700000000, "data": 1}"#).unwrap();
    assert_eq!(
      entry.cached_at(),
      DateTime::from_timestamp(1_700_000_000, 0)
    );
  }
}
