//! Time-bounded payload cache guarding network fetches.
//!
//! This module provides a feed-agnostic caching mechanism that:
//! - Stores one JSON payload per fetch target, stamped with its write time
//! - Treats entries older than a TTL as missing
//! - Collapses every read failure into a cache miss
//! - Reports, but never propagates, write failures

mod layer;
mod storage;
mod traits;

use std::path::PathBuf;
use thiserror::Error;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, FileStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, MissReason};

#[cfg(test)]
pub use traits::{CacheEntry, CacheKey};

/// Failures inside a storage backend. Never fatal to a fetch.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache I/O error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("cache entry at {location} is invalid: {reason}")]
  Corrupt { location: String, reason: String },
  #[error("failed to serialize cache entry: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("cache database error: {0}")]
  Database(String),
}
