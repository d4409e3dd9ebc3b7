//! Cache storage trait with file and SQLite implementations.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{CacheEntry, CacheKey};
use super::CacheError;

/// Trait for cache storage backends.
///
/// Backends store one entry per key and overwrite on write. They never
/// delete entries; staleness is decided by the cache layer.
pub trait CacheStorage: Send + Sync {
  /// Read the entry stored under `key`, or `None` if there is none.
  fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

  /// Store `entry` under `key`, replacing any previous entry.
  fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError>;

  /// Whether an entry exists for `key`, regardless of its content.
  fn exists(&self, key: &CacheKey) -> bool;

  /// Human-readable location of the entry, for diagnostics.
  fn location(&self, key: &CacheKey) -> String;
}

impl<S: CacheStorage + ?Sized> CacheStorage for Box<S> {
  fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
    (**self).read(key)
  }

  fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
    (**self).write(key, entry)
  }

  fn exists(&self, key: &CacheKey) -> bool {
    (**self).exists(key)
  }

  fn location(&self, key: &CacheKey) -> String {
    (**self).location(key)
  }
}

/// One JSON file per key inside a cache directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  /// Create storage rooted at `dir`. The directory is created on first write.
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  /// Path of the file holding the entry for `key`.
  pub fn path_for(&self, key: &CacheKey) -> PathBuf {
    self.dir.join(format!("{}.json", key))
  }
}

impl CacheStorage for FileStorage {
  fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
    let path = self.path_for(key);
    if !path.exists() {
      return Ok(None);
    }

    let contents = std::fs::read(&path).map_err(|source| CacheError::Io {
      path: path.clone(),
      source,
    })?;

    let entry = serde_json::from_slice(&contents).map_err(|e| CacheError::Corrupt {
      location: path.display().to_string(),
      reason: e.to_string(),
    })?;

    Ok(Some(entry))
  }

  fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
    std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
      path: self.dir.clone(),
      source,
    })?;

    let data = serde_json::to_vec(entry)?;
    let path = self.path_for(key);
    // Write to a sibling first so readers never see a half-written entry
    let tmp = path.with_extension("json.tmp");

    std::fs::write(&tmp, data).map_err(|source| CacheError::Io {
      path: tmp.clone(),
      source,
    })?;
    std::fs::rename(&tmp, &path).map_err(|source| CacheError::Io {
      path: path.clone(),
      source,
    })?;

    Ok(())
  }

  fn exists(&self, key: &CacheKey) -> bool {
    self.path_for(key).is_file()
  }

  fn location(&self, key: &CacheKey) -> String {
    self.path_for(key).display().to_string()
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
  path: PathBuf,
}

/// Schema for the payload cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS payload_cache (
    cache_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    cached_at REAL NOT NULL
);
"#;

impl SqliteStorage {
  /// Open (or create) `cache.db` inside `dir`.
  pub fn open(dir: &Path) -> Result<Self, CacheError> {
    std::fs::create_dir_all(dir).map_err(|source| CacheError::Io {
      path: dir.to_path_buf(),
      source,
    })?;

    let path = dir.join("cache.db");
    let conn = Connection::open(&path).map_err(|e| {
      CacheError::Database(format!(
        "failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    let storage = Self {
      conn: Mutex::new(conn),
      path,
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Open an in-memory database. Entries vanish with the process.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, CacheError> {
    let conn = Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
    let storage = Self {
      conn: Mutex::new(conn),
      path: PathBuf::from(":memory:"),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn run_migrations(&self) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| CacheError::Database(format!("failed to run cache migrations: {}", e)))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
    self
      .conn
      .lock()
      .map_err(|e| CacheError::Database(format!("lock poisoned: {}", e)))
  }
}

impl CacheStorage for SqliteStorage {
  fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, f64)> = conn
      .query_row(
        "SELECT data, cached_at FROM payload_cache WHERE cache_key = ?",
        params![key.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| CacheError::Database(format!("failed to query cache: {}", e)))?;

    match row {
      Some((data, timestamp)) => {
        let data: Value = serde_json::from_slice(&data).map_err(|e| CacheError::Corrupt {
          location: self.location(key),
          reason: e.to_string(),
        })?;
        Ok(Some(CacheEntry { timestamp, data }))
      }
      None => Ok(None),
    }
  }

  fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
    let data = serde_json::to_vec(&entry.data)?;
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO payload_cache (cache_key, data, cached_at) VALUES (?, ?, ?)",
        params![key.as_str(), data, entry.timestamp],
      )
      .map_err(|e| CacheError::Database(format!("failed to store entry: {}", e)))?;

    Ok(())
  }

  fn exists(&self, key: &CacheKey) -> bool {
    let Ok(conn) = self.lock() else {
      return false;
    };
    conn
      .query_row(
        "SELECT 1 FROM payload_cache WHERE cache_key = ?",
        params![key.as_str()],
        |_| Ok(()),
      )
      .optional()
      .ok()
      .flatten()
      .is_some()
  }

  fn location(&self, key: &CacheKey) -> String {
    format!("{}#{}", self.path.display(), key)
  }
}
