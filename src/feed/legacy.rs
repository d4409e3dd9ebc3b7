//! Deprecated single-file cache (`--cache-file`).
//!
//! The file holds the raw payload with no timestamp, so it never expires.

use serde_json::Value;
use std::path::Path;

/// Load a payload from the legacy cache file, if it exists and parses.
pub fn load(path: &Path) -> Option<Value> {
  if !path.exists() {
    tracing::info!(path = %path.display(), "legacy cache file not found");
    return None;
  }

  let contents = match std::fs::read(path) {
    Ok(c) => c,
    Err(e) => {
      tracing::warn!(path = %path.display(), error = %e, "failed to read legacy cache file");
      return None;
    }
  };

  match serde_json::from_slice(&contents) {
    Ok(data) => {
      tracing::info!(path = %path.display(), "loaded cached data from legacy cache file");
      Some(data)
    }
    Err(e) => {
      tracing::warn!(path = %path.display(), error = %e, "failed to parse legacy cache file");
      None
    }
  }
}

/// Save a payload to the legacy cache file. Failures only warn.
pub fn save(path: &Path, data: &Value) -> bool {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    if let Err(e) = std::fs::create_dir_all(parent) {
      tracing::warn!(path = %path.display(), error = %e, "failed to create legacy cache directory");
      return false;
    }
  }

  let result = serde_json::to_vec(data)
    .map_err(|e| e.to_string())
    .and_then(|bytes| std::fs::write(path, bytes).map_err(|e| e.to_string()));

  match result {
    Ok(()) => {
      tracing::info!(path = %path.display(), "cached data saved to legacy cache file");
      true
    }
    Err(e) => {
      tracing::warn!(path = %path.display(), error = e.as_str(), "failed to save legacy cache file");
      false
    }
  }
}
