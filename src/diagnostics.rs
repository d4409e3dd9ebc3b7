//! Diagnostic sink shared by the fetcher and the aggregation engine.
//!
//! Components never reach for a process-wide logger directly. They receive a
//! `DiagnosticSink` and report what they skipped or degraded through it; the
//! application decides where those notes go.

use crate::aggregate::SkipReason;
use crate::cache::{CacheError, MissReason};

/// Receiver for non-fatal events raised while fetching and aggregating.
pub trait DiagnosticSink: Send + Sync {
  /// A record was left out of the aggregation sweep.
  fn record_skip(&self, record_id: &str, reason: &SkipReason);

  /// A cache lookup did not produce usable data.
  fn cache_miss(&self, location: &str, reason: &MissReason);

  /// Writing fetched data back to the cache failed.
  fn cache_write_failed(&self, location: &str, error: &CacheError);
}

/// Sink that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
  fn record_skip(&self, record_id: &str, reason: &SkipReason) {
    tracing::warn!(incident = record_id, %reason, "skipping incident");
  }

  fn cache_miss(&self, location: &str, reason: &MissReason) {
    match reason {
      MissReason::Absent => tracing::debug!(location, "cache entry not found"),
      MissReason::Expired { cached_at } => {
        tracing::info!(location, cached_at = %cached_at.to_rfc3339(), "cache expired")
      }
      MissReason::Unreadable(cause) => {
        tracing::warn!(location, cause = cause.as_str(), "ignoring unreadable cache entry")
      }
    }
  }

  fn cache_write_failed(&self, location: &str, error: &CacheError) {
    tracing::warn!(location, %error, "failed to save data to cache");
  }
}
