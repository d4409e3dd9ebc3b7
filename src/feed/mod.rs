//! Cache-guarded retrieval of the public incident feed.

mod cached_client;
mod client;
pub mod legacy;

use thiserror::Error;

pub use cached_client::CachedFeedClient;
pub use client::{FeedClient, HttpTransport, Transport};

#[cfg(test)]
pub(crate) use client::testing;

/// Errors that abort a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Transport failure: connection, timeout or non-2xx status
  #[error("API request error: {0}")]
  Request(String),
  /// Body is not JSON or lacks the `incidents` collection
  #[error("API response parsing error: {0}")]
  Parse(String),
}
