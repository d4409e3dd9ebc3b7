//! Aggregation of incident records into a month × severity matrix.

mod engine;
mod month;

use thiserror::Error;

pub use engine::{Aggregator, MonthlyMatrix, SkipReason};
pub use month::MonthKey;

#[derive(Debug, Error)]
pub enum ProcessError {
  /// A single record cannot be categorized.
  #[error("invalid incident format: {0}")]
  InvalidRecord(String),
  /// The payload has no usable `incidents` collection.
  #[error("invalid data format: {0}")]
  InvalidPayload(String),
}
