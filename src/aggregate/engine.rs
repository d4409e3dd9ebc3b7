//! Month × severity aggregation over loosely-typed incident records.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::month::{parse_timestamp, MonthKey};
use super::ProcessError;
use crate::diagnostics::DiagnosticSink;

/// Dense month × severity count matrix.
///
/// After normalization every month carries a count for every severity label
/// seen anywhere in the batch. Serializes as `{"YYYY-MM": {"label": n}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MonthlyMatrix(BTreeMap<MonthKey, BTreeMap<String, u64>>);

impl MonthlyMatrix {
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Months in chronological order.
  pub fn months(&self) -> impl Iterator<Item = &MonthKey> {
    self.0.keys()
  }

  /// Union of severity labels across all months.
  pub fn severities(&self) -> BTreeSet<&str> {
    self
      .0
      .values()
      .flat_map(|counts| counts.keys().map(String::as_str))
      .collect()
  }

  pub fn count(&self, month: &MonthKey, severity: &str) -> u64 {
    self
      .0
      .get(month)
      .and_then(|counts| counts.get(severity))
      .copied()
      .unwrap_or(0)
  }

  pub fn month_total(&self, month: &MonthKey) -> u64 {
    self.0.get(month).map(|c| c.values().sum()).unwrap_or(0)
  }

  pub fn total(&self) -> u64 {
    self.0.values().flat_map(|c| c.values()).sum()
  }

  #[cfg(test)]
  pub fn get(&self, month: &MonthKey) -> Option<&BTreeMap<String, u64>> {
    self.0.get(month)
  }

  fn increment(&mut self, month: MonthKey, severity: String) {
    *self.0.entry(month).or_default().entry(severity).or_insert(0) += 1;
  }

  /// Give every month an explicit count for every observed label.
  fn normalize(&mut self) {
    let labels: BTreeSet<String> = self
      .0
      .values()
      .flat_map(|counts| counts.keys().cloned())
      .collect();

    for counts in self.0.values_mut() {
      for label in &labels {
        counts.entry(label.clone()).or_insert(0);
      }
    }
  }
}

/// Why a record was left out of the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  /// Record is not a JSON object
  NotAnObject,
  /// No `created_at` field
  MissingCreatedAt,
  /// `created_at` is not a string or not a recognizable timestamp
  InvalidCreatedAt { value: String, cause: String },
  /// No usable `impact` field
  MissingImpact,
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NotAnObject => write!(f, "record is not an object"),
      Self::MissingCreatedAt => write!(f, "missing 'created_at' field"),
      Self::InvalidCreatedAt { value, cause } => {
        write!(f, "invalid 'created_at' value {}: {}", value, cause)
      }
      Self::MissingImpact => write!(f, "missing 'impact' field"),
    }
  }
}

/// Per-record classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
  Included { month: MonthKey, severity: String },
  Skipped(SkipReason),
}

/// Return the severity label of a single record, verbatim.
///
/// Fails with `InvalidRecord` when `impact` is absent or not a string.
pub fn categorize_by_severity(record: &Value) -> Result<String, ProcessError> {
  match record.get("impact") {
    Some(Value::String(label)) => Ok(label.clone()),
    Some(other) => Err(ProcessError::InvalidRecord(format!(
      "'impact' field is not a string: {}",
      other
    ))),
    None => Err(ProcessError::InvalidRecord(
      "'impact' field not found".to_string(),
    )),
  }
}

/// Decide whether a record contributes to the matrix, and where.
pub fn classify_record(record: &Value) -> RecordOutcome {
  if !record.is_object() {
    return RecordOutcome::Skipped(SkipReason::NotAnObject);
  }

  let created_at = match record.get("created_at") {
    None => return RecordOutcome::Skipped(SkipReason::MissingCreatedAt),
    Some(Value::String(raw)) => match parse_timestamp(raw) {
      Ok(dt) => dt,
      Err(e) => {
        return RecordOutcome::Skipped(SkipReason::InvalidCreatedAt {
          value: format!("{:?}", raw),
          cause: e.to_string(),
        })
      }
    },
    Some(other) => {
      return RecordOutcome::Skipped(SkipReason::InvalidCreatedAt {
        value: other.to_string(),
        cause: "not a string".to_string(),
      })
    }
  };

  match categorize_by_severity(record) {
    Ok(severity) => RecordOutcome::Included {
      month: MonthKey::from_datetime(&created_at),
      severity,
    },
    Err(_) => RecordOutcome::Skipped(SkipReason::MissingImpact),
  }
}

/// Turns incident batches into normalized month × severity matrices.
#[derive(Clone)]
pub struct Aggregator {
  sink: Arc<dyn DiagnosticSink>,
}

impl Aggregator {
  pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
    Self { sink }
  }

  /// Count records per month and severity, skipping malformed ones.
  ///
  /// Skips are reported to the diagnostic sink; they never abort the sweep.
  pub fn organize_by_month(&self, records: &[Value]) -> MonthlyMatrix {
    let mut matrix = MonthlyMatrix::default();
    let mut skipped = 0usize;

    for record in records {
      match classify_record(record) {
        RecordOutcome::Included { month, severity } => matrix.increment(month, severity),
        RecordOutcome::Skipped(reason) => {
          skipped += 1;
          self.sink.record_skip(&record_id(record), &reason);
        }
      }
    }

    matrix.normalize();

    tracing::info!(
      months = matrix.0.len(),
      included = matrix.total(),
      skipped,
      "organized incidents by month"
    );

    matrix
  }

  /// Validate the payload shape and aggregate its `incidents` collection.
  pub fn process_incidents(&self, payload: &Value) -> Result<MonthlyMatrix, ProcessError> {
    let incidents = payload.get("incidents").ok_or_else(|| {
      ProcessError::InvalidPayload("'incidents' key not found in raw data".to_string())
    })?;

    let records = incidents.as_array().ok_or_else(|| {
      ProcessError::InvalidPayload("'incidents' is not a list".to_string())
    })?;

    tracing::info!(count = records.len(), "processing incidents");
    Ok(self.organize_by_month(records))
  }
}

/// Identifier used in diagnostics; not required to be unique.
fn record_id(record: &Value) -> String {
  match record.get("id") {
    Some(Value::String(id)) => id.clone(),
    Some(Value::Null) | None => "unknown".to_string(),
    Some(other) => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::testing::CollectingSink;
  use serde_json::json;

  fn aggregator() -> (Aggregator, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::default());
    (Aggregator::new(sink.clone()), sink)
  }

  fn month(year: i32, month: u32) -> MonthKey {
    MonthKey::new(year, month).unwrap()
  }

  #[test]
  fn test_categorize_returns_label_verbatim() {
    assert_eq!(
      categorize_by_severity(&json!({"impact": "major"})).unwrap(),
      "major"
    );
    assert_eq!(
      categorize_by_severity(&json!({"impact": "Major Outage"})).unwrap(),
      "Major Outage"
    );
  }

  #[test]
  fn test_categorize_without_impact_is_invalid_record() {
    assert!(matches!(
      categorize_by_severity(&json!({"id": "x"})),
      Err(ProcessError::InvalidRecord(_))
    ));
    assert!(matches!(
      categorize_by_severity(&json!({"id": "x", "impact": null})),
      Err(ProcessError::InvalidRecord(_))
    ));
    assert!(matches!(
      categorize_by_severity(&json!("major")),
      Err(ProcessError::InvalidRecord(_))
    ));
  }

  #[test]
  fn test_classify_record() {
    assert_eq!(
      classify_record(&json!({"created_at": "2025-01-15T00:00:00Z", "impact": "minor"})),
      RecordOutcome::Included {
        month: month(2025, 1),
        severity: "minor".to_string()
      }
    );
    assert_eq!(
      classify_record(&json!({"impact": "minor"})),
      RecordOutcome::Skipped(SkipReason::MissingCreatedAt)
    );
    assert!(matches!(
      classify_record(&json!({"created_at": "yesterday", "impact": "minor"})),
      RecordOutcome::Skipped(SkipReason::InvalidCreatedAt { .. })
    ));
    assert!(matches!(
      classify_record(&json!({"created_at": null, "impact": "minor"})),
      RecordOutcome::Skipped(SkipReason::InvalidCreatedAt { .. })
    ));
    assert_eq!(
      classify_record(&json!({"created_at": "2025-01-15T00:00:00Z"})),
      RecordOutcome::Skipped(SkipReason::MissingImpact)
    );
    assert_eq!(
      classify_record(&json!(42)),
      RecordOutcome::Skipped(SkipReason::NotAnObject)
    );
  }

  #[test]
  fn test_normalization_fills_missing_labels() {
    let (aggregator, _) = aggregator();
    let matrix = aggregator.organize_by_month(&[
      json!({"created_at": "2025-01-10T00:00:00Z", "impact": "major"}),
      json!({"created_at": "2025-02-10T00:00:00Z", "impact": "minor"}),
    ]);

    assert_eq!(
      serde_json::to_value(&matrix).unwrap(),
      json!({
        "2025-01": {"major": 1, "minor": 0},
        "2025-02": {"major": 0, "minor": 1},
      })
    );
  }

  #[test]
  fn test_every_month_has_the_same_label_set() {
    let (aggregator, _) = aggregator();
    let labels = ["critical", "major", "minor", "none", "maintenance", "custom"];
    let records: Vec<Value> = (0..40usize)
      .map(|i| {
        json!({
          "id": format!("inc-{}", i),
          "created_at": format!("202{}-{:02}-03T10:00:00Z", i % 3, (i % 12) + 1),
          "impact": labels[(i * 7) % labels.len()],
        })
      })
      .collect();

    let matrix = aggregator.organize_by_month(&records);
    let union = matrix.severities();

    assert!(!matrix.is_empty());
    for month in matrix.months() {
      let labels: BTreeSet<&str> = matrix.get(month).unwrap().keys().map(String::as_str).collect();
      assert_eq!(labels, union);
    }
    assert_eq!(matrix.total(), 40);
  }

  #[test]
  fn test_malformed_records_are_skipped() {
    let (aggregator, sink) = aggregator();
    let matrix = aggregator.organize_by_month(&[
      json!({"id": "ok-1", "created_at": "2025-01-15T00:00:00Z", "impact": "major"}),
      json!({"id": "ok-2", "created_at": "2025-03-02T08:00:00Z", "impact": "none"}),
      json!({"id": "no-date", "impact": "minor"}),
      json!({"id": "bad-date", "created_at": "15/01/2025", "impact": "minor"}),
      json!({"id": "no-impact", "created_at": "2025-01-20T00:00:00Z"}),
    ]);

    assert_eq!(matrix.total(), 2);
    assert_eq!(matrix.count(&month(2025, 1), "major"), 1);
    assert_eq!(matrix.count(&month(2025, 3), "none"), 1);
    assert_eq!(matrix.count(&month(2025, 1), "minor"), 0);

    let skips = sink.skips();
    assert_eq!(skips.len(), 3);
    assert_eq!(skips[0], SkipReason::MissingCreatedAt);
    assert!(matches!(skips[1], SkipReason::InvalidCreatedAt { .. }));
    assert_eq!(skips[2], SkipReason::MissingImpact);
  }

  #[test]
  fn test_out_of_range_years_are_skipped() {
    let (aggregator, sink) = aggregator();
    let matrix = aggregator.organize_by_month(&[
      json!({"id": "far", "created_at": "+10000-01-01T00:00:00", "impact": "minor"}),
      json!({"id": "ok", "created_at": "2025-01-01T00:00:00Z", "impact": "minor"}),
      json!({"id": "bce-2", "created_at": "-0002-06-01T00:00:00", "impact": "minor"}),
      json!({"id": "bce-1", "created_at": "-0001-01-01T00:00:00", "impact": "minor"}),
    ]);

    assert_eq!(matrix.total(), 1);
    assert_eq!(sink.skips().len(), 3);
    assert!(sink
      .skips()
      .iter()
      .all(|reason| matches!(reason, SkipReason::InvalidCreatedAt { .. })));

    let chronological: Vec<String> = matrix.months().map(|m| m.to_string()).collect();
    let mut lexical = chronological.clone();
    lexical.sort();
    assert_eq!(chronological, lexical);
    assert_eq!(chronological, vec!["2025-01"]);
  }

  #[test]
  fn test_no_valid_records_yields_empty_matrix() {
    let (aggregator, _) = aggregator();
    let matrix = aggregator.organize_by_month(&[json!({"id": "x"}), json!({"impact": "minor"})]);
    assert!(matrix.is_empty());
    assert_eq!(aggregator.organize_by_month(&[]), MonthlyMatrix::default());
  }

  #[test]
  fn test_input_order_does_not_change_counts() {
    let (aggregator, _) = aggregator();
    let mut records = vec![
      json!({"created_at": "2025-01-15T00:00:00Z", "impact": "major"}),
      json!({"created_at": "2025-01-16T00:00:00Z", "impact": "major"}),
      json!({"created_at": "2024-12-31T23:59:59Z", "impact": "minor"}),
      json!({"created_at": "2025-02-01T00:00:00Z", "impact": "critical"}),
    ];
    let forward = aggregator.organize_by_month(&records);
    records.reverse();
    let backward = aggregator.organize_by_month(&records);

    assert_eq!(forward, backward);
    assert_eq!(forward.count(&month(2025, 1), "major"), 2);
    assert_eq!(forward.month_total(&month(2024, 12)), 1);
  }

  #[test]
  fn test_process_incidents_end_to_end() {
    let (aggregator, _) = aggregator();
    let payload = json!({"incidents": [
      {"created_at": "2025-01-15T00:00:00Z", "impact": "major"},
      {"created_at": "2025-01-20T00:00:00Z", "impact": "minor"},
      {"created_at": "2025-02-05T00:00:00Z", "impact": "minor"},
      {"created_at": "2025-02-10T00:00:00Z", "impact": "none"},
    ]});

    let matrix = aggregator.process_incidents(&payload).unwrap();

    assert_eq!(
      serde_json::to_value(&matrix).unwrap(),
      json!({
        "2025-01": {"major": 1, "minor": 1, "none": 0},
        "2025-02": {"major": 0, "minor": 1, "none": 1},
      })
    );
  }

  #[test]
  fn test_process_incidents_requires_incidents_list() {
    let (aggregator, _) = aggregator();
    assert!(matches!(
      aggregator.process_incidents(&json!({"page": {}})),
      Err(ProcessError::InvalidPayload(_))
    ));
    assert!(matches!(
      aggregator.process_incidents(&json!({"incidents": {"a": 1}})),
      Err(ProcessError::InvalidPayload(_))
    ));
    assert!(matches!(
      aggregator.process_incidents(&json!([])),
      Err(ProcessError::InvalidPayload(_))
    ));
  }

  #[test]
  fn test_record_id_for_diagnostics() {
    assert_eq!(record_id(&json!({"id": "abc"})), "abc");
    assert_eq!(record_id(&json!({"id": 7})), "7");
    assert_eq!(record_id(&json!({})), "unknown");
  }
}
