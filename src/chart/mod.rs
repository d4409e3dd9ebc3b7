//! Stacked bar chart of incidents per month and severity.
//!
//! `ChartData` turns a normalized matrix into plot-ready series with a
//! deterministic severity ordering and color assignment. The `svg` and
//! `preview` modules draw it.

pub mod preview;
pub mod svg;

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;

use crate::aggregate::{MonthKey, MonthlyMatrix};

/// Severity labels in stacking order, bottom first.
pub const SEVERITY_PRIORITY: [&str; 5] = ["critical", "major", "minor", "maintenance", "none"];

#[derive(Debug, Error)]
pub enum ChartError {
  #[error("cannot generate visualization: no data provided")]
  Empty,
  #[error("failed to write chart to {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

impl Rgb {
  pub const fn new(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b }
  }

  pub fn hex(&self) -> String {
    format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
  }

  fn from_hsv(h: f64, s: f64, v: f64) -> Self {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match (i as i64).rem_euclid(6) {
      0 => (v, t, p),
      1 => (q, v, p),
      2 => (p, v, t),
      3 => (p, q, v),
      4 => (t, p, v),
      _ => (v, p, q),
    };
    let channel = |x: f64| (x * 255.0).round().clamp(0.0, 255.0) as u8;
    Self::new(channel(r), channel(g), channel(b))
  }
}

/// Color for a severity label.
///
/// Known labels use a fixed palette; any other label gets a color derived
/// from a hash of its name, so it is stable across runs.
pub fn severity_color(severity: &str) -> Rgb {
  match severity {
    "critical" => Rgb::new(0x9D, 0x02, 0x08),
    "major" => Rgb::new(0xE6, 0x39, 0x46),
    "minor" => Rgb::new(0xFF, 0xB7, 0x03),
    "maintenance" => Rgb::new(0x45, 0x7B, 0x9D),
    "none" => Rgb::new(0x2A, 0x9D, 0x8F),
    other => {
      let digest = Sha256::digest(other.as_bytes());
      let word = |i: usize| u16::from_be_bytes([digest[i], digest[i + 1]]) as f64;
      let hue = (word(0) % 1000.0) / 1000.0;
      let saturation = 0.7 + (word(2) % 300.0) / 1000.0;
      let value = 0.8 + (word(4) % 200.0) / 1000.0;
      Rgb::from_hsv(hue, saturation, value)
    }
  }
}

/// Order labels by priority, then unknown labels lexically.
pub fn order_severities<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
  let mut labels: Vec<&str> = labels.into_iter().collect();
  labels.sort_by_key(|label| {
    let rank = SEVERITY_PRIORITY
      .iter()
      .position(|p| p == label)
      .unwrap_or(SEVERITY_PRIORITY.len());
    (rank, *label)
  });
  labels.dedup();
  labels.into_iter().map(String::from).collect()
}

/// Capitalize the first character and lowercase the rest.
pub fn display_label(severity: &str) -> String {
  let mut chars = severity.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    None => String::new(),
  }
}

/// One stacked layer of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
  pub label: String,
  pub color: Rgb,
  /// Count per month, aligned with `ChartData::months`
  pub counts: Vec<u64>,
}

/// Plot-ready view of a normalized matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
  pub months: Vec<MonthKey>,
  /// Bottom layer first
  pub series: Vec<Series>,
  /// Stack height per month
  pub totals: Vec<u64>,
}

impl ChartData {
  pub fn from_matrix(matrix: &MonthlyMatrix) -> Result<Self, ChartError> {
    if matrix.is_empty() {
      return Err(ChartError::Empty);
    }

    let months: Vec<MonthKey> = matrix.months().copied().collect();
    let series = order_severities(matrix.severities())
      .into_iter()
      .map(|label| Series {
        color: severity_color(&label),
        counts: months.iter().map(|m| matrix.count(m, &label)).collect(),
        label,
      })
      .collect();
    let totals = months.iter().map(|m| matrix.month_total(m)).collect();

    Ok(Self {
      months,
      series,
      totals,
    })
  }

  pub fn max_total(&self) -> u64 {
    self.totals.iter().copied().max().unwrap_or(0)
  }

  pub fn total(&self) -> u64 {
    self.totals.iter().sum()
  }
}
