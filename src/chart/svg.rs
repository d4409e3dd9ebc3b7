//! SVG rendering of the stacked bar chart.

use std::path::Path;

use super::{display_label, ChartData, ChartError};

const LEFT_MARGIN: f64 = 80.0;
const RIGHT_MARGIN: f64 = 170.0;
const TOP_MARGIN: f64 = 70.0;
const BOTTOM_MARGIN: f64 = 110.0;
/// Segments below this share of the tallest stack get no count label.
const LABEL_THRESHOLD: f64 = 0.1;

/// Output geometry and title.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
  pub width: u32,
  pub height: u32,
  pub title: String,
}

impl Default for ChartOptions {
  fn default() -> Self {
    Self {
      width: 1200,
      height: 800,
      title: "GitHub Incidents by Severity Over Time".to_string(),
    }
  }
}

/// Render the chart as a standalone SVG document.
pub fn render_svg(data: &ChartData, options: &ChartOptions) -> String {
  let width = f64::from(options.width.max(400));
  let height = f64::from(options.height.max(300));
  let plot_width = width - LEFT_MARGIN - RIGHT_MARGIN;
  let plot_height = height - TOP_MARGIN - BOTTOM_MARGIN;
  let baseline = TOP_MARGIN + plot_height;

  let max_total = data.max_total();
  let (step, axis_max) = axis_scale(max_total);
  let scale = plot_height / axis_max as f64;

  let slot = plot_width / data.months.len().max(1) as f64;
  let bar_width = slot * 0.8;

  let mut svg = String::new();
  svg.push_str(&format!(
    "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\">",
    w = width,
    h = height
  ));
  svg.push_str(&format!(
    "<rect width=\"{}\" height=\"{}\" fill=\"#FFFFFF\"/>",
    width, height
  ));
  svg.push_str(&format!(
    "<text x=\"{:.1}\" y=\"40\" text-anchor=\"middle\" font-size=\"20\" font-weight=\"bold\">{}</text>",
    LEFT_MARGIN + plot_width / 2.0,
    xml_escape(&options.title)
  ));

  // Horizontal gridlines with tick values
  let mut tick = 0;
  while tick <= axis_max {
    let y = baseline - tick as f64 * scale;
    svg.push_str(&format!(
      "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#CCCCCC\" stroke-dasharray=\"4 4\"/>",
      LEFT_MARGIN,
      LEFT_MARGIN + plot_width,
      y = y
    ));
    svg.push_str(&format!(
      "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"11\">{}</text>",
      LEFT_MARGIN - 8.0,
      y + 4.0,
      tick
    ));
    tick += step;
  }

  let label_threshold = max_total as f64 * LABEL_THRESHOLD;

  for (col, month) in data.months.iter().enumerate() {
    let x = LEFT_MARGIN + col as f64 * slot + (slot - bar_width) / 2.0;
    let mut bottom = 0u64;

    for series in &data.series {
      let count = series.counts[col];
      if count == 0 {
        continue;
      }
      let y = baseline - (bottom + count) as f64 * scale;
      let segment_height = count as f64 * scale;
      svg.push_str(&format!(
        "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\" fill-opacity=\"0.9\" stroke=\"#FFFFFF\" stroke-width=\"0.5\"><title>{} {}: {}</title></rect>",
        x,
        y,
        bar_width,
        segment_height,
        series.color.hex(),
        month,
        xml_escape(&series.label),
        count
      ));

      if count as f64 >= label_threshold {
        svg.push_str(&format!(
          "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-size=\"11\" font-weight=\"bold\" fill=\"#FFFFFF\">{}</text>",
          x + bar_width / 2.0,
          y + segment_height / 2.0,
          count
        ));
      }
      bottom += count;
    }

    let label_x = x + bar_width / 2.0;
    let label_y = baseline + 16.0;
    svg.push_str(&format!(
      "<text x=\"{lx:.1}\" y=\"{ly:.1}\" text-anchor=\"end\" font-size=\"11\" transform=\"rotate(-45 {lx:.1} {ly:.1})\">{}</text>",
      month.label(),
      lx = label_x,
      ly = label_y
    ));
  }

  // Axes
  svg.push_str(&format!(
    "<line x1=\"{l:.1}\" y1=\"{t:.1}\" x2=\"{l:.1}\" y2=\"{b:.1}\" stroke=\"#333333\"/>",
    l = LEFT_MARGIN,
    t = TOP_MARGIN,
    b = baseline
  ));
  svg.push_str(&format!(
    "<line x1=\"{:.1}\" y1=\"{b:.1}\" x2=\"{:.1}\" y2=\"{b:.1}\" stroke=\"#333333\"/>",
    LEFT_MARGIN,
    LEFT_MARGIN + plot_width,
    b = baseline
  ));
  svg.push_str(&format!(
    "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"13\" font-weight=\"bold\">Month</text>",
    LEFT_MARGIN + plot_width / 2.0,
    height - 20.0
  ));
  svg.push_str(&format!(
    "<text x=\"20\" y=\"{y:.1}\" text-anchor=\"middle\" font-size=\"13\" font-weight=\"bold\" transform=\"rotate(-90 20 {y:.1})\">Number of Incidents</text>",
    y = TOP_MARGIN + plot_height / 2.0
  ));

  // Legend, top layer first so it reads like the stack
  let legend_x = LEFT_MARGIN + plot_width + 24.0;
  svg.push_str(&format!(
    "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"13\" font-weight=\"bold\">Severity</text>",
    legend_x, TOP_MARGIN
  ));
  for (i, series) in data.series.iter().rev().enumerate() {
    let y = TOP_MARGIN + 14.0 + i as f64 * 22.0;
    svg.push_str(&format!(
      "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"14\" height=\"14\" fill=\"{}\"/>",
      legend_x,
      y,
      series.color.hex()
    ));
    svg.push_str(&format!(
      "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\">{}</text>",
      legend_x + 20.0,
      y + 11.0,
      xml_escape(&display_label(&series.label))
    ));
  }

  svg.push_str(&format!(
    "<text x=\"10\" y=\"{:.1}\" font-size=\"10\" font-style=\"italic\">Total incidents: {}</text>",
    height - 8.0,
    data.total()
  ));

  svg.push_str("</svg>");
  svg
}

/// Render the chart and write it to `path`, creating parent directories.
pub fn save_svg(data: &ChartData, options: &ChartOptions, path: &Path) -> Result<(), ChartError> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).map_err(|source| ChartError::Io {
      path: parent.to_path_buf(),
      source,
    })?;
  }

  std::fs::write(path, render_svg(data, options)).map_err(|source| ChartError::Io {
    path: path.to_path_buf(),
    source,
  })?;

  tracing::info!(path = %path.display(), months = data.months.len(), "visualization saved");
  Ok(())
}

/// Pick a tick step from 1-2-5 multiples giving at most eight intervals.
fn axis_scale(max_total: u64) -> (u64, u64) {
  let max_total = max_total.max(1);
  let mut magnitude = 1u64;
  loop {
    for factor in [1, 2, 5] {
      let step = factor * magnitude;
      if max_total.div_ceil(step) <= 8 {
        return (step, max_total.div_ceil(step) * step);
      }
    }
    magnitude = magnitude.saturating_mul(10);
  }
}

fn xml_escape(input: &str) -> String {
  input
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}
