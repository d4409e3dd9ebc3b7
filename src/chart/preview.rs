//! Terminal preview of the chart.

use color_eyre::Result;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use std::io::stdout;

use super::{display_label, ChartData, Rgb};

const BAR_SYMBOL: &str = "█";
const MAX_BAR_WIDTH: u16 = 6;

impl From<Rgb> for Color {
  fn from(rgb: Rgb) -> Self {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
  }
}

/// Stacked bar widget: one column per month, one colored segment per severity.
///
/// When the months do not fit, the most recent ones are shown.
pub struct StackedBarChart<'a> {
  data: &'a ChartData,
}

impl<'a> StackedBarChart<'a> {
  pub fn new(data: &'a ChartData) -> Self {
    Self { data }
  }

  fn legend(&self) -> Line<'a> {
    let mut spans = Vec::new();
    for series in &self.data.series {
      spans.push(Span::styled("■ ", Style::default().fg(series.color.into())));
      spans.push(Span::raw(format!("{}  ", display_label(&series.label))));
    }
    Line::from(spans)
  }
}

impl Widget for StackedBarChart<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    // Bars, month labels, legend
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
      ])
      .split(area);
    let (bars, labels, legend) = (chunks[0], chunks[1], chunks[2]);

    Paragraph::new(self.legend()).render(legend, buf);

    let months = self.data.months.len();
    if months == 0 || bars.width == 0 || bars.height == 0 {
      return;
    }

    let columns = u16::try_from(months).unwrap_or(u16::MAX);
    let bar_width = (bars.width / columns).saturating_sub(1).clamp(1, MAX_BAR_WIDTH);
    let visible = ((bars.width + 1) / (bar_width + 1)).max(1) as usize;
    let first = months.saturating_sub(visible);
    let max_total = self.data.max_total().max(1);
    let rows = u64::from(bars.height);

    for (offset, col) in (first..months).enumerate() {
      let x = bars.x + offset as u16 * (bar_width + 1);

      // Round cumulative heights so segments add up to the stack height
      let mut cumulative = 0u64;
      let mut filled = 0u16;
      for series in &self.data.series {
        cumulative += series.counts[col];
        let top = ((cumulative * rows + max_total / 2) / max_total) as u16;
        let style = Style::default().fg(series.color.into());
        for row in filled..top {
          let y = bars.bottom() - 1 - row;
          for dx in 0..bar_width {
            buf[(x + dx, y)].set_symbol(BAR_SYMBOL).set_style(style);
          }
        }
        filled = filled.max(top);
      }

      let label = self.data.months[col].label();
      let short: String = label.chars().take(bar_width as usize).collect();
      buf.set_string(x, labels.y, short, Style::default().fg(Color::DarkGray));
    }
  }
}

/// Show the chart in the alternate screen until a key is pressed.
pub fn show(data: &ChartData, title: &str) -> Result<()> {
  enable_raw_mode()?;
  stdout().execute(EnterAlternateScreen)?;
  let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

  let result = (|| -> Result<()> {
    loop {
      terminal.draw(|frame| {
        let block = Block::default()
          .title(format!(" {} ", title))
          .title_bottom(Line::from(" any key: close ").right_aligned())
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Blue));
        let inner = block.inner(frame.area());
        frame.render_widget(block, frame.area());
        frame.render_widget(StackedBarChart::new(data), inner);
      })?;

      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => return Ok(()),
        _ => {}
      }
    }
  })();

  // Cleanup terminal
  disable_raw_mode()?;
  stdout().execute(LeaveAlternateScreen)?;

  result
}
