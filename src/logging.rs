use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Parse a level name, case-insensitively.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
  match level.to_ascii_lowercase().as_str() {
    "trace" => Ok(LevelFilter::TRACE),
    "debug" => Ok(LevelFilter::DEBUG),
    "info" => Ok(LevelFilter::INFO),
    "warn" | "warning" => Ok(LevelFilter::WARN),
    "error" => Ok(LevelFilter::ERROR),
    other => Err(eyre!(
      "Invalid log level '{}': expected one of trace, debug, info, warn, error",
      other
    )),
  }
}

/// Log file name for a run started at `started`.
pub fn log_file_name(started: chrono::DateTime<chrono::Local>) -> String {
  format!("incistat_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level` when set. With `log_dir`, events also go to a
/// per-run file in that directory; the returned guard flushes it on drop and
/// must be held until exit.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let default_level = parse_level(level)?;
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::never(dir, log_file_name(chrono::Local::now()));
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer().with_writer(writer).with_ansi(false);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer())
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
