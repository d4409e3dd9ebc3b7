mod aggregate;
mod app;
mod cache;
mod chart;
mod config;
mod diagnostics;
mod feed;
mod logging;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use config::{CacheBackend, Config};

#[derive(Parser, Debug)]
#[command(name = "incistat")]
#[command(about = "Chart public status-page incidents by month and severity")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./incistat.yaml or $XDG_CONFIG_HOME/incistat/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Incident feed URL
  #[arg(long)]
  api_url: Option<String>,

  /// Output path for the SVG chart
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Log level: trace, debug, info, warn or error
  #[arg(long)]
  log_level: Option<String>,

  /// Also write logs to a timestamped file in this directory
  #[arg(long)]
  log_dir: Option<PathBuf>,

  /// Directory holding cached feed payloads
  #[arg(long)]
  cache_dir: Option<PathBuf>,

  /// Cache time-to-live in seconds
  #[arg(long)]
  cache_ttl: Option<u64>,

  /// Cache storage backend
  #[arg(long, value_enum)]
  cache_backend: Option<CacheBackend>,

  /// Always fetch from the network and leave the cache untouched
  #[arg(long)]
  no_cache: bool,

  /// Deprecated: single raw JSON cache file, use --cache-dir instead
  #[arg(long)]
  cache_file: Option<PathBuf>,

  /// Chart width in pixels
  #[arg(long)]
  width: Option<u32>,

  /// Chart height in pixels
  #[arg(long)]
  height: Option<u32>,

  /// Show the chart in the terminal after writing it
  #[arg(long)]
  preview: bool,
}

impl Args {
  /// Apply command-line overrides on top of the loaded configuration.
  fn apply(&self, mut config: Config) -> Config {
    if let Some(url) = &self.api_url {
      config.feed.url = url.clone();
    }
    if let Some(output) = &self.output {
      config.chart.output = output.clone();
    }
    if let Some(level) = &self.log_level {
      config.log.level = level.clone();
    }
    if let Some(dir) = &self.log_dir {
      config.log.dir = Some(dir.clone());
    }
    if let Some(dir) = &self.cache_dir {
      config.cache.dir = dir.clone();
    }
    if let Some(ttl) = self.cache_ttl {
      config.cache.ttl_secs = ttl;
    }
    if let Some(backend) = self.cache_backend {
      config.cache.backend = backend;
    }
    if self.no_cache {
      config.cache.enabled = false;
    }
    if let Some(file) = &self.cache_file {
      config.cache.legacy_file = Some(file.clone());
    }
    if let Some(width) = self.width {
      config.chart.width = width;
    }
    if let Some(height) = self.height {
      config.chart.height = height;
    }
    config
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = args.apply(config::Config::load(args.config.as_deref())?);

  let _log_guard = logging::init(&config.log.level, config.log.dir.as_deref())?;

  // Initialize and run the app
  let result = match app::App::new(config, args.preview) {
    Ok(app) => app.run().await,
    Err(e) => Err(e),
  };

  if let Err(e) = &result {
    tracing::error!(error = %e, "error generating visualization");
  }
  result
}
