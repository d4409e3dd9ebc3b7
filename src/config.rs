use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_FEED_URL: &str = "https://www.githubstatus.com/api/v2/incidents.json";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
  pub feed: FeedConfig,
  pub cache: CacheConfig,
  pub chart: ChartConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
  pub url: String,
  /// Bound on a single network fetch, in seconds
  pub timeout_secs: u64,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_FEED_URL.to_string(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// One JSON file per feed URL
  #[default]
  File,
  /// A single SQLite database in the cache directory
  Sqlite,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  pub dir: PathBuf,
  /// Maximum age of a cache entry, in seconds
  pub ttl_secs: u64,
  pub backend: CacheBackend,
  /// Deprecated single-file cache
  pub legacy_file: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      dir: PathBuf::from(".cache"),
      ttl_secs: 3600,
      backend: CacheBackend::File,
      legacy_file: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
  pub output: PathBuf,
  pub width: u32,
  pub height: u32,
  pub title: String,
}

impl Default for ChartConfig {
  fn default() -> Self {
    Self {
      output: PathBuf::from("github_incidents_visualization.svg"),
      width: 1200,
      height: 800,
      title: "GitHub Incidents by Severity Over Time".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
  pub level: String,
  /// Directory for a per-run log file, in addition to stdout
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./incistat.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/incistat/config.yaml
  ///
  /// Without a file the built-in defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("incistat.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("incistat").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty document deserializes to null, not an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }
}
