use crate::aggregate::Aggregator;
use crate::cache::{CacheLayer, CacheSource, CacheStorage, FileStorage, SqliteStorage};
use crate::chart::svg::{save_svg, ChartOptions};
use crate::chart::{preview, ChartData};
use crate::config::{CacheBackend, CacheConfig, Config};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::feed::{legacy, CachedFeedClient, FeedClient, HttpTransport, Transport};
use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One run of the pipeline: fetch, aggregate, render.
pub struct App<T: Transport = HttpTransport> {
  config: Config,
  client: CachedFeedClient<T, Box<dyn CacheStorage>>,
  aggregator: Aggregator,
  preview: bool,
}

impl App<HttpTransport> {
  pub fn new(config: Config, preview: bool) -> Result<Self> {
    let transport = HttpTransport::new()?;
    Ok(Self::with_transport(config, transport, preview))
  }
}

impl<T: Transport> App<T> {
  pub fn with_transport(config: Config, transport: T, preview: bool) -> Self {
    let sink: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);

    let feed = FeedClient::new(transport).with_timeout(Duration::from_secs(config.feed.timeout_secs));
    let cache = CacheLayer::new(open_storage(&config.cache), Arc::clone(&sink));

    Self {
      client: CachedFeedClient::new(feed, cache),
      aggregator: Aggregator::new(sink),
      config,
      preview,
    }
  }

  pub async fn run(&self) -> Result<()> {
    tracing::info!(url = %self.config.feed.url, "starting incident visualization");

    let payload = self.load_payload().await?;
    let matrix = self.aggregator.process_incidents(&payload)?;
    let data = ChartData::from_matrix(&matrix)?;

    let chart = &self.config.chart;
    let options = ChartOptions {
      width: chart.width,
      height: chart.height,
      title: chart.title.clone(),
    };
    save_svg(&data, &options, &chart.output)?;

    if self.preview {
      preview::show(&data, &chart.title)?;
    }

    tracing::info!(output = %chart.output.display(), "done");
    Ok(())
  }

  async fn load_payload(&self) -> Result<Value> {
    let cache = &self.config.cache;

    let legacy_file = match &cache.legacy_file {
      Some(path) => {
        tracing::warn!("--cache-file is deprecated, use --cache-dir and --cache-ttl instead");
        cache.enabled.then_some(path)
      }
      None => None,
    };

    if let Some(path) = legacy_file {
      if let Some(data) = legacy::load(path) {
        return Ok(data);
      }
    }

    let ttl = chrono::Duration::try_seconds(i64::try_from(cache.ttl_secs).unwrap_or(i64::MAX))
      .unwrap_or(chrono::Duration::MAX);
    let result = self
      .client
      .fetch(&self.config.feed.url, cache.enabled, ttl)
      .await?;

    match (result.source, result.cached_at) {
      (CacheSource::Cache, Some(cached_at)) => tracing::info!(
        source = "cache",
        cached_at = %cached_at.to_rfc3339(),
        "incident data loaded"
      ),
      _ => tracing::info!(source = "network", "incident data loaded"),
    }

    if let Some(path) = legacy_file {
      legacy::save(path, &result.data);
    }

    Ok(result.data)
  }
}

/// Build the configured cache backend, falling back to files if SQLite fails.
fn open_storage(cache: &CacheConfig) -> Box<dyn CacheStorage> {
  match cache.backend {
    CacheBackend::File => Box::new(FileStorage::new(&cache.dir)),
    CacheBackend::Sqlite => match SqliteStorage::open(&cache.dir) {
      Ok(storage) => Box::new(storage),
      Err(e) => {
        tracing::warn!(error = %e, "failed to open SQLite cache, using file cache");
        Box::new(FileStorage::new(&cache.dir))
      }
    },
  }
}
