use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use super::FetchError;

/// Default bound on a single network fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch-a-URL capability: returns the response body or a transport failure.
pub trait Transport: Send + Sync {
  fn get(
    &self,
    url: &str,
    timeout: Duration,
  ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| FetchError::Request(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  async fn get(&self, target: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
    let url = url::Url::parse(target)
      .map_err(|e| FetchError::Request(format!("Invalid feed URL {}: {}", target, e)))?;

    let response = self
      .client
      .get(url.clone())
      .timeout(timeout)
      .send()
      .await
      .map_err(|e| FetchError::Request(format!("Failed to fetch {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Request(format!(
        "Failed to fetch {}: HTTP {}",
        url, status
      )));
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::Request(format!("Failed to read response from {}: {}", url, e)))?;

    Ok(body.to_vec())
  }
}

/// Incident feed client: network fetch, JSON parse and shape check.
#[derive(Clone)]
pub struct FeedClient<T: Transport> {
  transport: T,
  timeout: Duration,
}

impl<T: Transport> FeedClient<T> {
  pub fn new(transport: T) -> Self {
    Self {
      transport,
      timeout: DEFAULT_TIMEOUT,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Fetch the feed at `url` and return the validated payload.
  pub async fn fetch_incidents(&self, url: &str) -> Result<Value, FetchError> {
    tracing::info!(url, "fetching incidents");

    let body = self.transport.get(url, self.timeout).await.map_err(|e| {
      tracing::error!(error = %e, "incident feed request failed");
      e
    })?;

    let data = parse_payload(&body).map_err(|e| {
      tracing::error!(error = %e, "incident feed response rejected");
      e
    })?;

    let count = data["incidents"].as_array().map(Vec::len).unwrap_or(0);
    tracing::info!(count, "successfully fetched incidents");

    Ok(data)
  }
}

/// Parse a response body and check it carries an `incidents` collection.
pub fn parse_payload(body: &[u8]) -> Result<Value, FetchError> {
  let data: Value = serde_json::from_slice(body)
    .map_err(|e| FetchError::Parse(format!("Failed to parse API response as JSON: {}", e)))?;

  if data.get("incidents").is_none() {
    return Err(FetchError::Parse(
      "Unexpected API response format: 'incidents' key not found".to_string(),
    ));
  }

  Ok(data)
}
