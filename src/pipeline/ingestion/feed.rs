use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::config::FeedConfig;
use crate::error::{PipelineError, Result};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Anything that can hand the pipeline one batch of raw disruption records.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_disruptions(&self) -> Result<Vec<Value>>;
}

/// Client for the NS travel information API.
pub struct NsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl NsApiClient {
    pub fn new(config: &FeedConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries: config.max_retries.max(1),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/disruptions", self.base_url)
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Value, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await?
            .error_for_status()?;
        response.json::<Value>().await
    }
}

#[async_trait]
impl FeedSource for NsApiClient {
    fn name(&self) -> &str {
        "ns_api"
    }

    #[instrument(skip(self))]
    async fn fetch_disruptions(&self) -> Result<Vec<Value>> {
        let url = self.endpoint();

        for attempt in 1..=self.max_retries {
            debug!("Fetching {} (attempt {}/{})", url, attempt, self.max_retries);
            match self.fetch_once(&url).await {
                Ok(body) => {
                    let batch = batch_from_body(body)?;
                    info!("Fetched {} disruptions from NS API", batch.len());
                    return Ok(batch);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt < self.max_retries {
                        let wait = backoff_delay(attempt);
                        warn!(
                            error = %e,
                            "Feed request failed, retrying in {}s",
                            wait.as_secs()
                        );
                        tokio::time::sleep(wait).await;
                    } else {
                        error!(error = %e, "Feed request failed, retries exhausted");
                        return Err(PipelineError::Feed {
                            message: format!("gave up after {} attempts: {}", attempt, e),
                        });
                    }
                }
                Err(e) => {
                    match e.status() {
                        Some(StatusCode::UNAUTHORIZED) => {
                            error!("NS API rejected the subscription key, check NS_API_KEY")
                        }
                        Some(StatusCode::TOO_MANY_REQUESTS) => {
                            error!("NS API rate limit hit, try again later")
                        }
                        _ => error!(error = %e, "NS API request failed"),
                    }
                    return Err(PipelineError::Feed {
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(PipelineError::Feed {
            message: "no fetch attempts were made".to_string(),
        })
    }
}

/// Reads a batch from a JSON file on disk, e.g. a mirrored payload.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    fn name(&self) -> &str {
        "file"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_disruptions(&self) -> Result<Vec<Value>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PipelineError::Feed {
                message: format!("failed to read {}: {}", self.path.display(), e),
            }
        })?;
        let body: Value = serde_json::from_str(&content)?;
        let batch = batch_from_body(body)?;
        info!("Read {} disruptions from file", batch.len());
        Ok(batch)
    }
}

/// Unwrap a feed response: either a bare array of records or an object
/// carrying the array under `payload`.
pub fn batch_from_body(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("payload") {
            Some(Value::Array(records)) => Ok(records),
            Some(_) => Err(PipelineError::MalformedBatch(
                "'payload' is not a list of records".to_string(),
            )),
            None => Err(PipelineError::MalformedBatch(
                "response object has no 'payload' list".to_string(),
            )),
        },
        other => Err(PipelineError::MalformedBatch(format!(
            "expected a list of records, got {}",
            other
        ))),
    }
}

/// 2s, 4s, 8s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array_body() {
        let batch = batch_from_body(json!([{"id": "a"}, {"id": "b"}])).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_payload_wrapped_body() {
        let batch = batch_from_body(json!({"payload": [{"id": "a"}], "meta": {}})).unwrap();
        assert_eq!(batch, vec![json!({"id": "a"})]);
    }

    #[test]
    fn test_other_shapes_are_malformed() {
        for body in [json!("nope"), json!({"items": []}), json!({"payload": {"id": "a"}}), json!(null)] {
            assert!(matches!(
                batch_from_body(body),
                Err(PipelineError::MalformedBatch(_))
            ));
        }
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = FeedConfig {
            base_url: "https://example.test/api/v3/".to_string(),
            ..FeedConfig::default()
        };
        let client = NsApiClient::new(&config, "key").unwrap();
        assert_eq!(client.endpoint(), "https://example.test/api/v3/disruptions");
    }

    #[tokio::test]
    async fn test_file_feed_reads_wrapped_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, r#"{"payload": [{"id": "x", "type": "storing"}]}"#).unwrap();

        let batch = FileFeed::new(&path).fetch_disruptions().await.unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0]["id"], "x");
    }

    #[tokio::test]
    async fn test_file_feed_missing_file_is_feed_error() {
        let feed = FileFeed::new("/nonexistent/batch.json");
        assert!(matches!(
            feed.fetch_disruptions().await,
            Err(PipelineError::Feed { .. })
        ));
    }
}
