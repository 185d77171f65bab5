use std::time::Duration;

use crate::error::{ErrorCode, FlagwireError, Result};

pub const DEFAULT_MAX_BATCH_QUEUE_COUNT: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// SDK version reported on every event.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for event creation and delivery.
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Base URL of the event ingestion API.
    pub api_endpoint: String,
    /// API key sent in the `Authorization` header.
    pub api_key: String,
    /// Feature tag stamped on evaluation/goal events and metrics labels.
    pub tag: String,
    /// Number of queued events required before an unforced send proceeds;
    /// also the maximum batch size per send.
    pub max_batch_queue_count: usize,
    /// Interval between automatic flushes by the scheduler.
    pub flush_interval: Duration,
    /// Per-request timeout for the HTTP client.
    pub request_timeout: Duration,
    /// SDK version reported on events.
    pub sdk_version: String,
}

impl EventConfig {
    pub fn new(
        api_endpoint: impl Into<String>,
        api_key: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            api_key: api_key.into(),
            tag: tag.into(),
            max_batch_queue_count: DEFAULT_MAX_BATCH_QUEUE_COUNT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sdk_version: SDK_VERSION.to_string(),
        }
    }

    pub fn builder(
        api_endpoint: impl Into<String>,
        api_key: impl Into<String>,
        tag: impl Into<String>,
    ) -> EventConfigBuilder {
        EventConfigBuilder::new(api_endpoint, api_key, tag)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(FlagwireError::config_error(
                ErrorCode::ConfigInvalidApiKey,
                "API key is required",
            ));
        }

        if !self.api_endpoint.starts_with("http://") && !self.api_endpoint.starts_with("https://") {
            return Err(FlagwireError::config_error(
                ErrorCode::ConfigInvalidEndpoint,
                format!("API endpoint must be http(s): {}", self.api_endpoint),
            ));
        }

        if self.max_batch_queue_count == 0 {
            return Err(FlagwireError::config_error(
                ErrorCode::ConfigInvalidBatchSize,
                "Batch queue count must be positive",
            ));
        }

        if self.flush_interval.is_zero() {
            return Err(FlagwireError::config_error(
                ErrorCode::ConfigInvalidInterval,
                "Flush interval must be positive",
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(FlagwireError::config_error(
                ErrorCode::ConfigInvalidInterval,
                "Request timeout must be positive",
            ));
        }

        Ok(())
    }
}

/// Builder for [`EventConfig`].
#[derive(Debug)]
pub struct EventConfigBuilder {
    api_endpoint: String,
    api_key: String,
    tag: String,
    max_batch_queue_count: usize,
    flush_interval: Duration,
    request_timeout: Duration,
    sdk_version: String,
}

impl EventConfigBuilder {
    pub fn new(
        api_endpoint: impl Into<String>,
        api_key: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            api_key: api_key.into(),
            tag: tag.into(),
            max_batch_queue_count: DEFAULT_MAX_BATCH_QUEUE_COUNT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sdk_version: SDK_VERSION.to_string(),
        }
    }

    pub fn max_batch_queue_count(mut self, count: usize) -> Self {
        self.max_batch_queue_count = count;
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = version.into();
        self
    }

    pub fn build(self) -> Result<EventConfig> {
        let config = EventConfig {
            api_endpoint: self.api_endpoint,
            api_key: self.api_key,
            tag: self.tag,
            max_batch_queue_count: self.max_batch_queue_count,
            flush_interval: self.flush_interval,
            request_timeout: self.request_timeout,
            sdk_version: self.sdk_version,
        };
        config.validate()?;
        Ok(config)
    }
}
