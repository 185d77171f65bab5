use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::api::error::ApiError;
use crate::config::EventConfig;
use crate::event::Event;

/// Request body for the register-events endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEventsRequest {
    pub events: Vec<Event>,
    pub sdk_version: String,
}

/// Response from the register-events endpoint.
///
/// Events absent from the error map were accepted by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEventsResponse {
    #[serde(default)]
    pub errors: HashMap<String, RegisterEventsError>,
}

/// Per-event rejection reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEventsError {
    /// Whether the event should stay queued for a later send.
    pub retriable: bool,
    #[serde(default)]
    pub message: String,
}

/// Batched event delivery to the backend.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Send a batch of events and return the per-event error map.
    async fn register_events(
        &self,
        events: Vec<Event>,
    ) -> Result<RegisterEventsResponse, ApiError>;
}

/// [`ApiClient`] over HTTP using reqwest.
pub struct HttpApiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    sdk_version: String,
    timeout: Duration,
}

impl HttpApiClient {
    pub fn new(config: &EventConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.api_endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            sdk_version: config.sdk_version.clone(),
            timeout: config.request_timeout,
        })
    }

    fn convert_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout {
                timeout: self.timeout,
            }
        } else if error.is_connect() {
            ApiError::Network {
                message: format!("Connection failed: {error}"),
            }
        } else {
            ApiError::Network {
                message: error.to_string(),
            }
        }
    }
}

/// Map an HTTP error status to the matching [`ApiError`] class.
pub(crate) fn status_to_error(status: u16, body: &str) -> ApiError {
    let message = format!("{}: {}", status, body);
    match status {
        300..=399 => ApiError::RedirectRequest { status, message },
        400 => ApiError::BadRequest { message },
        401 => ApiError::Unauthorized { message },
        403 => ApiError::Forbidden { message },
        404 => ApiError::NotFound { message },
        413 => ApiError::PayloadTooLarge { message },
        499 => ApiError::ClientClosedRequest { message },
        503 => ApiError::Unavailable { message },
        500..=599 => ApiError::InternalServer { message },
        _ => ApiError::Unknown {
            status: Some(status),
            message,
        },
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn register_events(
        &self,
        events: Vec<Event>,
    ) -> Result<RegisterEventsResponse, ApiError> {
        let url = format!("{}/register_events", self.endpoint);
        let request = RegisterEventsRequest {
            events,
            sdk_version: self.sdk_version.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.api_key)
            .header("User-Agent", format!("Flagwire-Rust/{}", self.sdk_version))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.convert_error(e))?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await.map_err(|e| ApiError::InvalidResponse {
                message: format!("Failed to read response: {e}"),
            })?;

            serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_to_error(status.as_u16(), &body))
        }
    }
}
