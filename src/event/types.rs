//! Typed analytics events queued and delivered by the SDK.
//!
//! Three event families exist: evaluation events (a flag evaluation served
//! to a user), goal events (a conversion reached by a user), and metrics
//! events (operational telemetry about the SDK itself). Only metrics events
//! carry a unique key and participate in deduplication.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User a flag was evaluated for or a goal was reached by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Free-form attributes attached by the application.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    /// Add a single attribute.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Backend API an operation ran against, recorded on metrics events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiId {
    GetEvaluations,
    RegisterEvents,
}

impl ApiId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiId::GetEvaluations => "GET_EVALUATIONS",
            ApiId::RegisterEvents => "REGISTER_EVENTS",
        }
    }
}

/// Why an evaluation produced the variation it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationReason {
    Target,
    Rule,
    Default,
    /// The SDK fell back to the application-provided default value.
    Client,
    OffVariation,
    Prerequisite,
}

/// Outcome of a single flag evaluation, as passed to the interactor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub feature_id: String,
    pub feature_version: i32,
    pub variation_id: String,
    pub reason: EvaluationReason,
}

/// Record of a flag evaluation result served to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationEvent {
    pub timestamp: i64,
    pub feature_id: String,
    pub feature_version: i32,
    pub variation_id: String,
    pub user: User,
    pub reason: EvaluationReason,
    pub tag: String,
    pub sdk_version: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Record of a conversion goal reached by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalEvent {
    pub timestamp: i64,
    pub goal_id: String,
    pub value: f64,
    pub user: User,
    pub tag: String,
    pub sdk_version: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Telemetry about SDK operational health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEvent {
    pub timestamp: i64,
    pub event: MetricsEventData,
    pub sdk_version: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// The measured value or error class a metrics event describes.
///
/// One variant per HTTP error class plus latency and payload-size
/// measurements. Every variant carries the API it was observed against and
/// a label map; together with the variant tag these define the event's
/// unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MetricsEventData {
    #[serde(rename_all = "camelCase")]
    Latency {
        api_id: ApiId,
        labels: HashMap<String, String>,
        latency_second: f64,
    },
    #[serde(rename_all = "camelCase")]
    Size {
        api_id: ApiId,
        labels: HashMap<String, String>,
        size_byte: i64,
    },
    #[serde(rename_all = "camelCase")]
    TimeoutError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    NetworkError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    BadRequestError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    UnauthorizedError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    ForbiddenError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    NotFoundError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    ClientClosedRequestError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    ServiceUnavailableError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    InternalServerError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    RedirectRequestError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    PayloadTooLargeError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    InternalSdkError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    UnknownError {
        api_id: ApiId,
        labels: HashMap<String, String>,
    },
}

impl MetricsEventData {
    /// Stable name of the variant, used in the unique key.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricsEventData::Latency { .. } => "latency",
            MetricsEventData::Size { .. } => "size",
            MetricsEventData::TimeoutError { .. } => "timeout_error",
            MetricsEventData::NetworkError { .. } => "network_error",
            MetricsEventData::BadRequestError { .. } => "bad_request_error",
            MetricsEventData::UnauthorizedError { .. } => "unauthorized_error",
            MetricsEventData::ForbiddenError { .. } => "forbidden_error",
            MetricsEventData::NotFoundError { .. } => "not_found_error",
            MetricsEventData::ClientClosedRequestError { .. } => "client_closed_request_error",
            MetricsEventData::ServiceUnavailableError { .. } => "service_unavailable_error",
            MetricsEventData::InternalServerError { .. } => "internal_server_error",
            MetricsEventData::RedirectRequestError { .. } => "redirect_request_error",
            MetricsEventData::PayloadTooLargeError { .. } => "payload_too_large_error",
            MetricsEventData::InternalSdkError { .. } => "internal_sdk_error",
            MetricsEventData::UnknownError { .. } => "unknown_error",
        }
    }

    pub fn api_id(&self) -> ApiId {
        match self {
            MetricsEventData::Latency { api_id, .. }
            | MetricsEventData::Size { api_id, .. }
            | MetricsEventData::TimeoutError { api_id, .. }
            | MetricsEventData::NetworkError { api_id, .. }
            | MetricsEventData::BadRequestError { api_id, .. }
            | MetricsEventData::UnauthorizedError { api_id, .. }
            | MetricsEventData::ForbiddenError { api_id, .. }
            | MetricsEventData::NotFoundError { api_id, .. }
            | MetricsEventData::ClientClosedRequestError { api_id, .. }
            | MetricsEventData::ServiceUnavailableError { api_id, .. }
            | MetricsEventData::InternalServerError { api_id, .. }
            | MetricsEventData::RedirectRequestError { api_id, .. }
            | MetricsEventData::PayloadTooLargeError { api_id, .. }
            | MetricsEventData::InternalSdkError { api_id, .. }
            | MetricsEventData::UnknownError { api_id, .. } => *api_id,
        }
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        match self {
            MetricsEventData::Latency { labels, .. }
            | MetricsEventData::Size { labels, .. }
            | MetricsEventData::TimeoutError { labels, .. }
            | MetricsEventData::NetworkError { labels, .. }
            | MetricsEventData::BadRequestError { labels, .. }
            | MetricsEventData::UnauthorizedError { labels, .. }
            | MetricsEventData::ForbiddenError { labels, .. }
            | MetricsEventData::NotFoundError { labels, .. }
            | MetricsEventData::ClientClosedRequestError { labels, .. }
            | MetricsEventData::ServiceUnavailableError { labels, .. }
            | MetricsEventData::InternalServerError { labels, .. }
            | MetricsEventData::RedirectRequestError { labels, .. }
            | MetricsEventData::PayloadTooLargeError { labels, .. }
            | MetricsEventData::InternalSdkError { labels, .. }
            | MetricsEventData::UnknownError { labels, .. } => labels,
        }
    }

    /// Key that defines deduplication equality for metrics events.
    ///
    /// Two metrics events with the same api id, variant, and label map are
    /// considered duplicates. Labels are sorted so the key is independent of
    /// map iteration order.
    pub fn unique_key(&self) -> String {
        let mut labels: Vec<String> = self
            .labels()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        labels.sort();
        format!(
            "{}::{}::{}",
            self.api_id().as_str(),
            self.kind(),
            labels.join(",")
        )
    }
}

/// The payload of a queued event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventPayload {
    Evaluation(EvaluationEvent),
    Goal(GoalEvent),
    Metrics(MetricsEvent),
}

/// An event in the local queue. Immutable once created; owned by the store
/// until deleted after a successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    pub fn is_metrics(&self) -> bool {
        matches!(self.payload, EventPayload::Metrics(_))
    }

    /// Deduplication key; `None` for non-metrics events, which are always
    /// unique.
    pub fn unique_key(&self) -> Option<String> {
        match &self.payload {
            EventPayload::Metrics(metrics) => Some(metrics.event.unique_key()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(tag: &str) -> HashMap<String, String> {
        HashMap::from([("tag".to_string(), tag.to_string())])
    }

    #[test]
    fn test_unique_key_same_for_equal_subtype_and_labels() {
        let a = MetricsEventData::TimeoutError {
            api_id: ApiId::GetEvaluations,
            labels: labels("ios"),
        };
        let b = MetricsEventData::TimeoutError {
            api_id: ApiId::GetEvaluations,
            labels: labels("ios"),
        };
        assert_eq!(a.unique_key(), b.unique_key());
    }

    #[test]
    fn test_unique_key_differs_by_subtype() {
        let timeout = MetricsEventData::TimeoutError {
            api_id: ApiId::GetEvaluations,
            labels: labels("ios"),
        };
        let network = MetricsEventData::NetworkError {
            api_id: ApiId::GetEvaluations,
            labels: labels("ios"),
        };
        assert_ne!(timeout.unique_key(), network.unique_key());
    }

    #[test]
    fn test_unique_key_differs_by_labels_and_api() {
        let base = MetricsEventData::NetworkError {
            api_id: ApiId::GetEvaluations,
            labels: labels("ios"),
        };
        let other_tag = MetricsEventData::NetworkError {
            api_id: ApiId::GetEvaluations,
            labels: labels("android"),
        };
        let other_api = MetricsEventData::NetworkError {
            api_id: ApiId::RegisterEvents,
            labels: labels("ios"),
        };
        assert_ne!(base.unique_key(), other_tag.unique_key());
        assert_ne!(base.unique_key(), other_api.unique_key());
    }

    #[test]
    fn test_unique_key_label_order_independent() {
        let mut forward = HashMap::new();
        forward.insert("tag".to_string(), "ios".to_string());
        forward.insert("timeout".to_string(), "5.0".to_string());

        let a = MetricsEventData::TimeoutError {
            api_id: ApiId::GetEvaluations,
            labels: forward.clone(),
        };
        let b = MetricsEventData::TimeoutError {
            api_id: ApiId::GetEvaluations,
            labels: forward,
        };
        assert_eq!(a.unique_key(), b.unique_key());
        assert!(a.unique_key().contains("tag=ios"));
        assert!(a.unique_key().contains("timeout=5.0"));
    }

    #[test]
    fn test_non_metrics_events_have_no_unique_key() {
        let event = Event::new(
            "evt-1",
            EventPayload::Goal(GoalEvent {
                timestamp: 1_700_000_000,
                goal_id: "checkout".to_string(),
                value: 1.0,
                user: User::new("user-1"),
                tag: "ios".to_string(),
                sdk_version: "0.1.0".to_string(),
                metadata: HashMap::new(),
            }),
        );
        assert!(event.unique_key().is_none());
        assert!(!event.is_metrics());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::new(
            "evt-2",
            EventPayload::Metrics(MetricsEvent {
                timestamp: 1_700_000_000,
                event: MetricsEventData::Latency {
                    api_id: ApiId::GetEvaluations,
                    labels: labels("ios"),
                    latency_second: 0.25,
                },
                sdk_version: "0.1.0".to_string(),
                metadata: HashMap::new(),
            }),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], "evt-2");
        assert_eq!(json["type"], "metrics");
        assert_eq!(json["event"]["type"], "latency");
        assert_eq!(json["event"]["apiId"], "GET_EVALUATIONS");
        assert_eq!(json["event"]["latencySecond"], 0.25);

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_evaluation_event_round_trip() {
        let event = Event::new(
            "evt-3",
            EventPayload::Evaluation(EvaluationEvent {
                timestamp: 1_700_000_000,
                feature_id: "dark-mode".to_string(),
                feature_version: 3,
                variation_id: "var-a".to_string(),
                user: User::new("user-1").with_data("plan", "pro"),
                reason: EvaluationReason::Rule,
                tag: "ios".to_string(),
                sdk_version: "0.1.0".to_string(),
                metadata: HashMap::new(),
            }),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"featureId\":\"dark-mode\""));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
