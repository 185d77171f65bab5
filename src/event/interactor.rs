//! Event creation, deduplication, and send/flush orchestration.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiClient, ApiError};
use crate::config::EventConfig;
use crate::error::{ErrorCode, FlagwireError, Result};
use crate::event::store::EventStore;
use crate::event::types::{
    ApiId, Evaluation, EvaluationEvent, EvaluationReason, Event, EventPayload, GoalEvent,
    MetricsEvent, MetricsEventData, User,
};
use crate::utils::{Clock, IdGenerator};

/// Observer notified with the full queue after every queue mutation.
pub trait EventUpdateListener: Send + Sync {
    fn on_update(&self, events: Vec<Event>);
}

/// Orchestrates event building, queueing, deduplication of metrics events,
/// and batched sends.
///
/// The interactor is a thin layer over an [`EventStore`] and an
/// [`ApiClient`]; it holds no queue state of its own and performs no
/// retries. Retriable per-event errors simply leave events in the store
/// for a later [`send_events`] call.
///
/// [`send_events`]: EventInteractor::send_events
pub struct EventInteractor {
    config: EventConfig,
    store: Arc<dyn EventStore>,
    api_client: Arc<dyn ApiClient>,
    clock: Arc<dyn Clock>,
    id_generator: Arc<dyn IdGenerator>,
    listener: Mutex<Option<Arc<dyn EventUpdateListener>>>,
}

impl EventInteractor {
    pub fn new(
        config: EventConfig,
        store: Arc<dyn EventStore>,
        api_client: Arc<dyn ApiClient>,
        clock: Arc<dyn Clock>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            config,
            store,
            api_client,
            clock,
            id_generator,
            listener: Mutex::new(None),
        }
    }

    /// Register or clear the queue observer.
    pub fn set_event_update_listener(&self, listener: Option<Arc<dyn EventUpdateListener>>) {
        *self.listener.lock() = listener;
    }

    /// Record a flag evaluation served to a user.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the event cannot be persisted.
    pub fn track_evaluation_event(
        &self,
        tag: &str,
        user: User,
        evaluation: Evaluation,
    ) -> Result<()> {
        let event = Event::new(
            self.id_generator.generate(),
            EventPayload::Evaluation(EvaluationEvent {
                timestamp: self.clock.current_time_seconds(),
                feature_id: evaluation.feature_id,
                feature_version: evaluation.feature_version,
                variation_id: evaluation.variation_id,
                user,
                reason: evaluation.reason,
                tag: tag.to_string(),
                sdk_version: self.config.sdk_version.clone(),
                metadata: self.base_metadata(),
            }),
        );
        self.store.add(event)?;
        self.notify_listener();
        Ok(())
    }

    /// Record that the SDK fell back to the application-provided default
    /// value for a flag.
    pub fn track_default_evaluation_event(
        &self,
        tag: &str,
        user: User,
        feature_id: &str,
    ) -> Result<()> {
        self.track_evaluation_event(
            tag,
            user,
            Evaluation {
                feature_id: feature_id.to_string(),
                feature_version: 0,
                variation_id: String::new(),
                reason: EvaluationReason::Client,
            },
        )
    }

    /// Record a conversion goal reached by a user.
    pub fn track_goal_event(&self, tag: &str, user: User, goal_id: &str, value: f64) -> Result<()> {
        let event = Event::new(
            self.id_generator.generate(),
            EventPayload::Goal(GoalEvent {
                timestamp: self.clock.current_time_seconds(),
                goal_id: goal_id.to_string(),
                value,
                user,
                tag: tag.to_string(),
                sdk_version: self.config.sdk_version.clone(),
                metadata: self.base_metadata(),
            }),
        );
        self.store.add(event)?;
        self.notify_listener();
        Ok(())
    }

    /// Record latency and response size of a successful evaluations fetch.
    ///
    /// Both metrics events are inserted atomically as one batch.
    pub fn track_fetch_evaluations_success(
        &self,
        tag: &str,
        latency: Duration,
        size_byte: i64,
    ) -> Result<()> {
        let labels = Self::tag_labels(tag);
        self.track_metrics_events(vec![
            MetricsEventData::Latency {
                api_id: ApiId::GetEvaluations,
                labels: labels.clone(),
                latency_second: latency.as_secs_f64(),
            },
            MetricsEventData::Size {
                api_id: ApiId::GetEvaluations,
                labels,
                size_byte,
            },
        ])
    }

    /// Record a failed evaluations fetch as one error metrics event.
    pub fn track_fetch_evaluations_failure(&self, tag: &str, error: &ApiError) -> Result<()> {
        let data = Self::error_to_metrics_data(ApiId::GetEvaluations, tag, error);
        self.track_metrics_events(vec![data])
    }

    /// Record a failed event registration as one error metrics event.
    pub fn track_register_events_failure(&self, error: &ApiError) -> Result<()> {
        let data = Self::error_to_metrics_data(ApiId::RegisterEvents, &self.config.tag, error);
        self.track_metrics_events(vec![data])
    }

    /// Send up to `max_batch_queue_count` of the oldest queued events.
    ///
    /// Returns `Ok(false)` without calling the API when the queue is empty,
    /// or when `force` is off and the queue is below the batch threshold.
    /// After a successful send, accepted events and events rejected with a
    /// non-retriable error are deleted; retriable rejections stay queued.
    ///
    /// # Errors
    ///
    /// Returns the API error (wrapped as `EVENT_SEND_FAILED`) when the send
    /// fails; a register-events-failure metrics event is recorded
    /// best-effort beforehand.
    pub async fn send_events(&self, force: bool) -> Result<bool> {
        let queued = self.store.events()?;
        if queued.is_empty() {
            tracing::debug!("Event queue is empty, skipping send");
            return Ok(false);
        }

        if !force && queued.len() < self.config.max_batch_queue_count {
            tracing::debug!(
                queued = queued.len(),
                threshold = self.config.max_batch_queue_count,
                "Event queue below batch threshold, skipping send"
            );
            return Ok(false);
        }

        let batch: Vec<Event> = queued
            .into_iter()
            .take(self.config.max_batch_queue_count)
            .collect();
        let sent_ids: Vec<String> = batch.iter().map(|e| e.id.clone()).collect();

        tracing::debug!(count = batch.len(), force, "Sending event batch");

        match self.api_client.register_events(batch).await {
            Ok(response) => {
                let deleted_ids: Vec<String> = sent_ids
                    .into_iter()
                    .filter(|id| match response.errors.get(id) {
                        None => true,
                        Some(error) => !error.retriable,
                    })
                    .collect();

                self.store.delete(&deleted_ids)?;
                tracing::debug!(deleted = deleted_ids.len(), "Deleted acknowledged events");
                self.notify_listener();
                Ok(true)
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to register events");
                if let Err(secondary) = self.track_register_events_failure(&error) {
                    tracing::warn!(
                        error = %secondary,
                        "Failed to record register-events failure metric"
                    );
                }
                Err(FlagwireError::with_source(
                    ErrorCode::EventSendFailed,
                    "Failed to register events",
                    error,
                ))
            }
        }
    }

    /// Insert metrics events, dropping candidates whose unique key is
    /// already present in the store (or earlier in the same batch).
    fn track_metrics_events(&self, data: Vec<MetricsEventData>) -> Result<()> {
        let stored = self.store.events()?;
        let mut seen: HashSet<String> = stored
            .iter()
            .filter_map(|event| event.unique_key())
            .collect();

        let mut new_events = Vec::new();
        for item in data {
            let key = item.unique_key();
            if seen.insert(key.clone()) {
                new_events.push(Event::new(
                    self.id_generator.generate(),
                    EventPayload::Metrics(MetricsEvent {
                        timestamp: self.clock.current_time_seconds(),
                        event: item,
                        sdk_version: self.config.sdk_version.clone(),
                        metadata: self.base_metadata(),
                    }),
                ));
            } else {
                tracing::debug!(key = %key, "Skipping duplicate metrics event");
            }
        }

        if new_events.is_empty() {
            return Ok(());
        }

        self.store.add_all(new_events)?;
        self.notify_listener();
        Ok(())
    }

    /// Map an API error to its metrics-event variant. Exhaustive by
    /// construction so new error classes cannot be silently unreported.
    fn error_to_metrics_data(api_id: ApiId, tag: &str, error: &ApiError) -> MetricsEventData {
        let labels = Self::tag_labels(tag);
        match error {
            ApiError::Timeout { timeout } => {
                let mut labels = labels;
                labels.insert(
                    "timeout".to_string(),
                    format!("{:.1}", timeout.as_secs_f64()),
                );
                MetricsEventData::TimeoutError { api_id, labels }
            }
            ApiError::Network { .. } => MetricsEventData::NetworkError { api_id, labels },
            ApiError::BadRequest { .. } => MetricsEventData::BadRequestError { api_id, labels },
            ApiError::Unauthorized { .. } => MetricsEventData::UnauthorizedError { api_id, labels },
            ApiError::Forbidden { .. } => MetricsEventData::ForbiddenError { api_id, labels },
            ApiError::NotFound { .. } => MetricsEventData::NotFoundError { api_id, labels },
            ApiError::ClientClosedRequest { .. } => {
                MetricsEventData::ClientClosedRequestError { api_id, labels }
            }
            ApiError::Unavailable { .. } => {
                MetricsEventData::ServiceUnavailableError { api_id, labels }
            }
            ApiError::InternalServer { .. } => {
                MetricsEventData::InternalServerError { api_id, labels }
            }
            ApiError::RedirectRequest { status, .. } => {
                let mut labels = labels;
                labels.insert("response_code".to_string(), status.to_string());
                MetricsEventData::RedirectRequestError { api_id, labels }
            }
            ApiError::PayloadTooLarge { .. } => {
                MetricsEventData::PayloadTooLargeError { api_id, labels }
            }
            ApiError::InvalidResponse { .. } => {
                MetricsEventData::InternalSdkError { api_id, labels }
            }
            ApiError::Unknown { status, .. } => {
                let mut labels = labels;
                if let Some(status) = status {
                    labels.insert("response_code".to_string(), status.to_string());
                }
                MetricsEventData::UnknownError { api_id, labels }
            }
        }
    }

    fn tag_labels(tag: &str) -> HashMap<String, String> {
        HashMap::from([("tag".to_string(), tag.to_string())])
    }

    fn base_metadata(&self) -> HashMap<String, String> {
        HashMap::from([("sdk_language".to_string(), "rust".to_string())])
    }

    fn notify_listener(&self) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            match self.store.events() {
                Ok(events) => listener.on_update(events),
                Err(error) => {
                    tracing::warn!(error = %error, "Failed to read queue for listener notification");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::store::InMemoryEventStore;
    use async_trait::async_trait;
    use crate::api::RegisterEventsResponse;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn current_time_seconds(&self) -> i64 {
            self.0
        }
    }

    struct SeqIdGenerator(AtomicU64);

    impl IdGenerator for SeqIdGenerator {
        fn generate(&self) -> String {
            format!("id-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    struct NoopApiClient;

    #[async_trait]
    impl ApiClient for NoopApiClient {
        async fn register_events(
            &self,
            _events: Vec<Event>,
        ) -> std::result::Result<RegisterEventsResponse, ApiError> {
            Ok(RegisterEventsResponse::default())
        }
    }

    fn interactor() -> (EventInteractor, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        let config = EventConfig::builder("https://api.example.dev", "key-1", "ios")
            .max_batch_queue_count(3)
            .build()
            .unwrap();
        let interactor = EventInteractor::new(
            config,
            store.clone(),
            Arc::new(NoopApiClient),
            Arc::new(FixedClock(1_700_000_000)),
            Arc::new(SeqIdGenerator(AtomicU64::new(0))),
        );
        (interactor, store)
    }

    #[test]
    fn test_track_evaluation_event_persists_event() {
        let (interactor, store) = interactor();

        interactor
            .track_evaluation_event(
                "ios",
                User::new("user-1"),
                Evaluation {
                    feature_id: "dark-mode".to_string(),
                    feature_version: 2,
                    variation_id: "var-a".to_string(),
                    reason: EvaluationReason::Rule,
                },
            )
            .unwrap();

        let events = store.events().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            EventPayload::Evaluation(e) => {
                assert_eq!(e.feature_id, "dark-mode");
                assert_eq!(e.timestamp, 1_700_000_000);
                assert_eq!(e.tag, "ios");
            }
            other => panic!("expected evaluation event, got {other:?}"),
        }
    }

    #[test]
    fn test_track_default_evaluation_event_marks_client_reason() {
        let (interactor, store) = interactor();

        interactor
            .track_default_evaluation_event("ios", User::new("user-1"), "dark-mode")
            .unwrap();

        match &store.events().unwrap()[0].payload {
            EventPayload::Evaluation(e) => {
                assert_eq!(e.reason, EvaluationReason::Client);
                assert_eq!(e.feature_version, 0);
                assert!(e.variation_id.is_empty());
            }
            other => panic!("expected evaluation event, got {other:?}"),
        }
    }

    #[test]
    fn test_fetch_success_inserts_latency_and_size_as_one_batch() {
        let (interactor, store) = interactor();

        interactor
            .track_fetch_evaluations_success("ios", Duration::from_millis(250), 1024)
            .unwrap();

        let events = store.events().unwrap();
        assert_eq!(events.len(), 2);
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match &e.payload {
                EventPayload::Metrics(m) => m.event.kind(),
                other => panic!("expected metrics event, got {other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec!["latency", "size"]);
    }

    #[test]
    fn test_duplicate_metrics_events_are_filtered() {
        let (interactor, store) = interactor();
        let error = ApiError::Network {
            message: "connection refused".to_string(),
        };

        interactor
            .track_fetch_evaluations_failure("ios", &error)
            .unwrap();
        interactor
            .track_fetch_evaluations_failure("ios", &error)
            .unwrap();

        assert_eq!(store.events().unwrap().len(), 1);

        // A different tag is a different unique key.
        interactor
            .track_fetch_evaluations_failure("android", &error)
            .unwrap();
        assert_eq!(store.events().unwrap().len(), 2);
    }

    #[test]
    fn test_timeout_error_carries_formatted_timeout_label() {
        let (interactor, store) = interactor();

        interactor
            .track_fetch_evaluations_failure(
                "ios",
                &ApiError::Timeout {
                    timeout: Duration::from_millis(5000),
                },
            )
            .unwrap();

        match &store.events().unwrap()[0].payload {
            EventPayload::Metrics(m) => {
                assert_eq!(m.event.kind(), "timeout_error");
                assert_eq!(m.event.labels()["timeout"], "5.0");
                assert_eq!(m.event.labels()["tag"], "ios");
            }
            other => panic!("expected metrics event, got {other:?}"),
        }
    }

    #[test]
    fn test_redirect_error_carries_response_code_label() {
        let (interactor, store) = interactor();

        interactor
            .track_fetch_evaluations_failure(
                "ios",
                &ApiError::RedirectRequest {
                    status: 302,
                    message: "moved".to_string(),
                },
            )
            .unwrap();

        match &store.events().unwrap()[0].payload {
            EventPayload::Metrics(m) => {
                assert_eq!(m.event.kind(), "redirect_request_error");
                assert_eq!(m.event.labels()["response_code"], "302");
            }
            other => panic!("expected metrics event, got {other:?}"),
        }
    }

    #[test]
    fn test_register_events_failure_uses_configured_tag() {
        let (interactor, store) = interactor();

        interactor
            .track_register_events_failure(&ApiError::InternalServer {
                message: "500".to_string(),
            })
            .unwrap();

        match &store.events().unwrap()[0].payload {
            EventPayload::Metrics(m) => {
                assert_eq!(m.event.api_id(), ApiId::RegisterEvents);
                assert_eq!(m.event.labels()["tag"], "ios");
            }
            other => panic!("expected metrics event, got {other:?}"),
        }
    }

    #[test]
    fn test_listener_notified_with_full_queue() {
        struct CapturingListener(Mutex<Vec<usize>>);

        impl EventUpdateListener for CapturingListener {
            fn on_update(&self, events: Vec<Event>) {
                self.0.lock().push(events.len());
            }
        }

        let (interactor, _store) = interactor();
        let listener = Arc::new(CapturingListener(Mutex::new(Vec::new())));
        interactor.set_event_update_listener(Some(listener.clone()));

        interactor
            .track_goal_event("ios", User::new("user-1"), "checkout", 1.0)
            .unwrap();
        interactor
            .track_goal_event("ios", User::new("user-1"), "signup", 1.0)
            .unwrap();

        assert_eq!(*listener.0.lock(), vec![1, 2]);
    }
}
