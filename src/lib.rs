//! Flagwire event SDK
//!
//! Client-side event tracking and delivery for the Flagwire feature flag
//! platform. The crate queues analytics events (flag evaluations, goals,
//! SDK metrics) in a local store, deduplicates metrics events, and flushes
//! bounded batches to the backend over HTTP.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flagwire::{
//!     EventConfig, EventInteractor, EventScheduler, HttpApiClient, InMemoryEventStore,
//!     SystemClock, User, UuidIdGenerator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> flagwire::Result<()> {
//!     let config = EventConfig::builder("https://api.flagwire.dev/v1", "api-key", "rust-server")
//!         .flush_interval(Duration::from_secs(30))
//!         .build()?;
//!
//!     let api_client = Arc::new(HttpApiClient::new(&config).expect("http client"));
//!     let interactor = Arc::new(EventInteractor::new(
//!         config.clone(),
//!         Arc::new(InMemoryEventStore::new()),
//!         api_client,
//!         Arc::new(SystemClock),
//!         Arc::new(UuidIdGenerator),
//!     ));
//!
//!     let mut scheduler = EventScheduler::new(interactor.clone(), config.flush_interval);
//!     scheduler.start();
//!
//!     interactor.track_goal_event("rust-server", User::new("user-123"), "checkout", 1.0)?;
//!
//!     scheduler.stop().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod utils;

pub use api::{
    ApiClient, ApiError, HttpApiClient, RegisterEventsError, RegisterEventsRequest,
    RegisterEventsResponse,
};
pub use config::{
    EventConfig, EventConfigBuilder, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_BATCH_QUEUE_COUNT,
    DEFAULT_REQUEST_TIMEOUT, SDK_VERSION,
};
pub use error::{ErrorCode, FlagwireError, Result};
pub use event::{
    ApiId, Evaluation, EvaluationEvent, EvaluationReason, Event, EventInteractor, EventPayload,
    EventScheduler, EventStore, EventUpdateListener, FileEventStore, GoalEvent, InMemoryEventStore,
    MetricsEvent, MetricsEventData, User,
};
pub use utils::{Clock, IdGenerator, SystemClock, UuidIdGenerator};
