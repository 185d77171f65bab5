mod interactor;
mod scheduler;
mod store;
mod types;

pub use interactor::{EventInteractor, EventUpdateListener};
pub use scheduler::EventScheduler;
pub use store::{EventStore, FileEventStore, InMemoryEventStore};
pub use types::{
    ApiId, Evaluation, EvaluationEvent, EvaluationReason, Event, EventPayload, GoalEvent,
    MetricsEvent, MetricsEventData, User,
};
