//! Event delivery API: the [`ApiClient`] trait, its reqwest implementation,
//! and the error classes the backend round-trip can produce.

mod client;
mod error;

pub use client::{
    ApiClient, HttpApiClient, RegisterEventsError, RegisterEventsRequest, RegisterEventsResponse,
};
pub use error::ApiError;
