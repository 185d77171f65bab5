use std::time::Duration;

use thiserror::Error;

/// Error returned by the register-events API call.
///
/// Each variant corresponds to one class of transport or HTTP failure so
/// callers can dispatch on the kind with an exhaustive `match`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("client closed request: {message}")]
    ClientClosedRequest { message: String },

    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    #[error("internal server error: {message}")]
    InternalServer { message: String },

    #[error("unexpected redirect ({status}): {message}")]
    RedirectRequest { status: u16, message: String },

    #[error("payload too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("unknown error ({status:?}): {message}")]
    Unknown { status: Option<u16>, message: String },
}

impl ApiError {
    /// Whether the failed request could reasonably succeed if repeated.
    ///
    /// The event layer itself never retries; queued events simply stay in
    /// the store until a later flush.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout { .. }
                | ApiError::Network { .. }
                | ApiError::Unavailable { .. }
                | ApiError::InternalServer { .. }
        )
    }
}
