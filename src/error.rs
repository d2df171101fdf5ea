//! Error types for the fx-rates library.

use thiserror::Error;

/// The main error type for all fx-rates operations.
#[derive(Error, Debug)]
pub enum FxError {
    /// Caller input rejected before reaching the core (bad currency code, etc.)
    #[error("invalid {field}: {message}")]
    Validation {
        /// Which input was rejected
        field: &'static str,
        /// Why it was rejected
        message: String,
    },

    /// Admission denied: the client has exhausted its hourly request quota
    #[error("rate limit exceeded for the current window")]
    RateLimitExceeded,

    /// The upstream provider kept failing after every retry attempt
    #[error("upstream transport failure: {0}")]
    UpstreamTransport(String),

    /// The upstream provider rejected the API credential
    #[error("upstream rejected credentials: {0}")]
    UpstreamAuth(String),

    /// The upstream provider has no data for the requested currency
    #[error("upstream has no data: {0}")]
    UpstreamNotFound(String),

    /// A storage operation failed; the core never retries these
    #[error("storage error: {0}")]
    Storage(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Response body did not match the documented payload shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl FxError {
    /// Whether the outer retry loop in the fetcher may try again.
    ///
    /// Transport-level failures and exhausted-5xx outcomes are transient;
    /// classification errors (401/404/429) and parse failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FxError::Http(_) | FxError::HttpMiddleware(_) | FxError::UpstreamTransport(_)
        )
    }

    /// The boundary outcome class a thin transport layer should map this error to.
    pub fn boundary_class(&self) -> BoundaryClass {
        match self {
            FxError::Validation { .. } => BoundaryClass::BadRequest,
            FxError::RateLimitExceeded => BoundaryClass::TooManyRequests,
            FxError::UpstreamNotFound(_) => BoundaryClass::NotFound,
            FxError::UpstreamTransport(_)
            | FxError::UpstreamAuth(_)
            | FxError::Storage(_)
            | FxError::Http(_)
            | FxError::HttpMiddleware(_)
            | FxError::Json(_)
            | FxError::Url(_)
            | FxError::InvalidResponse(_) => BoundaryClass::ServerError,
        }
    }
}

/// Outcome classes a boundary layer (HTTP handler, CLI, ...) maps errors to.
///
/// Absent-rate outcomes are not errors and never pass through this mapping:
/// the engine reports them as `Ok(None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryClass {
    /// Caller input was invalid
    BadRequest,
    /// The client exceeded its request quota
    TooManyRequests,
    /// The requested currency or pair is unknown upstream
    NotFound,
    /// Everything the caller cannot fix by changing the request
    ServerError,
}
