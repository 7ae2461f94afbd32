use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::http_client::HttpError;

/// Validation errors for core value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
}

/// Fetch failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Network failure or the provider could not be reached.
    Unavailable,
    /// Provider answered with a non-success status.
    Upstream,
    /// Provider answered but the payload did not have the expected shape.
    Parse,
    /// The caller cancelled before the fetch could start.
    Cancelled,
    Internal,
}

/// A source failed to produce its listing stream.
///
/// Opaque to the merge layer: the aggregator only logs it, while the caches
/// hand it back to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unavailable, message)
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            FetchErrorKind::Upstream,
            format!("upstream returned status {status}: {}", message.into()),
        )
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Parse, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FetchErrorKind::Cancelled, "fetch cancelled by caller")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Internal, message)
    }

    fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Unavailable => "fetch.unavailable",
            FetchErrorKind::Upstream => "fetch.upstream",
            FetchErrorKind::Parse => "fetch.parse",
            FetchErrorKind::Cancelled => "fetch.cancelled",
            FetchErrorKind::Internal => "fetch.internal",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

impl From<HttpError> for FetchError {
    fn from(error: HttpError) -> Self {
        Self::unavailable(error.message())
    }
}

/// Registry lookup miss.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("source not found: {identifier}")]
pub struct NotFoundError {
    pub identifier: String,
}

impl NotFoundError {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

/// Invalid cache configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheInitError {
    #[error("{cache} cache capacity must be greater than zero")]
    ZeroCapacity { cache: &'static str },
}
