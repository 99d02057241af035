//! Errors returned by protected calls.

use std::convert::Infallible;
use thiserror::Error;

/// Result of a call through a circuit breaker.
///
/// Rejections never invoke the operation; `Operation` carries the
/// operation's own error unmodified.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker is open and fails fast.
    #[error("circuit breaker is open")]
    Open,

    /// The breaker is half-open and its trial calls are used up.
    #[error("too many requests")]
    TooManyRequests,

    /// The operation ran and failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// True for errors produced by the breaker itself.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BreakerError::Open | BreakerError::TooManyRequests)
    }

    /// The operation's error, if the operation ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Label used for rejection metrics and logs.
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            BreakerError::Open => "open",
            BreakerError::TooManyRequests => "too_many_requests",
            BreakerError::Operation(_) => "operation",
        }
    }
}

impl BreakerError<Infallible> {
    /// Widen an admission rejection to any operation error type.
    pub(crate) fn widen<E>(self) -> BreakerError<E> {
        match self {
            BreakerError::Open => BreakerError::Open,
            BreakerError::TooManyRequests => BreakerError::TooManyRequests,
            BreakerError::Operation(never) => match never {},
        }
    }
}
