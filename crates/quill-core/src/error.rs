//! Unified error types for the Quill core.
//!
//! Remote failures are classified once, at the transport boundary, into the
//! closed [`ErrorClass`] variants. Everything above the transport (retry
//! executor, feed clients, services) branches on the class rather than on
//! concrete transport types.

use thiserror::Error;

// =============================================================================
// Classification
// =============================================================================

/// Kinds of transient failures that are worth retrying with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// The platform asked us to slow down (HTTP 429).
    RateLimited,
    /// The platform is temporarily unavailable (HTTP 502/503/504).
    Unavailable,
    /// The request timed out waiting for a response.
    Timeout,
    /// The connection could not be established.
    Connect,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RateLimited => "rate limited",
            Self::Unavailable => "service unavailable",
            Self::Timeout => "timeout",
            Self::Connect => "connect failure",
        };
        f.write_str(s)
    }
}

/// The closed classification of a remote-call failure.
///
/// Produced by a single classification function per transport
/// (see `quill-transport`). The retry executor is driven entirely by this
/// classification and never inspects transport internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Credential expired or invalid; recoverable via a token refresh.
    Unauthorized,
    /// Worth retrying with backoff.
    Transient(TransientKind),
    /// Malformed request, not-found, conflict, and other permanent 4xx
    /// conditions. Never retried.
    Permanent,
}

// =============================================================================
// Client Errors
// =============================================================================

/// Errors surfaced by remote operations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The platform rejected the credentials (HTTP 401).
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Server-provided detail, if any.
        message: String,
    },

    /// A transient failure that may succeed on retry.
    #[error("transient failure ({kind}): {message}")]
    Transient {
        /// Which transient condition was observed.
        kind: TransientKind,
        /// Server-provided or transport-provided detail.
        message: String,
    },

    /// A permanent request failure. Retrying cannot help.
    #[error("request failed permanently (status {status}): {message}")]
    Permanent {
        /// HTTP status code, or 0 for non-HTTP failures.
        status: u16,
        /// Server-provided detail.
        message: String,
    },

    /// Credential material was invalid or the auth endpoint was unreachable
    /// at startup. Fatal: never retried, never recovered by refresh.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// The retry budget was spent without a success.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The last error observed before giving up.
        last: Box<ClientError>,
    },

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    /// Returns the retry classification of this error, or `None` for errors
    /// that never reach the retry loop (initialization, exhaustion,
    /// serialization).
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::Unauthorized { .. } => Some(ErrorClass::Unauthorized),
            Self::Transient { kind, .. } => Some(ErrorClass::Transient(*kind)),
            Self::Permanent { .. } => Some(ErrorClass::Permanent),
            Self::Initialization(_) | Self::RetriesExhausted { .. } | Self::Serialization(_) => {
                None
            }
        }
    }

    /// Shorthand for an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Shorthand for a transient error of the given kind.
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        Self::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a permanent error.
    pub fn permanent(status: u16, message: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Maps an HTTP status code and response body into a [`ClientError`].
///
/// This is the single classification point for HTTP responses; both the
/// transport and tests use it so the taxonomy cannot drift.
pub fn classify_status(status: u16, body: &str) -> ClientError {
    match status {
        401 => ClientError::unauthorized(body.to_string()),
        429 => ClientError::transient(TransientKind::RateLimited, body.to_string()),
        502..=504 => ClientError::transient(TransientKind::Unavailable, body.to_string()),
        _ => ClientError::permanent(status, body.to_string()),
    }
}

/// Result type for remote operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_status_classifies_as_unauthorized() {
        let err = classify_status(401, "expired");
        assert_eq!(err.class(), Some(ErrorClass::Unauthorized));
    }

    #[test]
    fn throttling_and_outage_classify_as_transient() {
        assert_eq!(
            classify_status(429, "").class(),
            Some(ErrorClass::Transient(TransientKind::RateLimited))
        );
        assert_eq!(
            classify_status(503, "").class(),
            Some(ErrorClass::Transient(TransientKind::Unavailable))
        );
    }

    #[test]
    fn other_client_errors_classify_as_permanent() {
        for status in [400, 403, 404, 409] {
            assert_eq!(classify_status(status, "").class(), Some(ErrorClass::Permanent));
        }
    }

    #[test]
    fn initialization_is_outside_the_retry_taxonomy() {
        assert_eq!(ClientError::Initialization("bad key".into()).class(), None);
    }
}
