use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single fingerprint derivation.
///
/// Every variant is terminal for the derivation that produced it: callers
/// may retry the whole `derive()` but never patch over one identifier.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{identifier} returned a malformed value: {value:?}")]
    MalformedIdentifier {
        identifier: &'static str,
        value: String,
    },

    #[error("{identifier} query failed: {reason}")]
    QueryFailed {
        identifier: &'static str,
        reason: String,
    },

    #[error("{identifier} query did not finish within {deadline:?}")]
    QueryTimeout {
        identifier: &'static str,
        deadline: Duration,
    },

    #[error("no network interface is up, non-loopback and bound to a global unicast address")]
    NoSuitableInterface,

    #[error("fingerprint needs 3 identifiers, got {found}")]
    HashInputIncomplete { found: usize },
}

impl IdentityError {
    pub(crate) fn query_failed(identifier: &'static str, reason: impl ToString) -> Self {
        Self::QueryFailed {
            identifier,
            reason: reason.to_string(),
        }
    }
}

/// Failure reported by a platform provider before any identifier logic runs.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Query(String),

    #[error("not supported on this platform")]
    Unsupported,
}

impl From<io::Error> for ProviderError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(e.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(e.to_string()),
            io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Query(e.to_string()),
        }
    }
}
