//! Error type shared by every layer of the client.
//!
//! Errors are `Clone` because they are not only returned: failed fetches are
//! stored in cache entries and failed mutations in [`MutationState`], where
//! every observer gets its own copy.
//!
//! [`MutationState`]: crate::mutation::MutationState

use reqwest::Method;
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The request never produced a response (DNS, connect, TLS, I/O...).
    #[error("Network error on {method} {path}: {reason}")]
    NetworkFailure {
        method: Method,
        path: String,
        reason: String,
    },

    /// The remote service answered with a non-2xx status.
    #[error("Request failed: {method} {path} returned {status}")]
    RequestFailed {
        method: Method,
        path: String,
        status: u16,
    },

    /// An operation that needs a credential was attempted without one.
    #[error("Not authenticated")]
    Unauthenticated,

    /// A payload was rejected before being sent.
    ///
    /// Payloads are currently passed through as-is, so nothing raises this yet.
    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    /// A response body could not be decoded into the expected shape.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The session store was asked for a transition its current state forbids.
    #[error("Cannot {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    /// A cache fetcher panicked; the payload message is kept.
    #[error("Fetch panicked: {0}")]
    FetchPanicked(String),

    /// The HTTP client could not be constructed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Returns the HTTP status for [`Error::RequestFailed`], otherwise `None`.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
