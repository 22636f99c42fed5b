//! Error types for the Trailsync engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the engine to its callers.
///
/// Remote Store failures are deliberately absent: they are captured per
/// queue item during a sync pass and reported through
/// [`SyncReport`](crate::SyncReport), never propagated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A sync pass was requested while the device is offline.
    #[error("device is offline, sync pass refused")]
    Offline,

    /// The local durable store could not be read or written.
    #[error("local store unavailable or corrupted: {0}")]
    StoreCorruption(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("dead letter not found: {0}")]
    DeadLetterNotFound(u64),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`RemoteStore`](crate::RemoteStore) call.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum RemoteError {
    /// The backend refused the payload (validation, unknown parent, ...).
    #[error("rejected by remote store: {0}")]
    Rejected(String),

    /// Network, authorization or server-side failure.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Whether this failure counts toward dead-lettering.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RemoteError::Rejected(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::StoreCorruption(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            Error::Offline.to_string(),
            "device is offline, sync pass refused"
        );
        assert_eq!(
            Error::RecordNotFound("tmp_1".into()).to_string(),
            "record not found: tmp_1"
        );
        assert_eq!(
            RemoteError::Unavailable("timeout".into()).to_string(),
            "remote store unavailable: timeout"
        );
    }

    #[test]
    fn only_rejections_count_toward_dead_letter() {
        assert!(RemoteError::Rejected("bad name".into()).is_rejection());
        assert!(!RemoteError::Unavailable("503".into()).is_rejection());
    }

    #[test]
    fn decode_failures_are_store_corruption() {
        let err: Error = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, Error::StoreCorruption(_)));
    }
}
