//! Engine error taxonomy.

use itemsync_core::BootstrapStep;
use itemsync_types::SyncError;
use thiserror::Error;

use crate::backend::BackendError;
use crate::store::StoreError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or service failure.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The record or zone does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation's inputs are invalid; never retried.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A stored record has missing or mistyped fields.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The items zone could not be resolved.
    #[error("items zone unavailable: {0}")]
    ZoneUnavailable(String),

    /// Item operations need a completed bootstrap.
    #[error("engine not ready")]
    NotReady,

    /// A bootstrap step exhausted its retries.
    #[error("bootstrap failed at {step}: {error}")]
    BootstrapFailed {
        /// The step that failed.
        step: BootstrapStep,
        /// Error message of the last attempt.
        error: String,
    },

    /// A backend call did not complete in time.
    #[error("backend call timed out")]
    Timeout,

    /// Identifier store error.
    #[error("identifier store error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Whether a bootstrap step may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::BackendUnavailable(_)
                | ClientError::ZoneUnavailable(_)
                | ClientError::NotFound(_)
                | ClientError::Timeout
        )
    }
}

impl From<BackendError> for ClientError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable(msg) | BackendError::Rejected(msg) => {
                ClientError::BackendUnavailable(msg)
            }
            BackendError::NotFound(msg) => ClientError::NotFound(msg),
            BackendError::Timeout => ClientError::Timeout,
        }
    }
}

impl From<SyncError> for ClientError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::InvalidItem(reason) => ClientError::PreconditionFailed(reason),
            other => ClientError::DecodeFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_to_taxonomy() {
        assert!(matches!(
            ClientError::from(BackendError::Rejected("conflict".into())),
            ClientError::BackendUnavailable(_)
        ));
        assert!(matches!(
            ClientError::from(BackendError::NotFound("x".into())),
            ClientError::NotFound(_)
        ));
        assert!(matches!(
            ClientError::from(BackendError::Timeout),
            ClientError::Timeout
        ));
    }

    #[test]
    fn invalid_item_is_precondition() {
        let err = ClientError::from(SyncError::InvalidItem("empty title".into()));
        assert!(matches!(err, ClientError::PreconditionFailed(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn decode_failure_keeps_reason() {
        let err = ClientError::from(SyncError::DecodeFailed {
            record: "r1".into(),
            reason: "missing `name`".into(),
        });
        assert!(err.to_string().contains("missing `name`"));
    }

    #[test]
    fn bootstrap_failure_names_step() {
        let err = ClientError::BootstrapFailed {
            step: BootstrapStep::Root,
            error: "service unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "bootstrap failed at root record: service unavailable"
        );
    }
}
