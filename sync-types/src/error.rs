//! Error types for itemsync data handling.

use thiserror::Error;

/// Errors raised while validating or decoding itemsync data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A record is present but its fields do not match the expected shape.
    #[error("failed to decode record {record}: {reason}")]
    DecodeFailed {
        /// Identifier of the offending record.
        record: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An item cannot be persisted as-is.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// JSON (de)serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::DecodeFailed {
            record: "zone/abc".into(),
            reason: "missing `name`".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to decode record zone/abc: missing `name`"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
