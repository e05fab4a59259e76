//! The user-facing item and its record encoding.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{FieldValue, Record, RecordId, Scope, SyncError};

/// Record type used for items unless configured otherwise.
pub const ITEM_RECORD_TYPE: &str = "Item";

/// Field holding the item title.
pub const FIELD_NAME: &str = "name";
/// Field holding the shared flag (stored as 0/1).
pub const FIELD_IS_SHARE: &str = "isShare";
/// Field holding the creation timestamp.
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// A user item synchronized with the remote store.
///
/// `timestamp` is the identity of an item until the store assigns a
/// `remote_id`; it cannot change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item title (must be non-empty to persist).
    pub title: String,
    /// Whether the item is visible through the share.
    pub is_shared: bool,
    timestamp: f64,
    /// Remote identifier, set once persisted.
    pub remote_id: Option<RecordId>,
    /// Scope the item was read from.
    pub scope: Scope,
}

impl Item {
    /// Create a new private item stamped with the current time.
    pub fn new(title: impl Into<String>, is_shared: bool) -> Self {
        Self::with_timestamp(title, is_shared, now_secs())
    }

    /// Create a new private item with an explicit creation timestamp.
    pub fn with_timestamp(title: impl Into<String>, is_shared: bool, timestamp: f64) -> Self {
        Self {
            title: title.into(),
            is_shared,
            timestamp,
            remote_id: None,
            scope: Scope::Private,
        }
    }

    /// Creation timestamp in seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Check the item can be persisted.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.title.trim().is_empty() {
            return Err(SyncError::InvalidItem("title must not be empty".into()));
        }
        Ok(())
    }

    /// Write the mutable fields into an existing record.
    ///
    /// The timestamp is only written when the record has none yet.
    pub fn write_fields(&self, record: &mut Record) {
        record.set(FIELD_NAME, FieldValue::String(self.title.clone()));
        record.set(FIELD_IS_SHARE, FieldValue::Int(i64::from(self.is_shared)));
        if record.get(FIELD_TIMESTAMP).is_none() {
            record.set(FIELD_TIMESTAMP, FieldValue::Double(self.timestamp));
        }
    }

    /// Build a fresh record for this item.
    pub fn to_record(&self, id: RecordId, record_type: &str) -> Record {
        let mut record = Record::new(id, record_type);
        self.write_fields(&mut record);
        record
    }

    /// Decode an item from a record read in `scope`.
    pub fn from_record(record: &Record, scope: Scope) -> Result<Self, SyncError> {
        let decode_err = |reason: &str| SyncError::DecodeFailed {
            record: record.id.to_string(),
            reason: reason.to_string(),
        };

        let title = record
            .get(FIELD_NAME)
            .and_then(FieldValue::as_str)
            .ok_or_else(|| decode_err("missing or non-string `name`"))?;
        let is_share = record
            .get(FIELD_IS_SHARE)
            .and_then(FieldValue::as_int)
            .ok_or_else(|| decode_err("missing or non-integer `isShare`"))?;
        let timestamp = record
            .get(FIELD_TIMESTAMP)
            .and_then(FieldValue::as_double)
            .ok_or_else(|| decode_err("missing or non-double `timestamp`"))?;

        Ok(Self {
            title: title.to_string(),
            is_shared: is_share == 1,
            timestamp,
            remote_id: Some(record.id.clone()),
            scope,
        })
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
