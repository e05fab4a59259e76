//! Identity types for itemsync.
//!
//! Zones and records are addressed the way the remote store addresses them:
//! a record name scoped by a zone, and a zone name scoped by its owner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner name the remote store uses for the signed-in user.
pub const DEFAULT_OWNER: &str = "__defaultOwner__";

/// Identifier of a zone: a named partition owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneId {
    /// Zone name, unique per owner.
    pub zone_name: String,
    /// Owner of the zone.
    pub owner_name: String,
}

impl ZoneId {
    /// Create a zone id for the given name and owner.
    pub fn new(zone_name: impl Into<String>, owner_name: impl Into<String>) -> Self {
        Self {
            zone_name: zone_name.into(),
            owner_name: owner_name.into(),
        }
    }

    /// Create a zone id owned by the current user.
    pub fn owned(zone_name: impl Into<String>) -> Self {
        Self::new(zone_name, DEFAULT_OWNER)
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_name, self.zone_name)
    }
}

/// Identifier of a record (or share) inside a zone.
///
/// Serialized as `{recordName, zoneName, ownerName}` so persisted identifiers
/// stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    /// Record name, unique within the zone.
    #[serde(rename = "recordName")]
    pub record_name: String,
    /// Zone holding the record.
    #[serde(flatten)]
    pub zone_id: ZoneId,
}

impl RecordId {
    /// Create a record id from a name and zone.
    pub fn new(record_name: impl Into<String>, zone_id: ZoneId) -> Self {
        Self {
            record_name: record_name.into(),
            zone_id,
        }
    }

    /// Create a record id with a random UUID v4 name.
    pub fn random(zone_id: ZoneId) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), zone_id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone_id, self.record_name)
    }
}
