//! Remote store objects: zones, records, shares.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{RecordId, ZoneId};

/// Visibility domain for records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Owner-only database.
    Private,
    /// Records other users shared with us.
    Shared,
}

impl Scope {
    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Private => "private",
            Scope::Shared => "shared",
        }
    }
}

/// A named partition within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    /// Zone identity.
    pub id: ZoneId,
}

impl Zone {
    /// Create a zone with the given id.
    pub fn new(id: ZoneId) -> Self {
        Self { id }
    }

    /// Zone name.
    pub fn name(&self) -> &str {
        &self.id.zone_name
    }
}

/// A typed record field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 string.
    String(String),
    /// 64-bit integer (booleans are stored as 0/1).
    Int(i64),
    /// 64-bit float.
    Double(f64),
}

impl FieldValue {
    /// String value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value, if this is a double.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// A record in the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identity.
    pub id: RecordId,
    /// Record type name (e.g. `"Item"`).
    pub record_type: String,
    /// Field values keyed by field name.
    pub fields: BTreeMap<String, FieldValue>,
    /// Parent link; shared records point at the root-sharing record.
    pub parent: Option<RecordId>,
}

impl Record {
    /// Create an empty record.
    pub fn new(id: RecordId, record_type: impl Into<String>) -> Self {
        Self {
            id,
            record_type: record_type.into(),
            fields: BTreeMap::new(),
            parent: None,
        }
    }

    /// Set a field value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Zone holding the record.
    pub fn zone_id(&self) -> &ZoneId {
        &self.id.zone_id
    }
}

/// Permission granted to share participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Permission {
    /// No access unless explicitly invited.
    #[default]
    None,
    /// Participants may read.
    ReadOnly,
    /// Participants may read and write.
    ReadWrite,
}

/// The sharing object bound to a root record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Share identity.
    pub id: RecordId,
    /// Root record this share governs.
    pub root: RecordId,
    /// Permission for anyone holding the share link.
    pub public_permission: Permission,
}

impl Share {
    /// Create the share for `root`.
    ///
    /// The share id is derived from the root, so a root has at most one share.
    pub fn for_root(root: &RecordId) -> Self {
        Self {
            id: Self::id_for_root(root),
            root: root.clone(),
            public_permission: Permission::ReadWrite,
        }
    }

    /// Id of the share bound to `root`.
    pub fn id_for_root(root: &RecordId) -> RecordId {
        RecordId::new(format!("{}.share", root.record_name), root.zone_id.clone())
    }
}

/// Anything the remote store can save or fetch by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredObject {
    /// A plain record.
    Record(Record),
    /// A share object.
    Share(Share),
}

impl StoredObject {
    /// Identity of the stored object.
    pub fn id(&self) -> &RecordId {
        match self {
            StoredObject::Record(r) => &r.id,
            StoredObject::Share(s) => &s.id,
        }
    }

    /// The record, if this is a record.
    pub fn into_record(self) -> Option<Record> {
        match self {
            StoredObject::Record(r) => Some(r),
            StoredObject::Share(_) => None,
        }
    }

    /// The share, if this is a share.
    pub fn into_share(self) -> Option<Share> {
        match self {
            StoredObject::Share(s) => Some(s),
            StoredObject::Record(_) => None,
        }
    }
}

impl From<Record> for StoredObject {
    fn from(record: Record) -> Self {
        StoredObject::Record(record)
    }
}

impl From<Share> for StoredObject {
    fn from(share: Share) -> Self {
        StoredObject::Share(share)
    }
}

/// Filter applied by a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Match every record of the type.
    All,
    /// Match records whose field equals the value.
    FieldEquals(String, FieldValue),
}

impl Predicate {
    /// Whether `record` satisfies the predicate.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::FieldEquals(key, value) => record.get(key) == Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ZoneId {
        ZoneId::owned("ItemsZone")
    }

    #[test]
    fn share_for_root_lives_in_root_zone() {
        let root = RecordId::new("root", zone());
        let share = Share::for_root(&root);

        assert_eq!(share.root, root);
        assert_eq!(share.id.zone_id, root.zone_id);
        assert_ne!(share.id, root);
        assert_eq!(share.id, Share::for_root(&root).id);
        assert_eq!(share.id.record_name, "root.share");
        assert_eq!(share.public_permission, Permission::ReadWrite);
    }

    #[test]
    fn stored_object_id_and_conversions() {
        let record = Record::new(RecordId::new("r", zone()), "Item");
        let obj = StoredObject::from(record.clone());

        assert_eq!(obj.id(), &record.id);
        assert!(obj.clone().into_share().is_none());
        assert_eq!(obj.into_record(), Some(record));
    }

    #[test]
    fn predicate_field_equals() {
        let mut record = Record::new(RecordId::new("r", zone()), "Item");
        record.set("isShare", FieldValue::Int(1));

        assert!(Predicate::All.matches(&record));
        assert!(Predicate::FieldEquals("isShare".into(), FieldValue::Int(1)).matches(&record));
        assert!(!Predicate::FieldEquals("isShare".into(), FieldValue::Int(0)).matches(&record));
        assert!(!Predicate::FieldEquals("name".into(), FieldValue::Int(1)).matches(&record));
    }

    #[test]
    fn field_value_accessors_are_typed() {
        assert_eq!(FieldValue::String("a".into()).as_str(), Some("a"));
        assert_eq!(FieldValue::String("a".into()).as_int(), None);
        assert_eq!(FieldValue::Int(3).as_int(), Some(3));
        assert_eq!(FieldValue::Double(1.5).as_double(), Some(1.5));
        assert_eq!(FieldValue::Int(1).as_double(), None);
    }
}
