//! In-memory record store for testing and demos.
//!
//! Allows seeding shared zones and records, injecting failures, and
//! inspecting call counts and stored objects for verification.

use super::{BackendError, BatchResult, QueryResult, RecordBackend};
use async_trait::async_trait;
use itemsync_types::{
    Predicate, Record, RecordId, Scope, Share, StoredObject, Zone, ZoneId, DEFAULT_OWNER,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Backend operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_zones`
    ListZones,
    /// `create_zone`
    CreateZone,
    /// `fetch`
    Fetch,
    /// `save_record`
    SaveRecord,
    /// `save_batch`
    SaveBatch,
    /// `delete_batch`
    DeleteBatch,
    /// `query`
    Query,
}

/// In-memory record store.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryBackendInner>>,
}

#[derive(Debug, Default)]
struct MemoryBackendInner {
    zones: BTreeMap<Scope, BTreeMap<ZoneId, Zone>>,
    objects: BTreeMap<Scope, BTreeMap<RecordId, StoredObject>>,
    calls: HashMap<Operation, usize>,
    fail_next: HashMap<Operation, VecDeque<BackendError>>,
    stalled: HashSet<Operation>,
    failing_records: HashSet<RecordId>,
    failing_zones: HashSet<ZoneId>,
    rejected_entries: HashSet<RecordId>,
}

impl MemoryBackendInner {
    fn has_zone(&self, scope: Scope, zone: &ZoneId) -> bool {
        self.zones
            .get(&scope)
            .is_some_and(|zones| zones.contains_key(zone))
    }

    fn has_object(&self, scope: Scope, id: &RecordId) -> bool {
        self.objects
            .get(&scope)
            .is_some_and(|objects| objects.contains_key(id))
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryBackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, then apply any injected failure or stall.
    async fn enter(&self, op: Operation) -> Result<(), BackendError> {
        let stalled = {
            let mut inner = self.inner();
            *inner.calls.entry(op).or_default() += 1;

            if let Some(error) = inner.fail_next.get_mut(&op).and_then(VecDeque::pop_front) {
                return Err(error);
            }
            inner.stalled.contains(&op)
        };

        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    /// Add a zone visible in the shared scope (shared with us by `owner`).
    pub fn add_shared_zone(&self, zone_name: &str, owner: &str) -> Zone {
        let zone = Zone::new(ZoneId::new(zone_name, owner));
        self.inner()
            .zones
            .entry(Scope::Shared)
            .or_default()
            .insert(zone.id.clone(), zone.clone());
        zone
    }

    /// Store a record directly, bypassing zone checks.
    pub fn insert_record(&self, scope: Scope, record: Record) {
        self.inner()
            .objects
            .entry(scope)
            .or_default()
            .insert(record.id.clone(), record.into());
    }

    /// Get a stored record.
    pub fn record(&self, scope: Scope, id: &RecordId) -> Option<Record> {
        self.inner()
            .objects
            .get(&scope)
            .and_then(|objects| objects.get(id))
            .cloned()
            .and_then(StoredObject::into_record)
    }

    /// Get a stored share.
    pub fn share(&self, scope: Scope, id: &RecordId) -> Option<Share> {
        self.inner()
            .objects
            .get(&scope)
            .and_then(|objects| objects.get(id))
            .cloned()
            .and_then(StoredObject::into_share)
    }

    /// Number of objects stored in `scope`.
    pub fn object_count(&self, scope: Scope) -> usize {
        self.inner().objects.get(&scope).map_or(0, BTreeMap::len)
    }

    /// Zones in `scope` named `zone_name`.
    pub fn zones_named(&self, scope: Scope, zone_name: &str) -> usize {
        self.inner().zones.get(&scope).map_or(0, |zones| {
            zones.keys().filter(|id| id.zone_name == zone_name).count()
        })
    }

    /// Records in `scope` whose parent is `parent`.
    pub fn children_of(&self, scope: Scope, parent: &RecordId) -> Vec<Record> {
        self.inner().objects.get(&scope).map_or_else(Vec::new, |objects| {
            objects
                .values()
                .filter_map(|object| match object {
                    StoredObject::Record(r) if r.parent.as_ref() == Some(parent) => {
                        Some(r.clone())
                    }
                    _ => None,
                })
                .collect()
        })
    }

    /// How many times `op` was called.
    pub fn calls(&self, op: Operation) -> usize {
        self.inner().calls.get(&op).copied().unwrap_or(0)
    }

    /// Total calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.inner().calls.values().sum()
    }

    /// Cause the next call of `op` to fail with `error`.
    ///
    /// Calling this repeatedly queues several failures.
    pub fn fail_next(&self, op: Operation, error: BackendError) {
        self.inner().fail_next.entry(op).or_default().push_back(error);
    }

    /// Make every call of `op` hang until [`MemoryBackend::resume`].
    pub fn stall(&self, op: Operation) {
        self.inner().stalled.insert(op);
    }

    /// Stop stalling `op` for calls made from now on.
    pub fn resume(&self, op: Operation) {
        self.inner().stalled.remove(&op);
    }

    /// Make queries report a per-record failure for `id`.
    pub fn fail_record(&self, id: RecordId) {
        self.inner().failing_records.insert(id);
    }

    /// Make queries against `zone` fail as a whole.
    pub fn fail_zone(&self, zone: ZoneId) {
        self.inner().failing_zones.insert(zone);
    }

    /// Make any batch containing `id` reject that entry (and thus the batch).
    pub fn reject_in_batch(&self, id: RecordId) {
        self.inner().rejected_entries.insert(id);
    }

    /// Clear all state (objects, zones, counters, failures).
    pub fn reset(&self) {
        *self.inner() = MemoryBackendInner::default();
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn list_zones(&self, scope: Scope) -> Result<Vec<Zone>, BackendError> {
        self.enter(Operation::ListZones).await?;
        let inner = self.inner();
        Ok(inner
            .zones
            .get(&scope)
            .map(|zones| zones.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_zone(&self, name: &str) -> Result<Zone, BackendError> {
        self.enter(Operation::CreateZone).await?;
        let zone = Zone::new(ZoneId::new(name, DEFAULT_OWNER));
        let mut inner = self.inner();
        let zones = inner.zones.entry(Scope::Private).or_default();
        Ok(zones.entry(zone.id.clone()).or_insert(zone).clone())
    }

    async fn fetch(&self, scope: Scope, id: &RecordId) -> Result<StoredObject, BackendError> {
        self.enter(Operation::Fetch).await?;
        self.inner()
            .objects
            .get(&scope)
            .and_then(|objects| objects.get(id))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn save_record(&self, scope: Scope, record: Record) -> Result<Record, BackendError> {
        self.enter(Operation::SaveRecord).await?;
        let mut inner = self.inner();
        if !inner.has_zone(scope, record.zone_id()) {
            return Err(BackendError::NotFound(format!("zone {}", record.zone_id())));
        }
        if let Some(parent) = &record.parent {
            if !inner.has_object(scope, parent) {
                return Err(BackendError::Rejected(format!("unknown parent {}", parent)));
            }
        }
        inner
            .objects
            .entry(scope)
            .or_default()
            .insert(record.id.clone(), record.clone().into());
        Ok(record)
    }

    async fn save_batch(
        &self,
        scope: Scope,
        objects: Vec<StoredObject>,
    ) -> Result<BatchResult, BackendError> {
        self.enter(Operation::SaveBatch).await?;
        let mut inner = self.inner();

        let in_batch: HashSet<RecordId> = objects.iter().map(|o| o.id().clone()).collect();
        let known = |inner: &MemoryBackendInner, id: &RecordId| {
            in_batch.contains(id) || inner.has_object(scope, id)
        };

        let mut results = BatchResult::new();
        let mut rejected = false;
        for object in &objects {
            let id = object.id().clone();
            let verdict = if inner.rejected_entries.contains(&id) {
                Err(BackendError::Rejected(format!("entry {} refused", id)))
            } else if !inner.has_zone(scope, &id.zone_id) {
                Err(BackendError::NotFound(format!("zone {}", id.zone_id)))
            } else {
                match object {
                    StoredObject::Share(share) if !known(&*inner, &share.root) => Err(
                        BackendError::Rejected(format!("share root {} missing", share.root)),
                    ),
                    StoredObject::Record(Record {
                        parent: Some(parent),
                        ..
                    }) if !known(&*inner, parent) => Err(BackendError::Rejected(format!(
                        "unknown parent {}",
                        parent
                    ))),
                    _ => Ok(object.clone()),
                }
            };
            rejected |= verdict.is_err();
            results.insert(id, verdict);
        }

        if rejected {
            // Atomic: nothing is applied, untouched entries report the abort.
            for result in results.values_mut() {
                if result.is_ok() {
                    *result = Err(BackendError::Rejected("batch aborted".into()));
                }
            }
            return Ok(results);
        }

        let stored = inner.objects.entry(scope).or_default();
        for object in objects {
            stored.insert(object.id().clone(), object);
        }
        Ok(results)
    }

    async fn delete_batch(&self, scope: Scope, ids: Vec<RecordId>) -> Result<(), BackendError> {
        self.enter(Operation::DeleteBatch).await?;
        let mut inner = self.inner();
        if let Some(objects) = inner.objects.get_mut(&scope) {
            for id in &ids {
                objects.remove(id);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        scope: Scope,
        record_type: &str,
        predicate: &Predicate,
        zone: &ZoneId,
    ) -> Result<QueryResult, BackendError> {
        self.enter(Operation::Query).await?;
        let inner = self.inner();

        if inner.failing_zones.contains(zone) {
            return Err(BackendError::Unavailable(format!("zone {} unreachable", zone)));
        }
        if !inner.has_zone(scope, zone) {
            return Err(BackendError::NotFound(format!("zone {}", zone)));
        }

        let Some(objects) = inner.objects.get(&scope) else {
            return Ok(Vec::new());
        };

        Ok(objects
            .values()
            .filter_map(|object| match object {
                StoredObject::Record(r)
                    if r.zone_id() == zone
                        && r.record_type == record_type
                        && predicate.matches(r) =>
                {
                    Some(r)
                }
                _ => None,
            })
            .map(|record| {
                if inner.failing_records.contains(&record.id) {
                    Err(BackendError::Unavailable(format!(
                        "record {} could not be fetched",
                        record.id
                    )))
                } else {
                    Ok(record.clone())
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemsync_types::{Item, ITEM_RECORD_TYPE};

    fn item_record(zone: &ZoneId, title: &str, timestamp: f64) -> Record {
        Item::with_timestamp(title, false, timestamp)
            .to_record(RecordId::random(zone.clone()), ITEM_RECORD_TYPE)
    }

    // ===========================================
    // Zone Tests
    // ===========================================

    #[tokio::test]
    async fn create_zone_is_idempotent() {
        let backend = MemoryBackend::new();

        let a = backend.create_zone("ItemsZone").await.unwrap();
        let b = backend.create_zone("ItemsZone").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(backend.zones_named(Scope::Private, "ItemsZone"), 1);
        assert_eq!(backend.list_zones(Scope::Private).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn shared_zones_listed_separately() {
        let backend = MemoryBackend::new();
        backend.create_zone("ItemsZone").await.unwrap();
        backend.add_shared_zone("ItemsZone", "alice");

        let shared = backend.list_zones(Scope::Shared).await.unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].id.owner_name, "alice");
    }

    // ===========================================
    // Record Tests
    // ===========================================

    #[tokio::test]
    async fn save_requires_zone() {
        let backend = MemoryBackend::new();
        let record = item_record(&ZoneId::owned("ItemsZone"), "a", 1.0);

        let result = backend.save_record(Scope::Private, record).await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn save_then_fetch() {
        let backend = MemoryBackend::new();
        let zone = backend.create_zone("ItemsZone").await.unwrap();
        let record = item_record(&zone.id, "a", 1.0);

        backend.save_record(Scope::Private, record.clone()).await.unwrap();
        let fetched = backend.fetch(Scope::Private, &record.id).await.unwrap();

        assert_eq!(fetched.into_record(), Some(record.clone()));
        assert!(matches!(
            backend.fetch(Scope::Shared, &record.id).await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn batch_with_missing_root_is_atomic() {
        let backend = MemoryBackend::new();
        let zone = backend.create_zone("ItemsZone").await.unwrap();
        let record = item_record(&zone.id, "a", 1.0);
        let orphan_share = Share::for_root(&RecordId::new("nope", zone.id.clone()));

        let results = backend
            .save_batch(Scope::Private, vec![record.into(), orphan_share.into()])
            .await
            .unwrap();

        assert!(results.values().all(Result::is_err));
        assert_eq!(backend.object_count(Scope::Private), 0);
    }

    #[tokio::test]
    async fn batch_saves_root_share_and_child_together() {
        let backend = MemoryBackend::new();
        let zone = backend.create_zone("ItemsZone").await.unwrap();
        let root = Record::new(RecordId::new("root", zone.id.clone()), ITEM_RECORD_TYPE);
        let share = Share::for_root(&root.id);
        let mut child = item_record(&zone.id, "child", 1.0);
        child.parent = Some(root.id.clone());

        let results = backend
            .save_batch(
                Scope::Private,
                vec![root.clone().into(), share.clone().into(), child.into()],
            )
            .await
            .unwrap();

        assert!(results.values().all(Result::is_ok));
        assert_eq!(backend.object_count(Scope::Private), 3);
        assert_eq!(backend.children_of(Scope::Private, &root.id).len(), 1);
        assert_eq!(backend.share(Scope::Private, &share.id), Some(share));
    }

    #[tokio::test]
    async fn delete_removes_records() {
        let backend = MemoryBackend::new();
        let zone = backend.create_zone("ItemsZone").await.unwrap();
        let record = item_record(&zone.id, "a", 1.0);
        backend.save_record(Scope::Private, record.clone()).await.unwrap();

        backend
            .delete_batch(Scope::Private, vec![record.id.clone()])
            .await
            .unwrap();

        assert!(backend.record(Scope::Private, &record.id).is_none());
    }

    // ===========================================
    // Query Tests
    // ===========================================

    #[tokio::test]
    async fn query_filters_by_zone_and_type() {
        let backend = MemoryBackend::new();
        let zone = backend.create_zone("ItemsZone").await.unwrap();
        let other = backend.create_zone("Other").await.unwrap();
        backend.insert_record(Scope::Private, item_record(&zone.id, "a", 1.0));
        backend.insert_record(Scope::Private, item_record(&other.id, "b", 2.0));
        backend.insert_record(
            Scope::Private,
            Record::new(RecordId::new("root", zone.id.clone()), "Root"),
        );

        let rows = backend
            .query(Scope::Private, ITEM_RECORD_TYPE, &Predicate::All, &zone.id)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn query_reports_per_record_failures() {
        let backend = MemoryBackend::new();
        let zone = backend.create_zone("ItemsZone").await.unwrap();
        let bad = item_record(&zone.id, "bad", 1.0);
        backend.insert_record(Scope::Private, item_record(&zone.id, "good", 2.0));
        backend.insert_record(Scope::Private, bad.clone());
        backend.fail_record(bad.id);

        let rows = backend
            .query(Scope::Private, ITEM_RECORD_TYPE, &Predicate::All, &zone.id)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows.iter().filter(|r| r.is_err()).count(), 1);
    }

    // ===========================================
    // Failure Injection Tests
    // ===========================================

    #[tokio::test]
    async fn fail_next_applies_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(Operation::ListZones, BackendError::Unavailable("down".into()));

        assert!(backend.list_zones(Scope::Private).await.is_err());
        assert!(backend.list_zones(Scope::Private).await.is_ok());
        assert_eq!(backend.calls(Operation::ListZones), 2);
    }

    #[tokio::test]
    async fn failing_zone_fails_query() {
        let backend = MemoryBackend::new();
        let zone = backend.add_shared_zone("ItemsZone", "bob");
        backend.fail_zone(zone.id.clone());

        let result = backend
            .query(Scope::Shared, ITEM_RECORD_TYPE, &Predicate::All, &zone.id)
            .await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[tokio::test]
    async fn clone_shares_state_and_reset_clears() {
        let backend = MemoryBackend::new();
        let handle = backend.clone();
        backend.create_zone("ItemsZone").await.unwrap();

        assert_eq!(handle.zones_named(Scope::Private, "ItemsZone"), 1);

        handle.reset();
        assert_eq!(backend.zones_named(Scope::Private, "ItemsZone"), 0);
        assert_eq!(backend.total_calls(), 0);
    }
}
