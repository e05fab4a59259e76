//! Item create/read/update/delete against the remote store.
//!
//! Every successful mutation updates the published [`ItemList`] in place
//! and publishes [`Topic::DataChanged`]. Item operations are never retried.

use itemsync_core::ItemList;
use itemsync_types::{Item, RecordId, Scope, StoredObject, Topic};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::backend::{bounded, into_saved, RecordBackend};
use crate::config::SyncConfig;
use crate::coordinator::SyncCoordinator;
use crate::error::ClientError;
use crate::notifier::ChangeNotifier;
use crate::store::IdentifierStore;

/// Item operations.
///
/// All operations need a ready engine; before that they fail with
/// [`ClientError::NotReady`] without touching the backend.
pub struct ItemRepository<B, S> {
    backend: Arc<B>,
    coordinator: Arc<SyncCoordinator<B, S>>,
    notifier: ChangeNotifier,
    items: watch::Sender<ItemList>,
    item_type: String,
    timeout: Option<Duration>,
}

impl<B, S> ItemRepository<B, S>
where
    B: RecordBackend + 'static,
    S: IdentifierStore + 'static,
{
    /// Create a repository.
    pub fn new(
        config: &SyncConfig,
        backend: Arc<B>,
        coordinator: Arc<SyncCoordinator<B, S>>,
        notifier: ChangeNotifier,
    ) -> Self {
        let (items, _) = watch::channel(ItemList::new());
        Self {
            backend,
            coordinator,
            notifier,
            items,
            item_type: config.records.item_type.clone(),
            timeout: config.call_timeout(),
        }
    }

    /// Persist a new item and return its remote id.
    ///
    /// Shared items are saved in one atomic batch together with the root
    /// record and the share.
    ///
    /// # Errors
    ///
    /// [`ClientError::PreconditionFailed`] for an empty title, otherwise the
    /// mapped backend error.
    pub async fn add(&self, item: Item) -> Result<RecordId, ClientError> {
        item.validate()?;
        let context = self.coordinator.require_ready()?;

        let mut record =
            item.to_record(RecordId::random(context.zone.id.clone()), &self.item_type);
        self.coordinator
            .shares()
            .attach_to_share(&item, &mut record, Some(&context.root))?;
        let id = record.id.clone();

        if item.is_shared {
            let batch: Vec<StoredObject> =
                vec![context.root.into(), context.share.into(), record.into()];
            let results =
                bounded(self.timeout, self.backend.save_batch(Scope::Private, batch)).await?;
            into_saved(results)?;
        } else {
            bounded(self.timeout, self.backend.save_record(Scope::Private, record)).await?;
        }
        tracing::info!(
            "Added {} item {}",
            if item.is_shared { "shared" } else { "private" },
            id
        );

        let mut stored = item;
        stored.remote_id = Some(id.clone());
        stored.scope = Scope::Private;
        self.items.send_modify(|list| list.insert(stored));
        self.notifier.publish(Topic::DataChanged);
        Ok(id)
    }

    /// Save the title and shared flag of a persisted item.
    ///
    /// The record is fetched from the item's scope and its parent link is
    /// set or cleared to match the shared flag. Items read from the shared
    /// scope keep their parent, which belongs to another owner.
    ///
    /// # Errors
    ///
    /// [`ClientError::PreconditionFailed`] without a remote id or with an
    /// empty title; no backend call is made in that case.
    pub async fn update(&self, item: &Item) -> Result<(), ClientError> {
        let id = require_remote_id(item)?;
        item.validate()?;
        let context = self.coordinator.require_ready()?;

        let mut record = bounded(self.timeout, self.backend.fetch(item.scope, &id))
            .await?
            .into_record()
            .ok_or_else(|| ClientError::DecodeFailed(format!("{} is not a record", id)))?;
        item.write_fields(&mut record);
        if item.scope == Scope::Private {
            self.coordinator
                .shares()
                .attach_to_share(item, &mut record, Some(&context.root))?;
        }

        bounded(self.timeout, self.backend.save_record(item.scope, record)).await?;
        tracing::info!("Updated item {}", id);

        self.items.send_modify(|list| {
            list.update(item.clone());
        });
        self.notifier.publish(Topic::DataChanged);
        Ok(())
    }

    /// Delete a persisted item from the private scope.
    ///
    /// An item read from the shared scope is only dropped from the published
    /// list; its owner's record is left alone.
    ///
    /// # Errors
    ///
    /// [`ClientError::PreconditionFailed`] without a remote id; no backend
    /// call is made in that case.
    pub async fn delete(&self, item: &Item) -> Result<(), ClientError> {
        let id = require_remote_id(item)?;
        self.coordinator.require_ready()?;
        if item.scope != Scope::Private {
            tracing::warn!(
                "Deleting {} item {} from the private scope; the owner's record is kept",
                item.scope.as_str(),
                id
            );
        }

        bounded(
            self.timeout,
            self.backend.delete_batch(Scope::Private, vec![id.clone()]),
        )
        .await?;
        tracing::info!("Deleted item {}", id);

        self.items.send_modify(|list| {
            list.remove(item);
        });
        self.notifier.publish(Topic::DataChanged);
        Ok(())
    }

    /// Read every item across scopes, ordered by creation time.
    ///
    /// Replaces the published item list.
    pub async fn list(&self) -> Result<Vec<Item>, ClientError> {
        let items = self.coordinator.fetch_all().await?;
        self.items.send_modify(|list| list.replace_all(items.clone()));
        Ok(items)
    }

    /// Observe the published item list.
    pub fn subscribe_items(&self) -> watch::Receiver<ItemList> {
        self.items.subscribe()
    }

    /// Current published item list.
    pub fn snapshot(&self) -> ItemList {
        self.items.borrow().clone()
    }
}

fn require_remote_id(item: &Item) -> Result<RecordId, ClientError> {
    item.remote_id
        .clone()
        .ok_or_else(|| ClientError::PreconditionFailed("item has no remote id".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryBackend, Operation};
    use crate::store::MemoryIdentifierStore;

    struct Fixture {
        backend: MemoryBackend,
        coordinator: Arc<SyncCoordinator<MemoryBackend, MemoryIdentifierStore>>,
        notifier: ChangeNotifier,
        repository: ItemRepository<MemoryBackend, MemoryIdentifierStore>,
    }

    fn fixture() -> Fixture {
        let config = SyncConfig::default().with_retry(1, 0);
        let backend = MemoryBackend::new();
        let shared = Arc::new(backend.clone());
        let coordinator = Arc::new(SyncCoordinator::new(
            &config,
            shared.clone(),
            Arc::new(MemoryIdentifierStore::new()),
        ));
        let notifier = ChangeNotifier::new(8);
        let repository =
            ItemRepository::new(&config, shared, coordinator.clone(), notifier.clone());
        Fixture {
            backend,
            coordinator,
            notifier,
            repository,
        }
    }

    async fn ready_fixture() -> Fixture {
        let f = fixture();
        f.coordinator.bootstrap().await.unwrap();
        f
    }

    #[tokio::test]
    async fn operations_before_ready_fail_without_calls() {
        let f = fixture();

        let result = f.repository.add(Item::new("early", false)).await;

        assert!(matches!(result, Err(ClientError::NotReady)));
        assert!(matches!(f.repository.list().await, Err(ClientError::NotReady)));
        assert_eq!(f.backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn add_rejects_empty_title() {
        let f = ready_fixture().await;
        let calls = f.backend.total_calls();

        let result = f.repository.add(Item::new("  ", true)).await;

        assert!(matches!(result, Err(ClientError::PreconditionFailed(_))));
        assert_eq!(f.backend.total_calls(), calls);
    }

    #[tokio::test]
    async fn add_private_saves_single_record() {
        let f = ready_fixture().await;
        let mut sub = f.notifier.subscribe(Topic::DataChanged);

        let id = f.repository.add(Item::new("milk", false)).await.unwrap();

        let record = f.backend.record(Scope::Private, &id).unwrap();
        assert_eq!(record.parent, None);
        assert_eq!(f.backend.calls(Operation::SaveRecord), 1);
        assert_eq!(sub.try_recv(), Some(Topic::DataChanged));

        let snapshot = f.repository.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.items()[0].remote_id, Some(id));
    }

    #[tokio::test]
    async fn add_shared_links_to_root() {
        let f = ready_fixture().await;
        let root = f.coordinator.context().unwrap().root;

        let id = f.repository.add(Item::new("party", true)).await.unwrap();

        let record = f.backend.record(Scope::Private, &id).unwrap();
        assert_eq!(record.parent, Some(root.id));
    }

    #[tokio::test]
    async fn failed_add_leaves_list_untouched() {
        let f = ready_fixture().await;
        f.backend
            .fail_next(Operation::SaveRecord, BackendError::Unavailable("offline".into()));
        let mut sub = f.notifier.subscribe(Topic::DataChanged);

        let result = f.repository.add(Item::new("lost", false)).await;

        assert!(matches!(result, Err(ClientError::BackendUnavailable(_))));
        assert!(f.repository.snapshot().is_empty());
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn update_and_delete_require_remote_id() {
        let f = ready_fixture().await;
        let calls = f.backend.total_calls();
        let draft = Item::new("draft", false);

        assert!(matches!(
            f.repository.update(&draft).await,
            Err(ClientError::PreconditionFailed(_))
        ));
        assert!(matches!(
            f.repository.delete(&draft).await,
            Err(ClientError::PreconditionFailed(_))
        ));
        assert_eq!(f.backend.total_calls(), calls);
    }

    #[tokio::test]
    async fn update_rewrites_fields_and_list() {
        let f = ready_fixture().await;
        f.repository.add(Item::new("old", false)).await.unwrap();
        let mut item = f.repository.snapshot().items()[0].clone();

        item.title = "new".into();
        f.repository.update(&item).await.unwrap();

        let id = item.remote_id.clone().unwrap();
        let record = f.backend.record(Scope::Private, &id).unwrap();
        let stored = Item::from_record(&record, Scope::Private).unwrap();
        assert_eq!(stored.title, "new");
        assert_eq!(stored.timestamp(), item.timestamp());
        assert_eq!(f.repository.snapshot().items()[0].title, "new");
    }

    #[tokio::test]
    async fn delete_removes_record_and_entry() {
        let f = ready_fixture().await;
        let id = f.repository.add(Item::new("gone", false)).await.unwrap();
        let item = f.repository.snapshot().items()[0].clone();

        f.repository.delete(&item).await.unwrap();

        assert!(f.backend.record(Scope::Private, &id).is_none());
        assert!(f.repository.snapshot().is_empty());
    }

    #[tokio::test]
    async fn list_replaces_published_items() {
        let f = ready_fixture().await;
        let zone = f.coordinator.context().unwrap().zone;
        f.backend.insert_record(
            Scope::Private,
            Item::with_timestamp("seeded", false, 1.0)
                .to_record(RecordId::random(zone.id), "Item"),
        );
        let mut items = f.repository.subscribe_items();

        let listed = f.repository.list().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert!(items.has_changed().unwrap());
        assert_eq!(items.borrow_and_update().items(), listed.as_slice());
    }
}
