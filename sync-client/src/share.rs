//! Root-sharing record and share resolution.
//!
//! Every shared item is a child of one well-known root record, and one share
//! bound to that root governs access to all of them. The ids of both are
//! persisted through the [`IdentifierStore`] so a restart reuses them.

use itemsync_types::{Item, Permission, Record, RecordId, Scope, Share, StoredObject, Zone};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{bounded, into_saved, BackendError, RecordBackend};
use crate::error::ClientError;
use crate::store::{IdentifierKey, IdentifierStore};

/// Resolves or creates the root record and its share.
pub struct ShareManager<B, S> {
    backend: Arc<B>,
    store: Arc<S>,
    root_name: String,
    root_type: String,
    timeout: Option<Duration>,
}

impl<B: RecordBackend, S: IdentifierStore> ShareManager<B, S> {
    /// Create a manager.
    ///
    /// `root_name` is the well-known record name of the root, `root_type`
    /// its record type.
    pub fn new(
        backend: Arc<B>,
        store: Arc<S>,
        root_name: impl Into<String>,
        root_type: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            store,
            root_name: root_name.into(),
            root_type: root_type.into(),
            timeout,
        }
    }

    /// Well-known id of the root record in `zone`.
    pub fn root_record_id(&self, zone: &Zone) -> RecordId {
        RecordId::new(self.root_name.clone(), zone.id.clone())
    }

    /// Resolve the root record, creating it (with its share) when absent.
    ///
    /// The persisted id is tried first, then the well-known id. A root that
    /// no longer exists is recreated. Returns the share as well when it was
    /// created in the same batch.
    ///
    /// # Errors
    ///
    /// Fails on backend errors other than `NotFound`, and on store errors.
    pub async fn ensure_root(&self, zone: &Zone) -> Result<(Record, Option<Share>), ClientError> {
        let persisted = self.store.get(IdentifierKey::RootRecord).await?;
        let candidate = persisted
            .clone()
            .unwrap_or_else(|| self.root_record_id(zone));

        match bounded(self.timeout, self.backend.fetch(Scope::Private, &candidate)).await {
            Ok(StoredObject::Record(root)) => {
                if persisted.as_ref() != Some(&root.id) {
                    self.store.set(IdentifierKey::RootRecord, &root.id).await?;
                }
                tracing::debug!("Using existing root record {}", root.id);
                return Ok((root, None));
            }
            Ok(StoredObject::Share(_)) => {
                tracing::warn!("Root id {} names a share, recreating root", candidate);
            }
            Err(BackendError::NotFound(_)) => {
                if persisted.is_some() {
                    tracing::warn!("Persisted root record {} is gone, recreating", candidate);
                }
            }
            Err(e) => return Err(e.into()),
        }

        let root = Record::new(self.root_record_id(zone), self.root_type.clone());
        let (root, share) = self.save_root_and_share(root).await?;
        tracing::info!("Created root record {} with share {}", root.id, share.id);
        Ok((root, Some(share)))
    }

    /// Resolve the share bound to `root`.
    ///
    /// Uses `known` when it is bound to `root`. Otherwise the persisted share,
    /// or the one derived from the root when no id was persisted, is fetched
    /// and made read-write; a missing share is created.
    ///
    /// # Errors
    ///
    /// Fails on backend errors other than `NotFound`, and on store errors.
    pub async fn ensure_share(
        &self,
        root: &Record,
        known: Option<Share>,
    ) -> Result<Share, ClientError> {
        if let Some(share) = known.filter(|s| s.root == root.id) {
            return Ok(share);
        }

        let persisted = self.store.get(IdentifierKey::Share).await?;
        let candidate = persisted
            .clone()
            .unwrap_or_else(|| Share::id_for_root(&root.id));

        match bounded(self.timeout, self.backend.fetch(Scope::Private, &candidate)).await {
            Ok(StoredObject::Share(share)) if share.root == root.id => {
                let share = self.grant_read_write(share).await?;
                if persisted.as_ref() != Some(&share.id) {
                    self.store.set(IdentifierKey::Share, &share.id).await?;
                }
                return Ok(share);
            }
            Ok(_) => {
                tracing::warn!("Share {} is not bound to {}", candidate, root.id);
            }
            Err(BackendError::NotFound(_)) => {
                if persisted.is_some() {
                    tracing::warn!("Persisted share {} is gone, recreating", candidate);
                }
            }
            Err(e) => return Err(e.into()),
        }

        let (_, share) = self.save_root_and_share(root.clone()).await?;
        tracing::info!("Created share {} for {}", share.id, root.id);
        Ok(share)
    }

    /// Link `record` to the root when `item` is shared, unlink it otherwise.
    ///
    /// # Errors
    ///
    /// A shared item without a root is [`ClientError::PreconditionFailed`].
    pub fn attach_to_share(
        &self,
        item: &Item,
        record: &mut Record,
        root: Option<&Record>,
    ) -> Result<(), ClientError> {
        if !item.is_shared {
            record.parent = None;
            return Ok(());
        }

        let root = root.ok_or_else(|| {
            ClientError::PreconditionFailed("shared item needs the root record".into())
        })?;
        record.parent = Some(root.id.clone());
        Ok(())
    }

    async fn grant_read_write(&self, mut share: Share) -> Result<Share, ClientError> {
        if share.public_permission == Permission::ReadWrite {
            return Ok(share);
        }

        share.public_permission = Permission::ReadWrite;
        let results = bounded(
            self.timeout,
            self.backend.save_batch(Scope::Private, vec![share.clone().into()]),
        )
        .await?;
        into_saved(results)?;
        tracing::info!("Share {} opened for read-write", share.id);
        Ok(share)
    }

    /// Save `root` and a new share atomically, then persist both ids.
    async fn save_root_and_share(&self, root: Record) -> Result<(Record, Share), ClientError> {
        let share = Share::for_root(&root.id);
        let results = bounded(
            self.timeout,
            self.backend.save_batch(
                Scope::Private,
                vec![root.clone().into(), share.clone().into()],
            ),
        )
        .await?;

        let mut saved = into_saved(results)?;
        let root = saved
            .remove(&root.id)
            .and_then(StoredObject::into_record)
            .unwrap_or(root);
        let share = saved
            .remove(&share.id)
            .and_then(StoredObject::into_share)
            .unwrap_or(share);

        self.store
            .set_all(&[
                (IdentifierKey::RootRecord, root.id.clone()),
                (IdentifierKey::Share, share.id.clone()),
            ])
            .await?;
        Ok((root, share))
    }
}
