//! Remote record store abstraction for itemsync.
//!
//! This module provides the capability contract the engine relies on. The
//! remote service itself (its wire format, authentication, push delivery)
//! lives behind this trait.
//!
//! # Design
//!
//! The backend trait is async and scope-aware:
//! - zones are listed per scope and created in the private scope
//! - records and shares are fetched by id
//! - batch saves are atomic: every entry is saved or none is
//! - queries report success or failure per returned record
//!
//! # Example
//!
//! ```ignore
//! let backend = MemoryBackend::new();
//! let zone = backend.create_zone("ItemsZone").await?;
//! let saved = backend.save_record(Scope::Private, record).await?;
//! let rows = backend.query(Scope::Private, "Item", &Predicate::All, &zone.id).await?;
//! ```

mod memory;

pub use memory::{MemoryBackend, Operation};

use async_trait::async_trait;
use itemsync_types::{Predicate, Record, RecordId, Scope, StoredObject, Zone, ZoneId};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Network or service failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The record or zone does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service refused the write.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The call did not complete in time.
    #[error("backend call timed out")]
    Timeout,
}

/// Per-entry outcome of a batch save, keyed by object id.
pub type BatchResult = BTreeMap<RecordId, Result<StoredObject, BackendError>>;

/// Per-record outcome of a query.
pub type QueryResult = Vec<Result<Record, BackendError>>;

/// Capability contract of the remote record store.
///
/// Implementations handle the underlying service (a cloud record store,
/// an in-memory store for tests, etc).
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// List the zones visible in `scope`.
    async fn list_zones(&self, scope: Scope) -> Result<Vec<Zone>, BackendError>;

    /// Create a zone in the private scope.
    async fn create_zone(&self, name: &str) -> Result<Zone, BackendError>;

    /// Fetch a record or share by id.
    async fn fetch(&self, scope: Scope, id: &RecordId) -> Result<StoredObject, BackendError>;

    /// Save a single record, returning the stored version.
    async fn save_record(&self, scope: Scope, record: Record) -> Result<Record, BackendError>;

    /// Save several objects atomically.
    ///
    /// Either every entry is stored or none is. The per-entry map reports
    /// which entries caused a rejection.
    async fn save_batch(
        &self,
        scope: Scope,
        objects: Vec<StoredObject>,
    ) -> Result<BatchResult, BackendError>;

    /// Delete objects by id.
    async fn delete_batch(&self, scope: Scope, ids: Vec<RecordId>) -> Result<(), BackendError>;

    /// Query records of `record_type` in `zone`.
    async fn query(
        &self,
        scope: Scope,
        record_type: &str,
        predicate: &Predicate,
        zone: &ZoneId,
    ) -> Result<QueryResult, BackendError>;
}

/// Run a backend call with an optional deadline.
pub(crate) async fn bounded<T, F>(limit: Option<Duration>, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| BackendError::Timeout)?,
        None => call.await,
    }
}

/// Turn a batch result into the saved objects, failing on the first rejected
/// entry.
pub(crate) fn into_saved(
    results: BatchResult,
) -> Result<BTreeMap<RecordId, StoredObject>, BackendError> {
    results
        .into_iter()
        .map(|(id, result)| result.map(|object| (id, object)))
        .collect()
}
