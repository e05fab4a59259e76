//! # sync-client
//!
//! Record synchronization and sharing engine for itemsync.
//!
//! This is the main library that applications use to keep items in sync.
//!
//! ## Features
//!
//! - **Sharing Hierarchy**: one zone, one root record, one share; shared
//!   items are children of the root
//! - **Resumable Bootstrap**: bounded retries per step, driven by the pure
//!   state machine in sync-core
//! - **Fan-out Fetch**: private and shared zones queried concurrently and
//!   merged in creation order
//! - **Backend Abstraction**: pluggable record store (in-memory for tests)
//! - **Change Notifications**: typed topics for local and remote changes
//!
//! ## Example
//!
//! ```ignore
//! use itemsync_client::{MemoryBackend, MemoryIdentifierStore, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(SyncConfig::default(), MemoryBackend::new(), MemoryIdentifierStore::new());
//! engine.bootstrap().await?;
//!
//! // Add a shared item
//! engine.repository().add(Item::new("milk", true)).await?;
//!
//! // Read everything, own and shared with us
//! let items = engine.repository().list().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod repository;
pub mod share;
pub mod store;
pub mod zone;

pub use backend::{BackendError, BatchResult, MemoryBackend, Operation, QueryResult, RecordBackend};
pub use config::{ConfigError, SyncConfig};
pub use coordinator::{ReadyCallback, SyncCoordinator};
pub use engine::SyncEngine;
pub use error::ClientError;
pub use notifier::{ChangeNotifier, Subscription};
pub use repository::ItemRepository;
pub use share::ShareManager;
pub use store::{
    FileIdentifierStore, IdentifierKey, IdentifierStore, MemoryIdentifierStore, StoreError,
};
pub use zone::ZoneManager;
