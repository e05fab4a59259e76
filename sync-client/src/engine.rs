//! SyncEngine - the main interface for itemsync.
//!
//! This module provides [`SyncEngine`], the primary API for applications
//! to keep a list of items synchronized and shared through a remote record
//! store.
//!
//! # Architecture
//!
//! SyncEngine wires the bootstrap coordinator, the item repository and the
//! change notifier around one backend and one identifier store.
//!
//! ```text
//! Application → SyncEngine → ItemRepository → RecordBackend → Remote store
//!                   ↓               ↓
//!           SyncCoordinator   ChangeNotifier → subscribers
//!                   ↓
//!      sync-core (pure state machine)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use itemsync_client::{MemoryBackend, MemoryIdentifierStore, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(SyncConfig::default(), MemoryBackend::new(), MemoryIdentifierStore::new());
//!
//! engine.bootstrap().await?;
//! let id = engine.repository().add(Item::new("milk", true)).await?;
//! let items = engine.repository().list().await?;
//! ```

use itemsync_core::{BootstrapPhase, ReadyContext};
use itemsync_types::{RemoteChangeSignal, Topic};
use std::sync::Arc;
use tokio::sync::watch;

use crate::backend::RecordBackend;
use crate::config::SyncConfig;
use crate::coordinator::SyncCoordinator;
use crate::error::ClientError;
use crate::notifier::{ChangeNotifier, Subscription};
use crate::repository::ItemRepository;
use crate::store::IdentifierStore;

/// Item sync engine.
pub struct SyncEngine<B, S> {
    config: SyncConfig,
    backend: Arc<B>,
    coordinator: Arc<SyncCoordinator<B, S>>,
    repository: ItemRepository<B, S>,
    notifier: ChangeNotifier,
}

impl<B, S> SyncEngine<B, S>
where
    B: RecordBackend + 'static,
    S: IdentifierStore + 'static,
{
    /// Create an engine. Nothing touches the backend until [`bootstrap`].
    ///
    /// [`bootstrap`]: SyncEngine::bootstrap
    pub fn new(config: SyncConfig, backend: B, store: S) -> Self {
        let backend = Arc::new(backend);
        let coordinator = Arc::new(SyncCoordinator::new(
            &config,
            backend.clone(),
            Arc::new(store),
        ));
        let notifier = ChangeNotifier::new(config.notifier.capacity);
        let repository =
            ItemRepository::new(&config, backend.clone(), coordinator.clone(), notifier.clone());

        Self {
            config,
            backend,
            coordinator,
            repository,
            notifier,
        }
    }

    /// Run the bootstrap pipeline (zone, root record, share).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BootstrapFailed`] when a step exhausted its
    /// retries; calling again resumes.
    pub async fn bootstrap(&self) -> Result<ReadyContext, ClientError> {
        self.coordinator.bootstrap().await
    }

    /// Wait until the engine is ready, or fail if the bootstrap gave up.
    pub async fn wait_ready(&self) -> Result<ReadyContext, ClientError> {
        self.coordinator.wait_ready().await
    }

    /// Run `callback` once the engine is ready (immediately if it is).
    pub fn run_after_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.coordinator.run_after_ready(callback);
    }

    /// Current bootstrap phase.
    pub fn phase(&self) -> BootstrapPhase {
        self.coordinator.phase()
    }

    /// Watch bootstrap phase changes.
    pub fn phase_receiver(&self) -> watch::Receiver<BootstrapPhase> {
        self.coordinator.phase_receiver()
    }

    /// Check if item operations may run.
    pub fn is_ready(&self) -> bool {
        self.phase() == BootstrapPhase::Ready
    }

    /// Item operations.
    pub fn repository(&self) -> &ItemRepository<B, S> {
        &self.repository
    }

    /// The bootstrap coordinator.
    pub fn coordinator(&self) -> &SyncCoordinator<B, S> {
        &self.coordinator
    }

    /// The change notifier.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Subscribe to `topic` on the change notifier.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.notifier.subscribe(topic)
    }

    /// Ingest a remote push signal; see [`ChangeNotifier::on_remote_change_signal`].
    pub fn on_remote_change_signal(&self, signal: &RemoteChangeSignal) -> bool {
        self.notifier.on_remote_change_signal(signal)
    }

    /// Ingest a raw JSON push payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DecodeFailed`] for a malformed payload.
    pub fn on_remote_payload(&self, payload: &str) -> Result<bool, ClientError> {
        let signal = RemoteChangeSignal::from_json(payload)?;
        Ok(self.on_remote_change_signal(&signal))
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
