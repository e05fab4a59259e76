//! SyncCoordinator - bootstrap driver and fan-out fetch.
//!
//! # Architecture
//!
//! The coordinator feeds events into the pure bootstrap state machine (from
//! sync-core) and interprets the actions it returns by calling the zone and
//! share managers.
//!
//! ```text
//! bootstrap() → BootstrapState::on_event → Action → ZoneManager / ShareManager
//!                      ↑                                      │
//!                      └────────────── Event ─────────────────┘
//! ```
//!
//! Each step is retried with bounded backoff. When a step gives up the
//! machine parks in `Failed`; the next `bootstrap()` resumes from the last
//! completed step.

use itemsync_core::{
    merge_batches, Action, BootstrapEvent, BootstrapPhase, BootstrapState, BootstrapStep, Event,
    ReadyContext, ReadyQueue, RetryPolicy, ScopedBatch,
};
use itemsync_types::{Item, Predicate, Scope, ZoneId};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::backend::{bounded, RecordBackend};
use crate::config::SyncConfig;
use crate::error::ClientError;
use crate::share::ShareManager;
use crate::store::IdentifierStore;
use crate::zone::ZoneManager;

/// Work deferred until the engine is ready.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Drives the bootstrap pipeline and reads items across scopes.
pub struct SyncCoordinator<B, S> {
    backend: Arc<B>,
    zones: ZoneManager<B>,
    shares: ShareManager<B, S>,
    state: Mutex<BootstrapState>,
    ready_queue: Mutex<ReadyQueue<ReadyCallback>>,
    phase_tx: watch::Sender<BootstrapPhase>,
    bootstrap_lock: tokio::sync::Mutex<()>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    item_type: String,
    workers: usize,
}

impl<B, S> SyncCoordinator<B, S>
where
    B: RecordBackend + 'static,
    S: IdentifierStore + 'static,
{
    /// Create a coordinator in the Uninitialized state.
    pub fn new(config: &SyncConfig, backend: Arc<B>, store: Arc<S>) -> Self {
        let timeout = config.call_timeout();
        let (phase_tx, _) = watch::channel(BootstrapPhase::Uninitialized);

        Self {
            zones: ZoneManager::new(backend.clone(), config.zone.name.clone(), timeout),
            shares: ShareManager::new(
                backend.clone(),
                store,
                config.root_record_name(),
                config.records.root_record_type.clone(),
                timeout,
            ),
            backend,
            state: Mutex::new(BootstrapState::new()),
            ready_queue: Mutex::new(ReadyQueue::new()),
            phase_tx,
            bootstrap_lock: tokio::sync::Mutex::new(()),
            retry: config.retry_policy(),
            timeout,
            item_type: config.records.item_type.clone(),
            workers: config.workers(),
        }
    }

    fn state(&self) -> MutexGuard<'_, BootstrapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready_queue(&self) -> MutexGuard<'_, ReadyQueue<ReadyCallback>> {
        self.ready_queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current bootstrap phase.
    pub fn phase(&self) -> BootstrapPhase {
        self.state().phase()
    }

    /// Watch bootstrap phase changes.
    pub fn phase_receiver(&self) -> watch::Receiver<BootstrapPhase> {
        self.phase_tx.subscribe()
    }

    /// Snapshot of the ready context, once ready.
    pub fn context(&self) -> Option<ReadyContext> {
        self.state().context().cloned()
    }

    /// The ready context, or [`ClientError::NotReady`].
    pub fn require_ready(&self) -> Result<ReadyContext, ClientError> {
        self.context().ok_or(ClientError::NotReady)
    }

    /// The zone manager.
    pub fn zones(&self) -> &ZoneManager<B> {
        &self.zones
    }

    /// The share manager.
    pub fn shares(&self) -> &ShareManager<B, S> {
        &self.shares
    }

    /// Run the bootstrap pipeline until ready or a step gives up.
    ///
    /// Calling this when already ready returns the context without backend
    /// calls. After a failure, calling it again resumes from the last
    /// completed step.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BootstrapFailed`] naming the step that
    /// exhausted its retries.
    pub async fn bootstrap(&self) -> Result<ReadyContext, ClientError> {
        let _guard = self.bootstrap_lock.lock().await;
        tracing::debug!("Bootstrap starting from {:?}", self.phase());

        let mut pending: VecDeque<Action> = self.apply(Event::Start).into();
        while let Some(action) = pending.pop_front() {
            let event = match action {
                Action::EnsureZone => {
                    let zones = &self.zones;
                    self.run_step(BootstrapStep::Zone, move || async move {
                        let zone = zones.ensure_zone().await?;
                        Ok::<_, ClientError>(Event::ZoneEnsured { zone })
                    })
                    .await
                }
                Action::EnsureRoot { zone } => {
                    let (shares, zone) = (&self.shares, &zone);
                    self.run_step(BootstrapStep::Root, move || async move {
                        let (root, share) = shares.ensure_root(zone).await?;
                        Ok::<_, ClientError>(Event::RootEnsured { root, share })
                    })
                    .await
                }
                Action::EnsureShare { root, known } => {
                    let (shares, root, known) = (&self.shares, &root, &known);
                    self.run_step(BootstrapStep::Share, move || async move {
                        let share = shares.ensure_share(root, known.clone()).await?;
                        Ok::<_, ClientError>(Event::ShareEnsured { share })
                    })
                    .await
                }
                Action::CompleteBootstrap => Event::BootstrapCompleted,
                Action::FlushReadyQueue => {
                    self.flush_ready_queue();
                    continue;
                }
                Action::EmitEvent(event) => {
                    self.emit(event);
                    continue;
                }
            };
            pending.extend(self.apply(event));
        }

        match self.failure() {
            Some(e) => Err(e),
            None => self.require_ready(),
        }
    }

    /// Wait until the engine is ready.
    ///
    /// Returns immediately when already ready.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BootstrapFailed`] when the pipeline parks in
    /// `Failed` instead of hanging.
    pub async fn wait_ready(&self) -> Result<ReadyContext, ClientError> {
        let mut phases = self.phase_tx.subscribe();
        loop {
            let phase = *phases.borrow_and_update();
            match phase {
                BootstrapPhase::Ready => return self.require_ready(),
                BootstrapPhase::Failed => {
                    if let Some(e) = self.failure() {
                        return Err(e);
                    }
                }
                _ => {}
            }
            if phases.changed().await.is_err() {
                return Err(ClientError::NotReady);
            }
        }
    }

    /// Run `callback` once the engine is ready.
    ///
    /// Callbacks registered before ready run exactly once, in registration
    /// order, when the pipeline completes. Once ready they run immediately.
    pub fn run_after_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let immediate = self.ready_queue().register(Box::new(callback));
        if let Some(callback) = immediate {
            callback();
        }
    }

    /// Read all items from the private zone and every shared zone.
    ///
    /// Shared zones are queried concurrently through a fixed-size worker
    /// pool. Undecodable records and failing zones are dropped with a log
    /// entry; the merged list is ordered by creation timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotReady`] before the bootstrap completed.
    pub async fn fetch_all(&self) -> Result<Vec<Item>, ClientError> {
        let context = self.require_ready()?;

        let (private, shared) = tokio::join!(
            query_zone(
                self.backend.clone(),
                Scope::Private,
                context.zone.id.clone(),
                self.item_type.clone(),
                self.timeout,
            ),
            self.fetch_shared(),
        );

        let outcome = merge_batches(private.into_iter().chain(shared));
        for dropped in &outcome.dropped {
            tracing::warn!("Dropping record {}: {}", dropped.id, dropped.error);
        }
        tracing::info!(
            "Fetched {} items ({} dropped)",
            outcome.items.len(),
            outcome.dropped.len()
        );
        Ok(outcome.items)
    }

    /// Query every shared zone, at most `workers` at a time.
    async fn fetch_shared(&self) -> Vec<ScopedBatch> {
        let zones = match bounded(self.timeout, self.backend.list_zones(Scope::Shared)).await {
            Ok(zones) => zones,
            Err(e) => {
                tracing::warn!("Failed to list shared zones: {}", e);
                return Vec::new();
            }
        };

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut workers = JoinSet::new();
        for zone in zones {
            let permits = permits.clone();
            let backend = self.backend.clone();
            let record_type = self.item_type.clone();
            let timeout = self.timeout;
            workers.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                query_zone(backend, Scope::Shared, zone.id, record_type, timeout).await
            });
        }

        let mut batches = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(batch)) => batches.push(batch),
                Ok(None) => {}
                Err(e) => tracing::warn!("Shared zone worker failed: {}", e),
            }
        }
        batches
    }

    /// The error of a parked pipeline.
    fn failure(&self) -> Option<ClientError> {
        match &*self.state() {
            BootstrapState::Failed { step, error, .. } => Some(ClientError::BootstrapFailed {
                step: *step,
                error: error.clone(),
            }),
            _ => None,
        }
    }

    /// Feed `event` to the state machine and publish the new phase.
    fn apply(&self, event: Event) -> Vec<Action> {
        let mut state = self.state();
        let (next, actions) = std::mem::take(&mut *state).on_event(event);
        *state = next;
        self.phase_tx.send_replace(state.phase());
        actions
    }

    /// Run one bootstrap step, retrying transient failures.
    async fn run_step<F, Fut>(&self, step: BootstrapStep, mut attempt_step: F) -> Event
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Event, ClientError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_step().await {
                Ok(event) => return event,
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Bootstrap {} attempt {} failed: {}, retrying in {:?}",
                        step,
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("Bootstrap {} gave up after {} attempts: {}", step, attempt, e);
                    return Event::StepFailed {
                        step,
                        error: e.to_string(),
                    };
                }
            }
        }
    }

    fn flush_ready_queue(&self) {
        let callbacks = self.ready_queue().open();
        tracing::debug!("Running {} deferred callbacks", callbacks.len());
        for callback in callbacks {
            callback();
        }
    }

    fn emit(&self, event: BootstrapEvent) {
        match event {
            BootstrapEvent::StepCompleted(step) => {
                tracing::info!("Bootstrap step completed: {}", step);
            }
            BootstrapEvent::Ready => tracing::info!("Bootstrap complete, engine ready"),
            BootstrapEvent::Stalled { step, error } => {
                tracing::error!("Bootstrap stalled at {}: {}", step, error);
            }
        }
    }
}

/// Query one zone for items. Failures drop the zone or the record.
async fn query_zone<B: RecordBackend>(
    backend: Arc<B>,
    scope: Scope,
    zone: ZoneId,
    record_type: String,
    timeout: Option<Duration>,
) -> Option<ScopedBatch> {
    let rows = match bounded(
        timeout,
        backend.query(scope, &record_type, &Predicate::All, &zone),
    )
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("Query of {} zone {} failed: {}", scope.as_str(), zone, e);
            return None;
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Dropping unreadable record in {}: {}", zone, e),
        }
    }
    tracing::debug!("Zone {} returned {} records", zone, records.len());
    Some(ScopedBatch::new(scope, records))
}
