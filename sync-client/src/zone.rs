//! Items zone resolution.

use itemsync_types::{Scope, Zone};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::{bounded, BackendError, RecordBackend};
use crate::error::ClientError;

/// Ensures the items zone exists in the private scope.
///
/// The resolved zone is cached, so repeated calls make no further backend
/// calls and converge on one zone.
pub struct ZoneManager<B> {
    backend: Arc<B>,
    zone_name: String,
    timeout: Option<Duration>,
    zone: Mutex<Option<Zone>>,
}

impl<B: RecordBackend> ZoneManager<B> {
    /// Create a manager for the zone named `zone_name`.
    pub fn new(backend: Arc<B>, zone_name: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            backend,
            zone_name: zone_name.into(),
            timeout,
            zone: Mutex::new(None),
        }
    }

    /// Name of the managed zone.
    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    /// The resolved zone, if already resolved.
    pub fn cached(&self) -> Option<Zone> {
        self.zone
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Find the items zone, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ZoneUnavailable`] when listing or creating
    /// fails, or [`ClientError::Timeout`] when a call stalls.
    pub async fn ensure_zone(&self) -> Result<Zone, ClientError> {
        if let Some(zone) = self.cached() {
            return Ok(zone);
        }

        let zone = self.resolve().await.map_err(|e| {
            tracing::warn!("Failed to ensure zone {}: {}", self.zone_name, e);
            match e {
                BackendError::Timeout => ClientError::Timeout,
                other => ClientError::ZoneUnavailable(other.to_string()),
            }
        })?;

        *self.zone.lock().unwrap_or_else(PoisonError::into_inner) = Some(zone.clone());
        Ok(zone)
    }

    async fn resolve(&self) -> Result<Zone, BackendError> {
        let zones = bounded(self.timeout, self.backend.list_zones(Scope::Private)).await?;
        if let Some(zone) = zones.into_iter().find(|z| z.name() == self.zone_name) {
            tracing::debug!("Found existing zone {}", zone.id);
            return Ok(zone);
        }

        let zone = bounded(self.timeout, self.backend.create_zone(&self.zone_name)).await?;
        tracing::info!("Created zone {}", zone.id);
        Ok(zone)
    }
}
