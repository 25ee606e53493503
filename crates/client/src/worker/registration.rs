//! Page-side registration: which worker controls the page, which one is
//! waiting, and whether an update is available.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};

use super::{CacheWorker, ControlMessage, InstallReport, WorkerHandle, WorkerState, spawn};
use crate::fetch::{Network, Request, Response, ResponseSource};
use folio_core::{CacheDb, Error};

/// Snapshot of a single worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub cache_name: String,
    pub state: WorkerState,
}

impl From<&WorkerHandle> for WorkerStatus {
    fn from(handle: &WorkerHandle) -> Self {
        Self { cache_name: handle.cache_name().to_string(), state: handle.state() }
    }
}

/// Snapshot of the registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationStatus {
    pub controller: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    pub update_available: bool,
    /// Whether the last page request found the network unreachable.
    pub offline: bool,
    /// Cache generations currently in storage.
    pub caches: Vec<String>,
}

/// Tracks the controlling worker and any installed successor.
pub struct Registration {
    db: CacheDb,
    network: Arc<dyn Network>,
    controller: RwLock<Option<WorkerHandle>>,
    waiting: RwLock<Option<WorkerHandle>>,
    update_available: watch::Sender<bool>,
    offline: watch::Sender<bool>,
}

impl Registration {
    pub fn new(db: CacheDb, network: Arc<dyn Network>) -> Self {
        let (update_available, _) = watch::channel(false);
        let (offline, _) = watch::channel(false);
        Self { db, network, controller: RwLock::new(None), waiting: RwLock::new(None), update_available, offline }
    }

    /// Install a worker generation.
    ///
    /// The first worker activates immediately and takes control. Later ones
    /// stay waiting and flag an update until [`Registration::update`].
    pub async fn register(&self, worker: CacheWorker) -> Result<InstallReport, Error> {
        let handle = spawn(worker);
        let report = handle.install().await?;

        let mut controller = self.controller.write().await;
        if controller.is_none() {
            if handle.state() == WorkerState::Waiting {
                handle.activate().await?;
            }
            tracing::info!(cache = %handle.cache_name(), "worker controls the page");
            *controller = Some(handle);
            return Ok(report);
        }
        drop(controller);

        if handle.state() == WorkerState::Active {
            // skip-waiting arrived during install
            self.promote(handle).await;
            return Ok(report);
        }

        let previous = self.waiting.write().await.replace(handle);
        if let Some(previous) = previous {
            tracing::info!(cache = %previous.cache_name(), "superseded waiting worker");
            if let Err(e) = previous.retire().await {
                tracing::warn!(cache = %previous.cache_name(), "failed to retire superseded worker: {e}");
            }
        }
        self.update_available.send_replace(true);
        tracing::info!("update available");
        Ok(report)
    }

    /// Tell the waiting worker to skip waiting and take control.
    ///
    /// Returns `false` when no update is waiting.
    pub async fn update(&self) -> Result<bool, Error> {
        let Some(waiting) = self.waiting.write().await.take() else {
            return Ok(false);
        };

        waiting.post_message(ControlMessage::SkipWaiting).await?;
        waiting.wait_for_state(WorkerState::Active).await?;
        self.promote(waiting).await;
        Ok(true)
    }

    async fn promote(&self, handle: WorkerHandle) {
        tracing::info!(cache = %handle.cache_name(), "worker controls the page");
        let previous = self.controller.write().await.replace(handle);
        if let Some(previous) = previous
            && let Err(e) = previous.retire().await
        {
            tracing::warn!(cache = %previous.cache_name(), "failed to retire previous controller: {e}");
        }
        self.update_available.send_replace(false);
    }

    /// Route a page request through the controller, or straight to the
    /// network when nothing controls the page.
    ///
    /// Network and fallback responses update the offline flag. Cache hits
    /// say nothing about connectivity and leave it alone.
    pub async fn fetch(&self, request: Request) -> Result<Response, Error> {
        let controller = self.controller.read().await.clone();
        let result = match controller {
            Some(handle) if handle.state().can_intercept_fetch() => handle.fetch(request).await,
            _ => self.network.fetch(&request).await,
        };
        self.note_connectivity(&result);
        result
    }

    fn note_connectivity(&self, result: &Result<Response, Error>) {
        let offline = match result {
            Ok(response) => match response.source {
                ResponseSource::Network => false,
                ResponseSource::Fallback => true,
                ResponseSource::Cache => return,
            },
            Err(Error::Network(_)) => true,
            Err(_) => return,
        };
        if self.offline.send_replace(offline) != offline {
            tracing::info!(offline, "connectivity changed");
        }
    }

    /// Delete every cache generation. Returns how many were removed.
    pub async fn clear_cache(&self) -> Result<u64, Error> {
        let removed = self.db.clear_caches().await?;
        tracing::info!(removed, "cleared cache storage");
        Ok(removed)
    }

    /// Retire every worker. Cache storage is left as is.
    pub async fn unregister(&self) -> Result<bool, Error> {
        let controller = self.controller.write().await.take();
        let waiting = self.waiting.write().await.take();
        let found = controller.is_some() || waiting.is_some();
        for handle in controller.into_iter().chain(waiting) {
            handle.retire().await?;
        }
        self.update_available.send_replace(false);
        Ok(found)
    }

    pub fn update_available(&self) -> bool {
        *self.update_available.borrow()
    }

    pub fn subscribe_updates(&self) -> watch::Receiver<bool> {
        self.update_available.subscribe()
    }

    pub fn is_offline(&self) -> bool {
        *self.offline.borrow()
    }

    pub fn subscribe_offline(&self) -> watch::Receiver<bool> {
        self.offline.subscribe()
    }

    pub async fn controller(&self) -> Option<WorkerHandle> {
        self.controller.read().await.clone()
    }

    pub async fn status(&self) -> Result<RegistrationStatus, Error> {
        let controller = self.controller.read().await.as_ref().map(WorkerStatus::from);
        let waiting = self.waiting.read().await.as_ref().map(WorkerStatus::from);
        Ok(RegistrationStatus {
            controller,
            waiting,
            update_available: self.update_available(),
            offline: self.is_offline(),
            caches: self.db.cache_names().await?,
        })
    }
}
