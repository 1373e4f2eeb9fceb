//! Lifecycle controller: install, activate, and client control messages.
//!
//! State machine: `Installing → Installed → Activating → Active`, with the
//! terminal failure state `InstallFailed` when any shell asset cannot be
//! cached. Failed work under `waitUntil` semantics means the transition
//! does not complete and a prior version (if any) stays active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::StatusCode;
use refbox_net::{FetchBackend, Request};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::cache::{CacheEntry, CacheStorage, CacheStoreManager};
use crate::clients::Clients;
use crate::config::SwConfig;
use crate::router::Router;
use crate::strategy::FetchResponse;
use crate::ServiceWorkerError;

/// Service worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Initial state, nothing has run yet.
    Parsed,
    /// Install in progress (caching the application shell).
    Installing,
    /// Installed, waiting to activate.
    Installed,
    /// Activation in progress (purging stale stores, claiming clients).
    Activating,
    /// Active and controlling pages.
    Active,
    /// Terminal: a shell asset failed to cache, install aborted.
    InstallFailed,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Parsed
    }
}

/// Control messages posted from a page to the worker.
///
/// Exact wire format: `{"type": "SKIP_WAITING"}` and
/// `{"type": "CLEAR_CACHE"}`. No other fields are read; unknown messages
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Leave the waiting state immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,

    /// Delete every cache store, regardless of version.
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,
}

impl ClientMessage {
    /// Parse a posted message, ignoring anything unrecognized.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// An event delivered to the worker, keyed by kind.
///
/// Using an explicit enum instead of callback registration lets the
/// dispatch be unit tested without a simulated event loop.
#[derive(Debug)]
pub enum WorkerEvent {
    /// The install phase should run.
    Install,
    /// The activate phase should run.
    Activate,
    /// An outgoing request was intercepted.
    Fetch(Request),
    /// A page posted a message.
    Message(serde_json::Value),
}

/// Drives the lifecycle and owns the per-version resources.
pub struct LifecycleController<B: FetchBackend> {
    config: SwConfig,
    router: Router,
    backend: Arc<B>,
    cache: CacheStoreManager,
    clients: Arc<RwLock<Clients>>,
    state: Arc<RwLock<LifecycleState>>,
    skip_waiting_requested: AtomicBool,
}

impl<B: FetchBackend + 'static> LifecycleController<B> {
    /// Create a controller for one worker version over shared storage.
    pub fn new(config: SwConfig, backend: Arc<B>, storage: Arc<RwLock<CacheStorage>>) -> Self {
        let cache = CacheStoreManager::new(config.cache_name(), storage);
        let router = Router::new(config.clone());
        Self {
            config,
            router,
            backend,
            cache,
            clients: Arc::new(RwLock::new(Clients::new())),
            state: Arc::new(RwLock::new(LifecycleState::Parsed)),
            skip_waiting_requested: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// The cache store manager for this version.
    pub fn cache(&self) -> &CacheStoreManager {
        &self.cache
    }

    /// The client registry.
    pub fn clients(&self) -> Arc<RwLock<Clients>> {
        Arc::clone(&self.clients)
    }

    /// Whether install requested immediate activation.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting_requested.load(Ordering::Relaxed)
    }

    async fn set_state(&self, state: LifecycleState) {
        *self.state.write().await = state;
    }

    /// Run the install phase: open the current store and cache every
    /// static asset.
    ///
    /// Atomic: the first asset that fails (network error or non-200
    /// status) aborts the whole install. The partially filled store is
    /// never promoted because activation refuses to run after a failed
    /// install. On success, immediate activation is requested instead of
    /// waiting for all clients to close.
    pub async fn install(&self) -> Result<(), ServiceWorkerError> {
        self.set_state(LifecycleState::Installing).await;
        info!(cache = %self.cache.current_name(), "Install: caching application shell");

        self.cache.open_current().await;

        for path in &self.config.static_assets {
            let url = self.config.base.join(path).map_err(|e| {
                ServiceWorkerError::InstallFailed(format!("invalid asset path {}: {}", path, e))
            })?;
            let request = Request::get(url);
            let key = request.cache_key();

            match self.backend.fetch(request.clone()).await {
                Ok(response) if response.status == StatusCode::OK => {
                    self.cache
                        .put_current(&key, CacheEntry::from_response(&request, &response))
                        .await;
                }
                Ok(response) => {
                    let message =
                        format!("asset {} returned status {}", path, response.status);
                    error!(asset = %path, status = %response.status, "Install aborted");
                    self.set_state(LifecycleState::InstallFailed).await;
                    return Err(ServiceWorkerError::InstallFailed(message));
                }
                Err(e) => {
                    let message = format!("asset {} failed: {}", path, e);
                    error!(asset = %path, error = %e, "Install aborted");
                    self.set_state(LifecycleState::InstallFailed).await;
                    return Err(ServiceWorkerError::InstallFailed(message));
                }
            }
        }

        self.set_state(LifecycleState::Installed).await;
        self.skip_waiting_requested.store(true, Ordering::Relaxed);
        info!(
            assets = self.config.static_assets.len(),
            "Install complete, skip-waiting requested"
        );
        Ok(())
    }

    /// Run the activate phase: purge stale stores and claim all clients.
    pub async fn activate(&self) -> Result<(), ServiceWorkerError> {
        match self.state().await {
            LifecycleState::Installed => {}
            LifecycleState::InstallFailed => {
                return Err(ServiceWorkerError::StateError(
                    "cannot activate after a failed install".to_string(),
                ));
            }
            other => {
                return Err(ServiceWorkerError::StateError(format!(
                    "cannot activate from state {:?}",
                    other
                )));
            }
        }

        self.set_state(LifecycleState::Activating).await;
        info!("Activate: purging stale cache stores");

        let report = self.cache.purge_stale().await;
        if !report.is_clean() {
            warn!(skipped = report.skipped.len(), "Some stale stores were skipped");
        }

        let claimed = self.clients.write().await.claim();
        debug!(claimed, "Clients claimed");

        self.set_state(LifecycleState::Active).await;
        info!(purged = report.deleted.len(), "Activation complete");
        Ok(())
    }

    /// Leave the waiting state immediately, if waiting.
    pub async fn skip_waiting(&self) -> Result<(), ServiceWorkerError> {
        if self.state().await == LifecycleState::Installed {
            self.activate().await
        } else {
            Ok(())
        }
    }

    /// Handle a message posted from a page.
    ///
    /// `CLEAR_CACHE` runs asynchronously; the handler returns without
    /// waiting for the purge to finish.
    pub async fn handle_message(&self, message: serde_json::Value) {
        let Some(parsed) = ClientMessage::parse(&message) else {
            trace!(message = %message, "Ignoring unknown client message");
            return;
        };

        match parsed {
            ClientMessage::SkipWaiting => {
                if let Err(e) = self.skip_waiting().await {
                    error!(error = %e, "Skip waiting failed");
                }
            }
            ClientMessage::ClearCache => {
                let cache = self.cache.clone();
                tokio::spawn(async move {
                    let report = cache.purge_all().await;
                    info!(deleted = report.deleted.len(), "Cache cleared on request");
                });
            }
        }
    }

    /// Single dispatch entry point for all worker events.
    ///
    /// Only a fetch event produces a response; lifecycle and message
    /// failures are logged and never surface to the page.
    pub async fn handle_event(&self, event: WorkerEvent) -> Option<FetchResponse> {
        match event {
            WorkerEvent::Install => {
                let _ = self.install().await;
                None
            }
            WorkerEvent::Activate => {
                let _ = self.activate().await;
                None
            }
            WorkerEvent::Fetch(request) => {
                self.router
                    .handle(self.backend.as_ref(), &self.cache, request)
                    .await
            }
            WorkerEvent::Message(value) => {
                self.handle_message(value).await;
                None
            }
        }
    }
}
