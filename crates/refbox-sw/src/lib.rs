//! # RefBox Service Worker
//!
//! The offline core of the RefBox soundboard: versioned cache stores,
//! request routing, fetch strategies, and the install/activate lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! LifecycleController
//!     ├── install  ──► CacheStoreManager::open_current + shell assets
//!     ├── activate ──► CacheStoreManager::purge_stale + Clients::claim
//!     ├── message  ──► SKIP_WAITING / CLEAR_CACHE
//!     └── fetch ──► Router::classify
//!                       ├── PassThrough       (non-HTTP(S))
//!                       ├── NetworkOnly       (form endpoint)
//!                       ├── NetworkFirst      (refs listing)
//!                       ├── MediaNetworkOnly  (audio assets)
//!                       └── CacheFirst        (app shell)
//! ```
//!
//! Every intercepted request resolves to *some* response: network failures
//! become cache fallbacks or fixed synthetic payloads, never rejections.

use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod config;
pub mod lifecycle;
pub mod router;
pub mod strategy;
pub mod testing;

pub use cache::{Cache, CacheEntry, CacheStorage, CacheStoreManager, PurgeReport};
pub use clients::{Client, Clients};
pub use config::SwConfig;
pub use lifecycle::{ClientMessage, LifecycleController, LifecycleState, WorkerEvent};
pub use router::{classify, RoutePolicy, Router};
pub use strategy::FetchResponse;

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone)]
pub enum ServiceWorkerError {
    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<ServiceWorkerError> for refbox_common::RefBoxError {
    fn from(e: ServiceWorkerError) -> Self {
        match e {
            ServiceWorkerError::InstallFailed(m) => refbox_common::RefBoxError::install(m),
            ServiceWorkerError::CacheError(m) => refbox_common::RefBoxError::cache(m),
            ServiceWorkerError::NetworkError(m) => refbox_common::RefBoxError::network(m),
            ServiceWorkerError::StateError(m) => refbox_common::RefBoxError::internal(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_maps_into_common() {
        let e: refbox_common::RefBoxError =
            ServiceWorkerError::InstallFailed("style.css unreachable".to_string()).into();
        assert_eq!(e.category(), "install");

        let e: refbox_common::RefBoxError =
            ServiceWorkerError::CacheError("store gone".to_string()).into();
        assert_eq!(e.category(), "cache");
    }
}
