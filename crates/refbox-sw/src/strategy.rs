//! Fetch strategies: cache-first, network-first, network-only.
//!
//! Every strategy resolves to *some* [`FetchResponse`] — a network or cache
//! failure is converted into a fixed synthetic fallback, never propagated to
//! the requesting page.
//!
//! The cache-first check-then-fetch sequence is intentionally not atomic:
//! two concurrent first requests for the same uncached resource may both
//! miss and both hit the network. The duplicate fetch is harmless because
//! the cache write overwrites by key.

use bytes::Bytes;
use hashbrown::HashMap;
use http::StatusCode;
use refbox_net::{FetchBackend, Request, Response};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStoreManager};

/// Fallback HTML served when an uncached shell resource is requested
/// offline.
const OFFLINE_PAGE: &str =
    "<h1>Offline</h1><p>Impossible de charger cette ressource sans connexion.</p>";

/// Fallback payload for the data endpoint when offline with no cache.
const OFFLINE_REFS: &str = r#"{"error":"Offline","refs":[]}"#;

/// Fallback payload when a form submission cannot reach the network.
const SUBMIT_UNAVAILABLE: &str = r#"{"error":"Impossible de soumettre sans connexion"}"#;

/// Fallback body for audio assets when offline.
const MEDIA_UNAVAILABLE: &str = "Audio non disponible offline";

/// The response handed back to the intercepted request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Status code.
    pub status: StatusCode,

    /// Status text.
    pub status_text: String,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Bytes,

    /// Whether this was served from a cache store.
    pub from_cache: bool,
}

impl FetchResponse {
    fn synthetic(status: StatusCode, content_type: &str, body: &'static str) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
            from_cache: false,
        }
    }

    /// Wrap a network response.
    pub fn from_network(response: Response) -> Self {
        let mut headers = HashMap::new();
        for (name, value) in response.headers.iter() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        Self {
            status: response.status,
            status_text: response.status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body: response.into_bytes(),
            from_cache: false,
        }
    }

    /// Rehydrate a cached entry.
    pub fn from_entry(entry: &CacheEntry) -> Self {
        let status = StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK);
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers: entry.headers.clone(),
            body: Bytes::from(entry.body.clone()),
            from_cache: true,
        }
    }

    /// Body decoded as UTF-8 text, lossily.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Minimal HTML page for an uncached shell resource while offline.
    pub fn offline_page() -> Self {
        Self::synthetic(StatusCode::OK, "text/html", OFFLINE_PAGE)
    }

    /// Empty-result JSON payload for the data endpoint while offline.
    pub fn offline_refs() -> Self {
        Self::synthetic(StatusCode::OK, "application/json", OFFLINE_REFS)
    }

    /// 503 JSON payload for a form submission that cannot reach the network.
    pub fn submission_unavailable() -> Self {
        Self::synthetic(
            StatusCode::SERVICE_UNAVAILABLE,
            "application/json",
            SUBMIT_UNAVAILABLE,
        )
    }

    /// Plain 503 body for audio assets while offline.
    pub fn media_unavailable() -> Self {
        Self::synthetic(
            StatusCode::SERVICE_UNAVAILABLE,
            "text/plain",
            MEDIA_UNAVAILABLE,
        )
    }
}

/// Cache-first: serve from the current store when present; otherwise fetch,
/// cache 200 responses, and fall back to the offline page on network
/// failure. A cache hit never touches the network.
pub async fn cache_first<B: FetchBackend>(
    backend: &B,
    cache: &CacheStoreManager,
    request: Request,
) -> FetchResponse {
    let key = request.cache_key();

    if let Some(entry) = cache.match_current(&key).await {
        debug!(url = %key, "Cache first: hit");
        return FetchResponse::from_entry(&entry);
    }

    match backend.fetch(request.clone()).await {
        Ok(response) => {
            // Only a plain 200 is stored. Partial content and other 2xx
            // variants must never be replayed as the full resource.
            if response.status == StatusCode::OK {
                cache
                    .put_current(&key, CacheEntry::from_response(&request, &response))
                    .await;
            }
            FetchResponse::from_network(response)
        }
        Err(e) => {
            warn!(url = %key, error = %e, "Cache first: network failed, serving offline page");
            FetchResponse::offline_page()
        }
    }
}

/// Network-first: always try the network; cache and return 200 responses,
/// fall back to the current store on any other status or failure, and serve
/// the offline payload when neither is available. Freshness wins over
/// availability.
pub async fn network_first<B: FetchBackend>(
    backend: &B,
    cache: &CacheStoreManager,
    request: Request,
) -> FetchResponse {
    let key = request.cache_key();

    match backend.fetch(request.clone()).await {
        Ok(response) if response.status == StatusCode::OK => {
            cache
                .put_current(&key, CacheEntry::from_response(&request, &response))
                .await;
            FetchResponse::from_network(response)
        }
        Ok(response) => {
            debug!(url = %key, status = %response.status, "Network first: non-200 status, trying cache");
            match cache.match_current(&key).await {
                Some(entry) => FetchResponse::from_entry(&entry),
                None => FetchResponse::offline_refs(),
            }
        }
        Err(e) => {
            debug!(url = %key, error = %e, "Network first: network failed, trying cache");
            match cache.match_current(&key).await {
                Some(entry) => FetchResponse::from_entry(&entry),
                None => FetchResponse::offline_refs(),
            }
        }
    }
}

/// Network-only: never reads or writes any cache store. Used where
/// staleness is unacceptable (form submissions).
pub async fn network_only<B: FetchBackend>(backend: &B, request: Request) -> FetchResponse {
    let url = request.url.to_string();
    match backend.fetch(request).await {
        Ok(response) => FetchResponse::from_network(response),
        Err(e) => {
            warn!(url = %url, error = %e, "Network only: network failed");
            FetchResponse::submission_unavailable()
        }
    }
}

/// Restricted network-only variant for audio assets: on failure, a plain
/// 503 body instead of a structured payload. Never falls back to cache.
pub async fn media_network_only<B: FetchBackend>(backend: &B, request: Request) -> FetchResponse {
    let url = request.url.to_string();
    match backend.fetch(request).await {
        Ok(response) => FetchResponse::from_network(response),
        Err(e) => {
            warn!(url = %url, error = %e, "Media fetch failed");
            FetchResponse::media_unavailable()
        }
    }
}
