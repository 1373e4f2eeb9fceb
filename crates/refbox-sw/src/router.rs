//! Request classification and dispatch.
//!
//! Every intercepted request is classified into exactly one policy by a
//! strict precedence order. The order is a priority list, not a set of
//! independent conditions: the first matching rule wins.

use refbox_net::{FetchBackend, Request};
use tracing::trace;
use url::Url;

use crate::cache::CacheStoreManager;
use crate::config::SwConfig;
use crate::strategy::{self, FetchResponse};

/// The policy chosen for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Non-HTTP(S) scheme: the request proceeds uninterpreted.
    PassThrough,
    /// Form-submission endpoint: network-only, never cached.
    NetworkOnly,
    /// Dynamic data resource: network-first.
    NetworkFirst,
    /// Audio asset: restricted network-only with a plain failure body.
    MediaNetworkOnly,
    /// Everything else (the app shell): cache-first.
    CacheFirst,
}

/// Classify a request URL. Precedence, first match wins:
///
/// 1. non-HTTP(S) scheme → [`RoutePolicy::PassThrough`]
/// 2. form host → [`RoutePolicy::NetworkOnly`]
/// 3. data marker in path → [`RoutePolicy::NetworkFirst`]
/// 4. media marker in path → [`RoutePolicy::MediaNetworkOnly`]
/// 5. otherwise → [`RoutePolicy::CacheFirst`]
pub fn classify(url: &Url, config: &SwConfig) -> RoutePolicy {
    if !matches!(url.scheme(), "http" | "https") {
        return RoutePolicy::PassThrough;
    }
    if url.host_str() == Some(config.form_host.as_str()) {
        return RoutePolicy::NetworkOnly;
    }
    if url.path().contains(&config.data_marker) {
        return RoutePolicy::NetworkFirst;
    }
    if url.path().contains(&config.media_marker) {
        return RoutePolicy::MediaNetworkOnly;
    }
    RoutePolicy::CacheFirst
}

/// Dispatches intercepted requests to their strategy.
pub struct Router {
    config: SwConfig,
}

impl Router {
    /// Create a router over the given configuration.
    pub fn new(config: SwConfig) -> Self {
        Self { config }
    }

    /// The configuration this router consults.
    pub fn config(&self) -> &SwConfig {
        &self.config
    }

    /// Handle an intercepted request.
    ///
    /// Returns `None` for pass-through requests (no interception); every
    /// other request resolves to some response, synthetic if necessary.
    pub async fn handle<B: FetchBackend>(
        &self,
        backend: &B,
        cache: &CacheStoreManager,
        request: Request,
    ) -> Option<FetchResponse> {
        let policy = classify(&request.url, &self.config);
        trace!(url = %request.url, policy = ?policy, "Routing request");

        match policy {
            RoutePolicy::PassThrough => None,
            RoutePolicy::NetworkOnly => Some(strategy::network_only(backend, request).await),
            RoutePolicy::NetworkFirst => {
                Some(strategy::network_first(backend, cache, request).await)
            }
            RoutePolicy::MediaNetworkOnly => {
                Some(strategy::media_network_only(backend, request).await)
            }
            RoutePolicy::CacheFirst => Some(strategy::cache_first(backend, cache, request).await),
        }
    }
}
