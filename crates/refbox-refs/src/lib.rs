//! # RefBox Refs
//!
//! The ref catalog: data model for the `refs.json` resource and a typed
//! client for loading it.
//!
//! A "ref" is a named trigger button, optionally associated with a sound
//! clip. The catalog is fetched fresh on every load attempt with a
//! cache-busting query so the service worker's network-first strategy sees
//! a distinct request identity each time.

use std::time::{SystemTime, UNIX_EPOCH};

use refbox_net::{FetchBackend, NetError, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Button color palette. Must stay in sync with the stylesheet variables
/// `--color-1` through `--color-6`.
pub const COLORS: [&str; 6] = [
    "#FF6B9D", "#FFC837", "#00D9FF", "#C724B1", "#4ADE80", "#FF6B35",
];

/// Errors from loading the ref catalog.
#[derive(Error, Debug)]
pub enum RefsError {
    #[error("Network error: {0}")]
    Network(#[from] NetError),

    #[error("Server returned status {0}")]
    BadStatus(u16),

    #[error("Invalid refs document: {0}")]
    InvalidDocument(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// A single ref entry as served by the data endpoint.
///
/// Wire format: `{"id": ..., "name": ..., "hasSound": ..., "soundUrl": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefEntry {
    /// Stable identifier, also used to derive the button color.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Whether a sound clip is attached.
    pub has_sound: bool,

    /// URL of the sound clip, if any.
    #[serde(default)]
    pub sound_url: Option<String>,
}

impl RefEntry {
    /// Whether clicking this ref can play anything.
    pub fn playable(&self) -> bool {
        self.has_sound && self.sound_url.is_some()
    }
}

/// The refs listing document: `{"refs": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefsDocument {
    #[serde(default)]
    pub refs: Vec<RefEntry>,
}

/// Derive a stable palette color from a ref id.
///
/// Same 32-bit string hash the web client uses, so colors stay consistent
/// across page loads and across implementations. The hash runs over UTF-16
/// code units, not scalar values: ids outside the BMP hash each surrogate
/// half separately, exactly like `charCodeAt` in a browser.
pub fn stable_color(id: &str) -> &'static str {
    let mut hash: i32 = 0;
    for u in id.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(u as i32);
    }
    let index = (hash.unsigned_abs() as usize) % COLORS.len();
    COLORS[index]
}

/// Typed client for the refs.json data endpoint.
pub struct RefsClient<B: FetchBackend> {
    base: Url,
    backend: B,
}

impl<B: FetchBackend> RefsClient<B> {
    /// Create a client rooted at the app origin.
    pub fn new(base: Url, backend: B) -> Self {
        Self { base, backend }
    }

    /// Build the catalog request, with a timestamp query to defeat any
    /// intermediate HTTP cache.
    pub fn catalog_request(&self) -> Result<Request, RefsError> {
        let mut url = self
            .base
            .join("refs.json")
            .map_err(|e| RefsError::InvalidUrl(e.to_string()))?;
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        url.set_query(Some(&format!("t={}", t)));
        Ok(Request::get(url))
    }

    /// Fetch and parse the ref catalog.
    ///
    /// Any non-success status is an error; the caller renders an empty
    /// state, it never works from a half-parsed document.
    pub async fn load_refs(&self) -> Result<Vec<RefEntry>, RefsError> {
        let request = self.catalog_request()?;
        debug!(url = %request.url, "Loading ref catalog");

        let response = self.backend.fetch(request).await?;
        if !response.ok() {
            warn!(status = %response.status, "Ref catalog fetch returned error status");
            return Err(RefsError::BadStatus(response.status.as_u16()));
        }

        let document: RefsDocument = response
            .json()
            .map_err(|e| RefsError::InvalidDocument(e.to_string()))?;
        debug!(count = document.refs.len(), "Ref catalog loaded");
        Ok(document.refs)
    }
}
