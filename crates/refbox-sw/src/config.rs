//! Service worker configuration.
//!
//! Everything version- or deployment-specific is explicit configuration
//! handed to the components at construction. There is no module-level
//! current-version state.

use serde::{Deserialize, Serialize};
use url::Url;

/// Service worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwConfig {
    /// Application name, used as the cache name prefix.
    pub app_name: String,

    /// Cache version tag. Bumping this is the only supported migration
    /// mechanism: the new store is populated at install and every other
    /// store is purged at activation.
    pub cache_version: String,

    /// Origin against which root-relative static asset paths are resolved.
    pub base: Url,

    /// The application shell: root-relative paths cached atomically at
    /// install time. All of them must succeed or installation fails.
    pub static_assets: Vec<String>,

    /// Hostname of the form-submission endpoint. Always network-only.
    pub form_host: String,

    /// Path marker for the dynamic data resource (the refs listing).
    pub data_marker: String,

    /// Path marker for audio assets.
    pub media_marker: String,
}

impl SwConfig {
    /// Configuration for the RefBox app shell rooted at `base`.
    pub fn new(base: Url) -> Self {
        Self {
            app_name: "refbox".to_string(),
            cache_version: "v1.0.0".to_string(),
            base,
            static_assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/style.css".to_string(),
                "/app.js".to_string(),
                "/manifest.json".to_string(),
                "/icons/icon-192.png".to_string(),
                "/icons/icon-512.png".to_string(),
                "/propose-ref.html".to_string(),
                "/propose-son.html".to_string(),
            ],
            form_host: "formspree.io".to_string(),
            data_marker: "refs.json".to_string(),
            media_marker: "/sounds/".to_string(),
        }
    }

    /// Set the version tag.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.cache_version = version.into();
        self
    }

    /// Set the app name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Replace the static asset set.
    pub fn with_static_assets(mut self, assets: Vec<String>) -> Self {
        self.static_assets = assets;
        self
    }

    /// Name of the current cache store: `<app-name>-cache-<version>`.
    pub fn cache_name(&self) -> String {
        format!("{}-cache-{}", self.app_name, self.cache_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://refbox.example/").unwrap()
    }

    #[test]
    fn test_cache_name_format() {
        let config = SwConfig::new(base());
        assert_eq!(config.cache_name(), "refbox-cache-v1.0.0");

        let bumped = SwConfig::new(base()).with_version("v2");
        assert_eq!(bumped.cache_name(), "refbox-cache-v2");
    }

    #[test]
    fn test_default_shell_assets() {
        let config = SwConfig::new(base());
        assert!(config.static_assets.contains(&"/index.html".to_string()));
        assert!(config.static_assets.contains(&"/manifest.json".to_string()));
        assert_eq!(config.static_assets.len(), 9);
    }
}
