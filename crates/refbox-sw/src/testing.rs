//! Scripted network backends for tests.
//!
//! The strategies and the lifecycle controller are generic over
//! [`FetchBackend`]; tests script the network per URL and assert on
//! request counts instead of standing up a real server.

use std::future::Future;
use std::sync::Mutex;

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderValue, StatusCode};
use refbox_net::{FetchBackend, NetError, Request, RequestId, Response};

#[derive(Debug, Clone)]
enum Script {
    Respond {
        status: u16,
        content_type: String,
        body: String,
    },
    Fail,
}

/// A backend whose behavior is scripted per URL.
///
/// URLs with no script behave like an unreachable network. Every fetch is
/// counted, scripted or not.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl ScriptedBackend {
    /// Create a backend with no scripts: every request fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a plain-text response for a URL.
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.respond_with_type(url, status, "text/plain", body);
    }

    /// Script a response with an explicit content type.
    pub fn respond_with_type(&self, url: &str, status: u16, content_type: &str, body: &str) {
        self.scripts.lock().unwrap().insert(
            url.to_string(),
            Script::Respond {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
            },
        );
    }

    /// Script a network failure for a URL, replacing any prior script.
    pub fn fail(&self, url: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Fail);
    }

    /// How many times a URL has been fetched.
    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Total fetches across all URLs.
    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

impl FetchBackend for ScriptedBackend {
    fn fetch(&self, request: Request) -> impl Future<Output = Result<Response, NetError>> + Send {
        let key = request.url.to_string();
        *self.hits.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        let result = match self.scripts.lock().unwrap().get(&key) {
            Some(Script::Respond {
                status,
                content_type,
                body,
            }) => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(content_type) {
                    headers.insert("content-type", value);
                }
                Ok(Response::new(
                    RequestId::new(),
                    request.url.clone(),
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::OK),
                    headers,
                    Bytes::from(body.clone()),
                ))
            }
            Some(Script::Fail) | None => Err(NetError::RequestFailed(format!(
                "scripted network failure for {}",
                key
            ))),
        };

        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_scripted_response_and_hits() {
        let backend = ScriptedBackend::new();
        backend.respond("https://a/x", 200, "hello");

        let request = Request::get(Url::parse("https://a/x").unwrap());
        let response = backend.fetch(request).await.unwrap();

        assert!(response.ok());
        assert_eq!(response.text().unwrap(), "hello");
        assert_eq!(backend.hits("https://a/x"), 1);
    }

    #[tokio::test]
    async fn test_unscripted_url_fails() {
        let backend = ScriptedBackend::new();
        let request = Request::get(Url::parse("https://a/missing").unwrap());
        assert!(backend.fetch(request).await.is_err());
        assert_eq!(backend.total_hits(), 1);
    }
}
