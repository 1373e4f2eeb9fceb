//! End-to-end offline scenarios driven through the worker event dispatch.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use refbox_net::Request;
use refbox_sw::testing::ScriptedBackend;
use refbox_sw::{CacheStorage, LifecycleController, LifecycleState, SwConfig, WorkerEvent};
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

fn base() -> Url {
    Url::parse("https://refbox.example/").unwrap()
}

fn shell_config() -> SwConfig {
    SwConfig::new(base()).with_static_assets(vec![
        "/index.html".to_string(),
        "/style.css".to_string(),
    ])
}

fn shell_backend() -> Arc<ScriptedBackend> {
    let backend = ScriptedBackend::new();
    backend.respond_with_type(
        "https://refbox.example/index.html",
        200,
        "text/html",
        "<html></html>",
    );
    backend.respond_with_type("https://refbox.example/style.css", 200, "text/css", "body{}");
    Arc::new(backend)
}

fn worker(
    config: SwConfig,
    backend: Arc<ScriptedBackend>,
    storage: Arc<RwLock<CacheStorage>>,
) -> LifecycleController<ScriptedBackend> {
    LifecycleController::new(config, backend, storage)
}

fn fresh_storage() -> Arc<RwLock<CacheStorage>> {
    Arc::new(RwLock::new(CacheStorage::new()))
}

fn get(url: &str) -> WorkerEvent {
    WorkerEvent::Fetch(Request::get(Url::parse(url).unwrap()))
}

#[tokio::test]
async fn shell_survives_going_offline() {
    let backend = shell_backend();
    let sw = worker(shell_config(), Arc::clone(&backend), fresh_storage());

    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;
    assert_eq!(sw.state().await, LifecycleState::Active);

    // The network goes away entirely; the shell still renders from cache.
    backend.fail("https://refbox.example/index.html");
    backend.fail("https://refbox.example/style.css");

    let response = sw
        .handle_event(get("https://refbox.example/style.css"))
        .await
        .unwrap();
    assert!(response.from_cache);
    assert_eq!(response.body, Bytes::from_static(b"body{}"));
}

#[tokio::test]
async fn cache_first_request_count_stays_flat_until_purge() {
    let backend = shell_backend();
    backend.respond_with_type(
        "https://refbox.example/about.html",
        200,
        "text/html",
        "<p>about</p>",
    );
    let sw = worker(shell_config(), Arc::clone(&backend), fresh_storage());
    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;

    for _ in 0..5 {
        sw.handle_event(get("https://refbox.example/about.html"))
            .await
            .unwrap();
    }
    // Exactly one network fetch: the first miss. All later requests hit
    // the cache store.
    assert_eq!(backend.hits("https://refbox.example/about.html"), 1);

    // After a purge the next request goes back to the network.
    sw.cache().purge_all().await;
    sw.handle_event(get("https://refbox.example/about.html"))
        .await
        .unwrap();
    assert_eq!(backend.hits("https://refbox.example/about.html"), 2);
}

#[tokio::test]
async fn form_endpoint_is_never_cached() {
    let backend = shell_backend();
    backend.respond("https://formspree.io/f/abcd", 200, "submitted");
    let sw = worker(shell_config(), Arc::clone(&backend), fresh_storage());
    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;

    let response = sw
        .handle_event(get("https://formspree.io/f/abcd"))
        .await
        .unwrap();
    assert!(response.status.is_success());
    assert!(!response.from_cache);

    // No entry was written to any store.
    let storage = sw.cache().storage();
    let storage = storage.read().await;
    for name in storage.keys() {
        let store = storage.get(&name).unwrap();
        assert!(store.match_request("https://formspree.io/f/abcd").is_none());
    }
}

#[tokio::test]
async fn refs_listing_offline_fallback_chain() {
    let backend = shell_backend();
    backend.respond_with_type(
        "https://refbox.example/refs.json",
        200,
        "application/json",
        r#"{"refs":[{"id":"a","name":"A","hasSound":false,"soundUrl":null}]}"#,
    );
    let sw = worker(shell_config(), Arc::clone(&backend), fresh_storage());
    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;

    // Online: the fresh body is returned and stored.
    let online = sw
        .handle_event(get("https://refbox.example/refs.json"))
        .await
        .unwrap();
    assert!(!online.from_cache);

    // Offline with a cached entry: the cached body comes back.
    backend.fail("https://refbox.example/refs.json");
    let offline = sw
        .handle_event(get("https://refbox.example/refs.json"))
        .await
        .unwrap();
    assert!(offline.from_cache);
    assert_eq!(offline.body, online.body);
}

#[tokio::test]
async fn refs_listing_offline_without_cache_yields_offline_payload() {
    let backend = shell_backend();
    backend.fail("https://refbox.example/refs.json");
    let sw = worker(shell_config(), backend, fresh_storage());
    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;

    let response = sw
        .handle_event(get("https://refbox.example/refs.json"))
        .await
        .unwrap();
    assert_eq!(
        response.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(
        response.body,
        Bytes::from_static(br#"{"error":"Offline","refs":[]}"#)
    );
}

#[tokio::test]
async fn audio_offline_yields_plain_503() {
    let backend = shell_backend();
    backend.fail("https://refbox.example/sounds/clip1.mp3");
    let sw = worker(shell_config(), backend, fresh_storage());
    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;

    let response = sw
        .handle_event(get("https://refbox.example/sounds/clip1.mp3"))
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text_lossy(), "Audio non disponible offline");
}

#[tokio::test]
async fn install_failure_blocks_activation() {
    let backend = ScriptedBackend::new();
    backend.respond_with_type(
        "https://refbox.example/index.html",
        200,
        "text/html",
        "<html></html>",
    );
    backend.fail("https://refbox.example/style.css");
    let sw = worker(shell_config(), Arc::new(backend), fresh_storage());

    sw.handle_event(WorkerEvent::Install).await;
    assert_eq!(sw.state().await, LifecycleState::InstallFailed);

    sw.handle_event(WorkerEvent::Activate).await;
    assert_ne!(sw.state().await, LifecycleState::Active);
}

#[tokio::test]
async fn version_bump_purges_previous_store() {
    let storage = fresh_storage();

    // v1 installs and activates.
    let v1 = worker(
        shell_config().with_app_name("app").with_version("v1"),
        shell_backend(),
        Arc::clone(&storage),
    );
    v1.handle_event(WorkerEvent::Install).await;
    v1.handle_event(WorkerEvent::Activate).await;
    assert_eq!(v1.cache().store_names().await, vec!["app-cache-v1"]);

    // v2 installs over the same storage; its activation purges v1.
    let v2 = worker(
        shell_config().with_app_name("app").with_version("v2"),
        shell_backend(),
        Arc::clone(&storage),
    );
    v2.handle_event(WorkerEvent::Install).await;
    v2.handle_event(WorkerEvent::Activate).await;

    assert_eq!(v2.cache().store_names().await, vec!["app-cache-v2"]);
}

#[tokio::test]
async fn clear_cache_message_empties_storage() {
    let sw = worker(shell_config(), shell_backend(), fresh_storage());
    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;
    assert!(!sw.cache().store_names().await.is_empty());

    sw.handle_event(WorkerEvent::Message(json!({"type": "CLEAR_CACHE"})))
        .await;

    for _ in 0..50 {
        if sw.cache().store_names().await.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(sw.cache().store_names().await.is_empty());
}

#[tokio::test]
async fn non_http_request_is_not_intercepted() {
    let sw = worker(shell_config(), shell_backend(), fresh_storage());
    sw.handle_event(WorkerEvent::Install).await;
    sw.handle_event(WorkerEvent::Activate).await;

    let response = sw.handle_event(get("data:text/plain,hi")).await;
    assert!(response.is_none());
}
