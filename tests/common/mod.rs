#![allow(dead_code)]

use cache_relay::config::RemoteCacheSettings;
use cache_relay::infrastructure::cache::RemoteHttpCache;
use cache_relay::infrastructure::memory_store::MemoryStore;
use cache_relay::routes::app_router;
use cache_relay::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub const PREFIX: &str = "rest/";
pub const CREDENTIAL: &str = "relay:secret";

/// A reference server running on an ephemeral port.
pub struct TestCacheServer {
    pub url: Url,
    pub store: Arc<MemoryStore>,
}

pub fn create_test_state(authentication: Option<&str>) -> AppState {
    AppState::new(
        Arc::new(MemoryStore::new()),
        authentication.map(str::to_string),
    )
}

pub async fn spawn_server(authentication: Option<&str>) -> TestCacheServer {
    let state = create_test_state(authentication);
    let store = state.store.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app_router(state, PREFIX)).await.unwrap();
    });

    TestCacheServer {
        url: Url::parse(&format!("http://{}", addr)).unwrap(),
        store,
    }
}

/// An endpoint that accepts connections but never answers.
pub async fn spawn_silent_endpoint() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    Url::parse(&format!("http://{}", addr)).unwrap()
}

pub fn settings(servers: Vec<Url>, authentication: &str) -> RemoteCacheSettings {
    RemoteCacheSettings {
        prefix_url: PREFIX.to_string(),
        cache_timeout: Duration::from_secs(1),
        servers,
        authentication: authentication.to_string(),
    }
}

pub fn remote_cache(servers: Vec<Url>) -> RemoteHttpCache {
    RemoteHttpCache::from_settings(settings(servers, "")).unwrap()
}
