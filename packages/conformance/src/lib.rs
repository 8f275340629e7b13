//! Shared helpers for the runledger conformance test suite.
//!
//! Provides [`spawn_server`], which binds a `TcpListener` on an
//! ephemeral port, wires up an in-process server backed by `MemoryStore`,
//! and returns both the local URL and a reference to the underlying store
//! so tests can pre-populate data without going through the HTTP layer.

use std::sync::Arc;

use runledger_server::{build_app, MemoryStore, ServerConfig, Store};

/// API prefix the conformance server mounts its operations under.
pub const PREFIX: &str = "/api/2.0/mlflow";

/// Artifact root experiments without an explicit location are placed under.
pub const ARTIFACT_ROOT: &str = "s3://conformance-bucket/mlruns";

/// Start an ephemeral in-process server and return `(base_url, store)`.
///
/// The server runs in a background `tokio` task and is bound to an
/// OS-assigned port on `127.0.0.1`. The returned `String` is the full API
/// base URL including [`PREFIX`], e.g.
/// `http://127.0.0.1:51234/api/2.0/mlflow`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or the server fails to start.
pub async fn spawn_server() -> (String, Arc<MemoryStore>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}{PREFIX}");

    let mem_store = Arc::new(MemoryStore::new());
    let store: Arc<dyn Store> = Arc::clone(&mem_store) as Arc<dyn Store>;

    let config = ServerConfig {
        bind_addr: addr,
        db_path: None,
        default_artifact_root: ARTIFACT_ROOT.into(),
        api_prefix: PREFIX.into(),
        max_body_bytes: 64 * 1024,
        request_timeout_secs: 10,
    };
    let router = build_app(store, &config).expect("build conformance app");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance server error");
    });

    (base_url, mem_store)
}

/// Root URL of the server (without the API prefix), for `/health`.
pub fn server_root(base_url: &str) -> &str {
    base_url.strip_suffix(PREFIX).unwrap_or(base_url)
}
