//! `runledger`: experiment tracking and model registry server.
//!
//! # Quick start
//!
//! ```sh
//! # In-memory server on the default port:
//! runledger
//!
//! # Persistent SQLite server:
//! RUNLEDGER_DB=./runledger.db runledger
//!
//! # Custom bind address and artifact root:
//! RUNLEDGER_BIND=0.0.0.0:8080 RUNLEDGER_DEFAULT_ARTIFACT_ROOT=s3://bucket/runs runledger
//! ```
//!
//! # Environment variables
//!
//! See [`runledger_server::ServerConfig`] for the full list.

use std::sync::Arc;

use runledger_server::{build_app, MemoryStore, ServerConfig, SqliteStore, Store};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runledger_server=info,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!("invalid configuration: {e}");
        std::process::exit(2);
    });

    let store: Arc<dyn Store> = match &config.db_path {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            Arc::new(
                SqliteStore::open(path)
                    .unwrap_or_else(|e| panic!("failed to open SQLite database at {path}: {e}")),
            )
        }
        None => {
            tracing::info!("storage: in-memory (data will not survive restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let app = build_app(store, &config).unwrap_or_else(|e| {
        panic!(
            "invalid default artifact root {:?}: {e}",
            config.default_artifact_root
        )
    });

    tracing::info!("listening on {} (prefix {})", config.bind_addr, config.api_prefix);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    if let Err(e) = axum::serve(listener, app).await {
        panic!("server error: {e}");
    }
}
