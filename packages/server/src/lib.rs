//! Public surface for the `runledger-server` crate.
//!
//! Exposes the router builder, config and store types so that external
//! crates (e.g. the conformance test suite) can spin up an in-process server
//! without spawning a subprocess.
//!
//! # Request flow
//!
//! ```text
//! axum Router ─► RouteTable lookup ─► decode (query | body)
//!             ─► Operation::dispatch ─► TrackingService handler
//!             ─► encode (200 JSON | failure JSON with mapped status)
//! ```

pub mod artifact;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod encode;
pub mod error;
pub mod router;
pub mod routes;
pub mod service;
pub mod storage;

use std::sync::Arc;

use axum::Router;
use runledger_api::Failure;

pub use config::ServerConfig;
pub use router::build_router;
pub use service::TrackingService;
pub use storage::{memory::MemoryStore, sqlite::SqliteStore, Store};

/// Build the full application: normalise the artifact root, bind every
/// operation under the configured prefix and wrap it in the transport layers.
///
/// Fails only if `config.default_artifact_root` cannot be normalised.
pub fn build_app(store: Arc<dyn Store>, config: &ServerConfig) -> Result<Router, Failure> {
    let artifact_root = artifact::normalize_artifact_location(&config.default_artifact_root)?
        .ok_or_else(|| Failure::invalid_parameter("default artifact root is empty"))?;
    tracing::info!(artifact_root = %artifact_root, "default artifact root");

    let service = TrackingService::new(store, artifact_root);
    let table = service::routes(&service, &config.api_prefix);
    Ok(build_router(table, config))
}
