//! Business handlers for the tracking and model-registry operations.
//!
//! Each operation is an `async fn(self: Arc<Self>, Input) -> Result<Output,
//! Failure>` on [`TrackingService`]. Lifecycle rules (what may be deleted,
//! which stage names exist, paging) live here, not in storage.
//! [`routes`] binds every operation to its HTTP method and path.

pub mod experiments;
pub mod registry;
mod routes;

use std::sync::Arc;

use crate::storage::Store;

pub use routes::routes;

/// Shared state behind every operation handler.
pub struct TrackingService {
    store: Arc<dyn Store>,
    /// Normalised root under which experiments without an explicit artifact
    /// location are placed.
    artifact_root: String,
}

impl TrackingService {
    /// `artifact_root` must already be normalised; it is used verbatim.
    pub fn new(store: Arc<dyn Store>, artifact_root: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            store,
            artifact_root: artifact_root.into(),
        })
    }
}
