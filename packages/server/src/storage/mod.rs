//! Storage abstraction layer for the tracking server.
//!
//! The [`Store`] trait defines the contract between the tracking service and
//! persistence. Lifecycle rules (what may be deleted, which stage names are
//! valid) live in the service; storage is purely a data access layer.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStore`] | Tests, conformance suite, throwaway servers |
//! | [`SqliteStore`] | Production; durable single-file database |
//!
//! [`MemoryStore`]: memory::MemoryStore
//! [`SqliteStore`]: sqlite::SqliteStore

pub mod memory;
pub mod sqlite;

use std::cmp::Ordering;

use async_trait::async_trait;
use runledger_api::{Experiment, ModelVersion, RegisteredModel, ViewType};

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The row to update does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (e.g. duplicate experiment name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Where a new experiment's artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// An already-normalised location supplied by the caller.
    Explicit(String),
    /// `{root}/{experiment_id}`, resolved by the store once the id is known.
    UnderRoot(String),
}

impl ArtifactLocation {
    pub fn resolve(&self, experiment_id: i64) -> String {
        match self {
            ArtifactLocation::Explicit(location) => location.clone(),
            ArtifactLocation::UnderRoot(root) => format!("{root}/{experiment_id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub name: String,
    pub artifact_location: ArtifactLocation,
    /// `(key, value)` pairs; a repeated key keeps its last value.
    pub tags: Vec<(String, String)>,
}

/// Sortable experiment attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    Name,
    ExperimentId,
    CreationTime,
    LastUpdateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub ascending: bool,
}

impl OrderBy {
    /// Default search order: newest first.
    pub const DEFAULT: [OrderBy; 1] = [OrderBy {
        key: OrderKey::CreationTime,
        ascending: false,
    }];

    fn compare(&self, a: &Experiment, b: &Experiment) -> Ordering {
        let ord = match self.key {
            OrderKey::Name => a.name.cmp(&b.name),
            OrderKey::ExperimentId => compare_ids(&a.experiment_id, &b.experiment_id),
            OrderKey::CreationTime => a.creation_time.cmp(&b.creation_time),
            OrderKey::LastUpdateTime => a.last_update_time.cmp(&b.last_update_time),
        };
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// Numeric comparison of experiment ids, with `experiment_id ASC` as the
/// final tie-breaker for every ordering.
pub fn compare_experiments(order_by: &[OrderBy], a: &Experiment, b: &Experiment) -> Ordering {
    order_by
        .iter()
        .map(|o| o.compare(a, b))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| compare_ids(&a.experiment_id, &b.experiment_id))
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Query parameters for [`Store::list_experiments`].
#[derive(Debug, Clone)]
pub struct ExperimentFilter {
    pub view_type: ViewType,
    pub order_by: Vec<OrderBy>,
    pub offset: usize,
    /// Maximum number of rows to return. Callers wanting to detect a further
    /// page ask for one extra row.
    pub limit: usize,
}

impl ExperimentFilter {
    fn includes_stage(&self, lifecycle_stage: &str) -> bool {
        match self.view_type {
            ViewType::All => true,
            ViewType::ActiveOnly => lifecycle_stage == runledger_api::experiment::STAGE_ACTIVE,
            ViewType::DeletedOnly => lifecycle_stage == runledger_api::experiment::STAGE_DELETED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewModelVersion {
    pub name: String,
    pub source: String,
    pub run_id: Option<String>,
    pub description: Option<String>,
}

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// The persistence contract for the tracking server.
///
/// All methods are `async` and return `Result<_, StoreError>`. Implementations
/// must be `Send + Sync + 'static` so they can be held in an `Arc<dyn Store>`.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // --- Experiments ---------------------------------------------------------

    /// Persist a new experiment and return its id. Returns
    /// [`StoreError::Conflict`] if the name is taken.
    async fn create_experiment(&self, experiment: NewExperiment) -> Result<String, StoreError>;

    async fn get_experiment(&self, id: &str) -> Result<Option<Experiment>, StoreError>;

    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, StoreError>;

    /// Set `lifecycle_stage` and bump `last_update_time`.
    async fn set_lifecycle_stage(&self, id: &str, stage: &str) -> Result<(), StoreError>;

    /// Returns [`StoreError::Conflict`] if another experiment has `new_name`.
    async fn rename_experiment(&self, id: &str, new_name: &str) -> Result<(), StoreError>;

    async fn list_experiments(
        &self,
        filter: &ExperimentFilter,
    ) -> Result<Vec<Experiment>, StoreError>;

    // --- Model registry ------------------------------------------------------

    /// Returns [`StoreError::Conflict`] if the name is taken.
    async fn create_registered_model(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<RegisteredModel, StoreError>;

    async fn get_registered_model(&self, name: &str)
        -> Result<Option<RegisteredModel>, StoreError>;

    /// Append the next version number. Returns [`StoreError::NotFound`] if
    /// the model is not registered.
    async fn create_model_version(
        &self,
        version: NewModelVersion,
    ) -> Result<ModelVersion, StoreError>;

    /// All versions of a model, oldest first.
    async fn list_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>, StoreError>;

    /// Move one version to `stage`. With `archive_existing`, every other
    /// version currently in `stage` moves to `Archived`.
    async fn set_model_version_stage(
        &self,
        name: &str,
        version: &str,
        stage: &str,
        archive_existing: bool,
    ) -> Result<ModelVersion, StoreError>;
}
