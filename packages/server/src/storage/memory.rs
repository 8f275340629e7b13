//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests, the conformance suite, and throwaway servers.
//!
//! Experiments are keyed by their numeric id in a [`BTreeMap`]; ids are
//! handed out from a counter starting at 1, matching the SQLite store's
//! `AUTOINCREMENT` sequence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use runledger_api::{stages, Experiment, ExperimentTag, ModelVersion, RegisteredModel};
use runledger_api::registry::VERSION_STATUS_READY;

use super::{
    compare_experiments, now_millis, ExperimentFilter, NewExperiment, NewModelVersion, Store,
    StoreError,
};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct ModelEntry {
    model: RegisteredModel,
    versions: Vec<ModelVersion>,
}

struct Inner {
    experiments: BTreeMap<i64, Experiment>,
    next_experiment_id: i64,
    models: HashMap<String, ModelEntry>,
}

impl Inner {
    fn new() -> Self {
        Self {
            experiments: BTreeMap::new(),
            next_experiment_id: 1,
            models: HashMap::new(),
        }
    }

    fn name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.experiments
            .iter()
            .any(|(id, e)| e.name == name && Some(*id) != except)
    }

    fn experiment_mut(&mut self, id: &str) -> Result<(i64, &mut Experiment), StoreError> {
        let missing = || StoreError::NotFound(format!("experiment {id}"));
        let key: i64 = id.parse().map_err(|_| missing())?;
        self.experiments
            .get_mut(&key)
            .map(|e| (key, e))
            .ok_or_else(missing)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Store`].
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".into()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tags_from_pairs(pairs: Vec<(String, String)>) -> Vec<ExperimentTag> {
    let mut by_key: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in pairs {
        by_key.insert(key, value);
    }
    by_key
        .into_iter()
        .map(|(key, value)| ExperimentTag {
            key: Some(key),
            value: Some(value),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Store impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Store for MemoryStore {
    // --- Experiments ---------------------------------------------------------

    async fn create_experiment(&self, experiment: NewExperiment) -> Result<String, StoreError> {
        let mut inner = self.write()?;
        if inner.name_taken(&experiment.name, None) {
            return Err(StoreError::Conflict(format!(
                "Experiment(name={}) already exists",
                experiment.name
            )));
        }

        let id = inner.next_experiment_id;
        inner.next_experiment_id += 1;
        let now = now_millis();
        inner.experiments.insert(
            id,
            Experiment {
                experiment_id: id.to_string(),
                name: experiment.name,
                artifact_location: experiment.artifact_location.resolve(id),
                lifecycle_stage: runledger_api::experiment::STAGE_ACTIVE.into(),
                last_update_time: now,
                creation_time: now,
                tags: tags_from_pairs(experiment.tags),
            },
        );
        Ok(id.to_string())
    }

    async fn get_experiment(&self, id: &str) -> Result<Option<Experiment>, StoreError> {
        let Ok(key) = id.parse::<i64>() else {
            return Ok(None);
        };
        Ok(self.read()?.experiments.get(&key).cloned())
    }

    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, StoreError> {
        Ok(self
            .read()?
            .experiments
            .values()
            .find(|e| e.name == name)
            .cloned())
    }

    async fn set_lifecycle_stage(&self, id: &str, stage: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let (_, experiment) = inner.experiment_mut(id)?;
        experiment.lifecycle_stage = stage.to_string();
        experiment.last_update_time = now_millis();
        Ok(())
    }

    async fn rename_experiment(&self, id: &str, new_name: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let key = inner.experiment_mut(id)?.0;
        if inner.name_taken(new_name, Some(key)) {
            return Err(StoreError::Conflict(format!(
                "Experiment(name={new_name}) already exists"
            )));
        }
        let (_, experiment) = inner.experiment_mut(id)?;
        experiment.name = new_name.to_string();
        experiment.last_update_time = now_millis();
        Ok(())
    }

    async fn list_experiments(
        &self,
        filter: &ExperimentFilter,
    ) -> Result<Vec<Experiment>, StoreError> {
        let inner = self.read()?;
        let mut matched: Vec<Experiment> = inner
            .experiments
            .values()
            .filter(|e| filter.includes_stage(&e.lifecycle_stage))
            .cloned()
            .collect();
        matched.sort_by(|a, b| compare_experiments(&filter.order_by, a, b));
        Ok(matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    // --- Model registry ------------------------------------------------------

    async fn create_registered_model(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<RegisteredModel, StoreError> {
        let mut inner = self.write()?;
        if inner.models.contains_key(name) {
            return Err(StoreError::Conflict(format!(
                "Registered Model (name={name}) already exists"
            )));
        }
        let now = now_millis();
        let model = RegisteredModel {
            name: name.to_string(),
            creation_timestamp: now,
            last_updated_timestamp: now,
            description,
            latest_versions: Vec::new(),
        };
        inner.models.insert(
            name.to_string(),
            ModelEntry {
                model: model.clone(),
                versions: Vec::new(),
            },
        );
        Ok(model)
    }

    async fn get_registered_model(
        &self,
        name: &str,
    ) -> Result<Option<RegisteredModel>, StoreError> {
        Ok(self.read()?.models.get(name).map(|m| m.model.clone()))
    }

    async fn create_model_version(
        &self,
        version: NewModelVersion,
    ) -> Result<ModelVersion, StoreError> {
        let mut inner = self.write()?;
        let entry = inner
            .models
            .get_mut(&version.name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model {}", version.name)))?;

        let now = now_millis();
        let created = ModelVersion {
            name: version.name,
            version: (entry.versions.len() + 1).to_string(),
            creation_timestamp: now,
            last_updated_timestamp: now,
            current_stage: stages::NONE.into(),
            description: version.description,
            source: version.source,
            run_id: version.run_id,
            status: VERSION_STATUS_READY.into(),
        };
        entry.versions.push(created.clone());
        entry.model.last_updated_timestamp = now;
        Ok(created)
    }

    async fn list_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>, StoreError> {
        Ok(self
            .read()?
            .models
            .get(name)
            .map(|m| m.versions.clone())
            .unwrap_or_default())
    }

    async fn set_model_version_stage(
        &self,
        name: &str,
        version: &str,
        stage: &str,
        archive_existing: bool,
    ) -> Result<ModelVersion, StoreError> {
        let mut inner = self.write()?;
        let entry = inner
            .models
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model {name}")))?;
        if !entry.versions.iter().any(|v| v.version == version) {
            return Err(StoreError::NotFound(format!(
                "model version {name}/{version}"
            )));
        }

        let now = now_millis();
        let mut updated = None;
        for v in entry.versions.iter_mut() {
            if v.version == version {
                v.current_stage = stage.to_string();
                v.last_updated_timestamp = now;
                updated = Some(v.clone());
            } else if archive_existing && v.current_stage == stage {
                v.current_stage = stages::ARCHIVED.into();
                v.last_updated_timestamp = now;
            }
        }
        entry.model.last_updated_timestamp = now;
        updated.ok_or_else(|| StoreError::NotFound(format!("model version {name}/{version}")))
    }
}
