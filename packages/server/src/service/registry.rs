//! Model registry operations.

use std::sync::Arc;

use runledger_api::{
    stages, CreateModelVersion, CreateRegisteredModel, CreateRegisteredModelResponse, Failure,
    GetLatestVersions, GetLatestVersionsResponse, ModelVersion, ModelVersionResponse,
    TransitionModelVersionStage,
};

use super::TrackingService;
use crate::storage::{NewModelVersion, StoreError};

impl TrackingService {
    pub async fn create_registered_model(
        self: Arc<Self>,
        req: CreateRegisteredModel,
    ) -> Result<CreateRegisteredModelResponse, Failure> {
        let name = req.name.unwrap_or_default();
        let registered_model = self
            .store
            .create_registered_model(&name, req.description)
            .await?;
        tracing::info!(model = %name, "registered model created");
        Ok(CreateRegisteredModelResponse { registered_model })
    }

    pub async fn create_model_version(
        self: Arc<Self>,
        req: CreateModelVersion,
    ) -> Result<ModelVersionResponse, Failure> {
        let name = req.name.unwrap_or_default();
        self.require_model(&name).await?;
        let model_version = self
            .store
            .create_model_version(NewModelVersion {
                name,
                source: req.source.unwrap_or_default(),
                run_id: req.run_id.filter(|id| !id.is_empty()),
                description: req.description,
            })
            .await?;
        tracing::info!(
            model = %model_version.name,
            version = %model_version.version,
            "model version created"
        );
        Ok(ModelVersionResponse { model_version })
    }

    pub async fn transition_model_version_stage(
        self: Arc<Self>,
        req: TransitionModelVersionStage,
    ) -> Result<ModelVersionResponse, Failure> {
        let name = req.name.unwrap_or_default();
        let version = req.version.unwrap_or_default();
        let stage = canonical_stage(req.stage.as_deref().unwrap_or_default())?;
        let archive_existing = req.archive_existing_versions.unwrap_or(false);

        if version.parse::<i64>().is_err() {
            return Err(Failure::invalid_parameter(format!(
                "Model version must be an integer, got '{version}'"
            )));
        }
        if archive_existing && stage != stages::STAGING && stage != stages::PRODUCTION {
            return Err(Failure::invalid_parameter(format!(
                "Model version transition cannot archive existing model versions \
                 because '{stage}' is not an active stage. Valid stages are {}, {}",
                stages::STAGING,
                stages::PRODUCTION
            )));
        }

        let model_version = self
            .store
            .set_model_version_stage(&name, &version, stage, archive_existing)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => Failure::not_found(format!(
                    "Model Version (name={name}, version={version}) not found"
                )),
                other => other.into(),
            })?;
        tracing::info!(model = %name, version = %version, stage, "model version transitioned");
        Ok(ModelVersionResponse { model_version })
    }

    pub async fn get_latest_versions(
        self: Arc<Self>,
        req: GetLatestVersions,
    ) -> Result<GetLatestVersionsResponse, Failure> {
        let name = req.name.unwrap_or_default();
        let wanted: Vec<&'static str> = if req.stages.is_empty() {
            stages::ALL.to_vec()
        } else {
            req.stages
                .iter()
                .map(|s| canonical_stage(s))
                .collect::<Result<_, _>>()?
        };

        self.require_model(&name).await?;
        let versions = self.store.list_model_versions(&name).await?;
        Ok(GetLatestVersionsResponse {
            model_versions: latest_per_stage(&versions, &wanted),
        })
    }

    async fn require_model(&self, name: &str) -> Result<(), Failure> {
        match self.store.get_registered_model(name).await? {
            Some(_) => Ok(()),
            None => Err(Failure::not_found(format!(
                "Registered Model with name={name} not found"
            ))),
        }
    }
}

fn canonical_stage(stage: &str) -> Result<&'static str, Failure> {
    stages::canonical(stage).ok_or_else(|| {
        Failure::invalid_parameter(format!(
            "Invalid Model Version stage: {stage}. Value must be one of {}",
            stages::ALL.join(", ")
        ))
    })
}

/// The highest version in each wanted stage, in `wanted` order. Stages with
/// no versions are skipped; a stage named twice is reported once.
fn latest_per_stage(versions: &[ModelVersion], wanted: &[&str]) -> Vec<ModelVersion> {
    let mut out: Vec<ModelVersion> = Vec::new();
    for stage in wanted {
        if out.iter().any(|v| v.current_stage == *stage) {
            continue;
        }
        let latest = versions
            .iter()
            .filter(|v| v.current_stage == *stage)
            .max_by_key(|v| v.version.parse::<i64>().unwrap_or(0));
        if let Some(v) = latest {
            out.push(v.clone());
        }
    }
    out
}
