//! Model registry types: `/registered-models/*` and `/model-versions/*`.

use serde::{Deserialize, Serialize};

use crate::schema::{require_str, FieldKind, FieldSpec, Message};
use crate::Failure;

/// Canonical model version stages.
pub mod stages {
    pub const NONE: &str = "None";
    pub const STAGING: &str = "Staging";
    pub const PRODUCTION: &str = "Production";
    pub const ARCHIVED: &str = "Archived";

    /// All stages, in the order `GetLatestVersions` reports them.
    pub const ALL: [&str; 4] = [NONE, STAGING, PRODUCTION, ARCHIVED];

    /// Map a user-supplied stage name (any case) onto its canonical spelling.
    pub fn canonical(stage: &str) -> Option<&'static str> {
        ALL.into_iter().find(|s| s.eq_ignore_ascii_case(stage))
    }
}

/// Status reported for every stored version.
pub const VERSION_STATUS_READY: &str = "READY";

/// One version of a registered model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
    pub creation_timestamp: i64,
    pub last_updated_timestamp: i64,
    pub current_stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub status: String,
}

/// A registered model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredModel {
    pub name: String,
    pub creation_timestamp: i64,
    pub last_updated_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub latest_versions: Vec<ModelVersion>,
}

// ---------------------------------------------------------------------------
// CreateRegisteredModel
// ---------------------------------------------------------------------------

/// `POST /registered-models/create`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRegisteredModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Message for CreateRegisteredModel {
    const NAME: &'static str = "CreateRegisteredModel";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("name", FieldKind::String),
        FieldSpec::scalar("description", FieldKind::String),
    ];

    fn validate(&self) -> Result<(), Failure> {
        require_str("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRegisteredModelResponse {
    pub registered_model: RegisteredModel,
}

// ---------------------------------------------------------------------------
// CreateModelVersion
// ---------------------------------------------------------------------------

/// `POST /model-versions/create`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateModelVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// URI of the model artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Message for CreateModelVersion {
    const NAME: &'static str = "CreateModelVersion";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("name", FieldKind::String),
        FieldSpec::scalar("source", FieldKind::String),
        FieldSpec::scalar("run_id", FieldKind::String),
        FieldSpec::scalar("description", FieldKind::String),
    ];

    fn validate(&self) -> Result<(), Failure> {
        require_str("name", &self.name)?;
        require_str("source", &self.source)
    }
}

/// Response for create and transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersionResponse {
    pub model_version: ModelVersion,
}

// ---------------------------------------------------------------------------
// TransitionModelVersionStage
// ---------------------------------------------------------------------------

/// `POST /model-versions/transition-stage`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionModelVersionStage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// When `true`, other versions already in the target stage move to
    /// `Archived`. Only meaningful for `Staging` and `Production`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_existing_versions: Option<bool>,
}

impl Message for TransitionModelVersionStage {
    const NAME: &'static str = "TransitionModelVersionStage";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("name", FieldKind::String),
        FieldSpec::scalar("version", FieldKind::String),
        FieldSpec::scalar("stage", FieldKind::String),
        FieldSpec::scalar("archive_existing_versions", FieldKind::Bool),
    ];

    fn validate(&self) -> Result<(), Failure> {
        require_str("name", &self.name)?;
        require_str("version", &self.version)?;
        require_str("stage", &self.stage)
    }
}

// ---------------------------------------------------------------------------
// GetLatestVersions
// ---------------------------------------------------------------------------

/// `GET|POST /registered-models/get-latest-versions`
///
/// `stages` may be repeated in a query string
/// (`?name=m&stages=Staging&stages=Production`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetLatestVersions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
}

impl Message for GetLatestVersions {
    const NAME: &'static str = "GetLatestVersions";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("name", FieldKind::String),
        FieldSpec::repeated("stages", FieldKind::String),
    ];

    fn validate(&self) -> Result<(), Failure> {
        require_str("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetLatestVersionsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_versions: Vec<ModelVersion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_stage_is_case_insensitive() {
        assert_eq!(stages::canonical("production"), Some(stages::PRODUCTION));
        assert_eq!(stages::canonical("NONE"), Some(stages::NONE));
        assert_eq!(stages::canonical("live"), None);
    }

    #[test]
    fn model_version_omits_unset_optionals() {
        let v = ModelVersion {
            name: "m".into(),
            version: "1".into(),
            creation_timestamp: 1,
            last_updated_timestamp: 1,
            current_stage: stages::NONE.into(),
            description: None,
            source: "s3://b/m".into(),
            run_id: None,
            status: VERSION_STATUS_READY.into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert!(json.get("description").is_none());
        assert!(json.get("run_id").is_none());
        assert_eq!(json["current_stage"], "None");
    }
}
