//! Experiment types: `/experiments/*` endpoints.

use serde::{Deserialize, Serialize};

use crate::schema::{require_str, FieldKind, FieldSpec, Message};
use crate::Failure;

/// Lifecycle stage of an active experiment.
pub const STAGE_ACTIVE: &str = "active";
/// Lifecycle stage of a soft-deleted experiment.
pub const STAGE_DELETED: &str = "deleted";

/// A key/value tag attached to an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ExperimentTag {
    pub const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("key", FieldKind::String),
        FieldSpec::scalar("value", FieldKind::String),
    ];
}

/// A stored experiment as returned by the read endpoints.
///
/// All scalar fields are always present; `tags` is omitted when empty.
///
/// # Example
///
/// ```json
/// {
///   "experiment_id": "1",
///   "name": "churn-model",
///   "artifact_location": "/srv/mlruns/1",
///   "lifecycle_stage": "active",
///   "last_update_time": 1760000000000,
///   "creation_time": 1760000000000
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub artifact_location: String,
    pub lifecycle_stage: String,
    /// Milliseconds since the Unix epoch.
    pub last_update_time: i64,
    /// Milliseconds since the Unix epoch.
    pub creation_time: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ExperimentTag>,
}

// ---------------------------------------------------------------------------
// CreateExperiment
// ---------------------------------------------------------------------------

/// `POST /experiments/create`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateExperiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Where run artifacts are stored. Local paths are canonicalised into
    /// absolute locations; other URI schemes are kept as given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_location: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ExperimentTag>,
}

impl Message for CreateExperiment {
    const NAME: &'static str = "CreateExperiment";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("name", FieldKind::String),
        FieldSpec::scalar("artifact_location", FieldKind::String),
        FieldSpec::repeated("tags", FieldKind::Message(ExperimentTag::FIELDS)),
    ];

    fn validate(&self) -> Result<(), Failure> {
        require_str("name", &self.name)?;
        for tag in &self.tags {
            require_str("tags.key", &tag.key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateExperimentResponse {
    pub experiment_id: String,
}

// ---------------------------------------------------------------------------
// GetExperiment / GetExperimentByName
// ---------------------------------------------------------------------------

/// `GET /experiments/get`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetExperiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

impl Message for GetExperiment {
    const NAME: &'static str = "GetExperiment";
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::scalar("experiment_id", FieldKind::String)];

    fn validate(&self) -> Result<(), Failure> {
        require_str("experiment_id", &self.experiment_id)
    }
}

/// `GET /experiments/get-by-name`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetExperimentByName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
}

impl Message for GetExperimentByName {
    const NAME: &'static str = "GetExperimentByName";
    const FIELDS: &'static [FieldSpec] =
        &[FieldSpec::scalar("experiment_name", FieldKind::String)];

    fn validate(&self) -> Result<(), Failure> {
        require_str("experiment_name", &self.experiment_name)
    }
}

/// Response for both `get` and `get-by-name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetExperimentResponse {
    pub experiment: Experiment,
}

// ---------------------------------------------------------------------------
// Delete / Restore / Update
// ---------------------------------------------------------------------------

/// `POST /experiments/delete`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteExperiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

impl Message for DeleteExperiment {
    const NAME: &'static str = "DeleteExperiment";
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::scalar("experiment_id", FieldKind::String)];

    fn validate(&self) -> Result<(), Failure> {
        require_str("experiment_id", &self.experiment_id)
    }
}

/// `POST /experiments/restore`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestoreExperiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

impl Message for RestoreExperiment {
    const NAME: &'static str = "RestoreExperiment";
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::scalar("experiment_id", FieldKind::String)];

    fn validate(&self) -> Result<(), Failure> {
        require_str("experiment_id", &self.experiment_id)
    }
}

/// `POST /experiments/update`: rename an experiment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateExperiment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,

    /// New name; absent means no change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
}

impl Message for UpdateExperiment {
    const NAME: &'static str = "UpdateExperiment";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("experiment_id", FieldKind::String),
        FieldSpec::scalar("new_name", FieldKind::String),
    ];

    fn validate(&self) -> Result<(), Failure> {
        require_str("experiment_id", &self.experiment_id)
    }
}

/// Empty body returned by delete, restore and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmptyResponse {}

// ---------------------------------------------------------------------------
// SearchExperiments
// ---------------------------------------------------------------------------

/// Which lifecycle stages a search includes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewType {
    #[default]
    ActiveOnly,
    DeletedOnly,
    All,
}

/// Default page size for `SearchExperiments`.
pub const SEARCH_DEFAULT_MAX_RESULTS: i64 = 1000;
/// Largest page size `SearchExperiments` accepts.
pub const SEARCH_MAX_RESULTS_LIMIT: i64 = 50_000;

/// `GET|POST /experiments/search`
///
/// All fields are optional. `order_by` may be given several times in a
/// query string (`?order_by=name&order_by=creation_time%20DESC`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchExperiments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_type: Option<ViewType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl Message for SearchExperiments {
    const NAME: &'static str = "SearchExperiments";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::scalar("max_results", FieldKind::Int),
        FieldSpec::scalar("view_type", FieldKind::String),
        FieldSpec::repeated("order_by", FieldKind::String),
        FieldSpec::scalar("page_token", FieldKind::String),
    ];
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchExperimentsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<Experiment>,

    /// Token for the next page; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_optionals_are_omitted() {
        let json = serde_json::to_string(&CreateExperiment {
            name: Some("a".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"name":"a"}"#);
    }

    #[test]
    fn empty_string_is_distinct_from_absent() {
        let present: CreateExperiment =
            serde_json::from_str(r#"{"name":"a","artifact_location":""}"#).unwrap();
        let absent: CreateExperiment = serde_json::from_str(r#"{"name":"a"}"#).unwrap();
        assert_eq!(present.artifact_location.as_deref(), Some(""));
        assert_eq!(absent.artifact_location, None);
    }

    #[test]
    fn create_requires_name() {
        let err = CreateExperiment::default().validate().unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidParameterValue);
        assert!(err.message().contains("'name'"));
    }

    #[test]
    fn view_type_wire_names() {
        let v: ViewType = serde_json::from_str(r#""DELETED_ONLY""#).unwrap();
        assert_eq!(v, ViewType::DeletedOnly);
    }
}
