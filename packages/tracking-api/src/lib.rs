//! Request, response and error types for the runledger tracking API.
//!
//! Every operation is a pair of typed messages plus an [`ErrorCode`]. Input
//! messages implement [`Message`], which carries the field table the server
//! uses to decode query strings. This crate has no HTTP dependency.
//!
//! # Endpoints covered
//!
//! Paths are relative to the configured prefix (default `/api/2.0/mlflow`).
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | POST | `/experiments/create` | [`CreateExperiment`] → [`CreateExperimentResponse`] |
//! | GET | `/experiments/get` | [`GetExperiment`] → [`GetExperimentResponse`] |
//! | GET | `/experiments/get-by-name` | [`GetExperimentByName`] → [`GetExperimentResponse`] |
//! | POST | `/experiments/delete` | [`DeleteExperiment`] → [`EmptyResponse`] |
//! | POST | `/experiments/restore` | [`RestoreExperiment`] → [`EmptyResponse`] |
//! | POST | `/experiments/update` | [`UpdateExperiment`] → [`EmptyResponse`] |
//! | GET, POST | `/experiments/search` | [`SearchExperiments`] → [`SearchExperimentsResponse`] |
//! | POST | `/registered-models/create` | [`CreateRegisteredModel`] → [`CreateRegisteredModelResponse`] |
//! | POST | `/model-versions/create` | [`CreateModelVersion`] → [`ModelVersionResponse`] |
//! | POST | `/model-versions/transition-stage` | [`TransitionModelVersionStage`] → [`ModelVersionResponse`] |
//! | GET, POST | `/registered-models/get-latest-versions` | [`GetLatestVersions`] → [`GetLatestVersionsResponse`] |

pub mod error;
pub mod experiment;
pub mod registry;
pub mod schema;

pub use error::{ErrorCode, Failure};
pub use experiment::{
    CreateExperiment, CreateExperimentResponse, DeleteExperiment, EmptyResponse, Experiment,
    ExperimentTag, GetExperiment, GetExperimentByName, GetExperimentResponse, RestoreExperiment,
    SearchExperiments, SearchExperimentsResponse, UpdateExperiment, ViewType,
};
pub use registry::{
    stages, CreateModelVersion, CreateRegisteredModel, CreateRegisteredModelResponse,
    GetLatestVersions, GetLatestVersionsResponse, ModelVersion, ModelVersionResponse,
    RegisteredModel, TransitionModelVersionStage,
};
pub use schema::{FieldKind, FieldSpec, Message};
