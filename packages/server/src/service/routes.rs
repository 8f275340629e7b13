use std::future::Future;
use std::sync::Arc;

use runledger_api::{Failure, Message};
use serde::Serialize;

use super::TrackingService;
use crate::dispatch::{Endpoint, Operation};
use crate::routes::RouteTable;

/// Bind every tracking and registry operation under `prefix`.
///
/// `prefix` has no trailing slash (e.g. `/api/2.0/mlflow`).
pub fn routes(service: &Arc<TrackingService>, prefix: &str) -> RouteTable {
    let path = |p: &str| format!("{prefix}{p}");

    let search = op(service, "SearchExperiments", TrackingService::search_experiments);
    let latest = op(service, "GetLatestVersions", TrackingService::get_latest_versions);

    RouteTable::new()
        // Experiments
        .post(
            path("/experiments/create"),
            op(service, "CreateExperiment", TrackingService::create_experiment),
        )
        .get(
            path("/experiments/get"),
            op(service, "GetExperiment", TrackingService::get_experiment),
        )
        .get(
            path("/experiments/get-by-name"),
            op(service, "GetExperimentByName", TrackingService::get_experiment_by_name),
        )
        .post(
            path("/experiments/delete"),
            op(service, "DeleteExperiment", TrackingService::delete_experiment),
        )
        .post(
            path("/experiments/restore"),
            op(service, "RestoreExperiment", TrackingService::restore_experiment),
        )
        .post(
            path("/experiments/update"),
            op(service, "UpdateExperiment", TrackingService::update_experiment),
        )
        .get(path("/experiments/search"), Arc::clone(&search))
        .post(path("/experiments/search"), search)
        // Model registry
        .post(
            path("/registered-models/create"),
            op(service, "CreateRegisteredModel", TrackingService::create_registered_model),
        )
        .post(
            path("/model-versions/create"),
            op(service, "CreateModelVersion", TrackingService::create_model_version),
        )
        .post(
            path("/model-versions/transition-stage"),
            op(
                service,
                "TransitionModelVersionStage",
                TrackingService::transition_model_version_stage,
            ),
        )
        .get(path("/registered-models/get-latest-versions"), Arc::clone(&latest))
        .post(path("/registered-models/get-latest-versions"), latest)
}

fn op<I, O, F, Fut>(service: &Arc<TrackingService>, name: &'static str, handler: F) -> Arc<dyn Endpoint>
where
    I: Message,
    O: Serialize + Send + Sync + 'static,
    F: Fn(Arc<TrackingService>, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, Failure>> + Send + 'static,
{
    let service = Arc::clone(service);
    Operation::new(name, move |input: I| handler(Arc::clone(&service), input)).into_endpoint()
}
