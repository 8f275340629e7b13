//! Experiment operations: create, get, get-by-name, delete, restore, update
//! and search.

use std::sync::Arc;

use runledger_api::experiment::{
    SEARCH_DEFAULT_MAX_RESULTS, SEARCH_MAX_RESULTS_LIMIT, STAGE_ACTIVE, STAGE_DELETED,
};
use runledger_api::{
    CreateExperiment, CreateExperimentResponse, DeleteExperiment, EmptyResponse, ErrorCode,
    Experiment, Failure, GetExperiment, GetExperimentByName, GetExperimentResponse,
    RestoreExperiment, SearchExperiments, SearchExperimentsResponse, UpdateExperiment,
};

use super::TrackingService;
use crate::artifact::normalize_artifact_location;
use crate::storage::{ArtifactLocation, ExperimentFilter, NewExperiment, OrderBy, OrderKey};

impl TrackingService {
    pub async fn create_experiment(
        self: Arc<Self>,
        req: CreateExperiment,
    ) -> Result<CreateExperimentResponse, Failure> {
        let name = req.name.unwrap_or_default();

        let artifact_location = match req.artifact_location.as_deref() {
            Some(raw) => normalize_artifact_location(raw)?,
            None => None,
        };
        let artifact_location = match artifact_location {
            Some(location) => ArtifactLocation::Explicit(location),
            None => ArtifactLocation::UnderRoot(self.artifact_root.clone()),
        };

        let tags = req
            .tags
            .into_iter()
            .map(|t| (t.key.unwrap_or_default(), t.value.unwrap_or_default()))
            .collect();

        let experiment_id = self
            .store
            .create_experiment(NewExperiment {
                name: name.clone(),
                artifact_location,
                tags,
            })
            .await?;
        tracing::info!(experiment_id = %experiment_id, name = %name, "experiment created");
        Ok(CreateExperimentResponse { experiment_id })
    }

    pub async fn get_experiment(
        self: Arc<Self>,
        req: GetExperiment,
    ) -> Result<GetExperimentResponse, Failure> {
        let id = req.experiment_id.unwrap_or_default();
        let experiment = self.experiment_by_id(&id).await?;
        Ok(GetExperimentResponse { experiment })
    }

    pub async fn get_experiment_by_name(
        self: Arc<Self>,
        req: GetExperimentByName,
    ) -> Result<GetExperimentResponse, Failure> {
        let name = req.experiment_name.unwrap_or_default();
        let experiment = self
            .store
            .get_experiment_by_name(&name)
            .await?
            .ok_or_else(|| {
                Failure::not_found(format!("Could not find experiment with name '{name}'"))
            })?;
        Ok(GetExperimentResponse { experiment })
    }

    pub async fn delete_experiment(
        self: Arc<Self>,
        req: DeleteExperiment,
    ) -> Result<EmptyResponse, Failure> {
        let id = req.experiment_id.unwrap_or_default();
        let experiment = self.experiment_by_id(&id).await?;
        if experiment.lifecycle_stage == STAGE_DELETED {
            return Err(Failure::new(
                ErrorCode::InvalidState,
                format!("Cannot delete an already deleted experiment (id={id})"),
            ));
        }
        self.store.set_lifecycle_stage(&id, STAGE_DELETED).await?;
        tracing::info!(experiment_id = %id, "experiment deleted");
        Ok(EmptyResponse {})
    }

    pub async fn restore_experiment(
        self: Arc<Self>,
        req: RestoreExperiment,
    ) -> Result<EmptyResponse, Failure> {
        let id = req.experiment_id.unwrap_or_default();
        let experiment = self.experiment_by_id(&id).await?;
        if experiment.lifecycle_stage != STAGE_DELETED {
            return Err(Failure::new(
                ErrorCode::InvalidState,
                format!("Cannot restore an active experiment (id={id})"),
            ));
        }
        self.store.set_lifecycle_stage(&id, STAGE_ACTIVE).await?;
        tracing::info!(experiment_id = %id, "experiment restored");
        Ok(EmptyResponse {})
    }

    pub async fn update_experiment(
        self: Arc<Self>,
        req: UpdateExperiment,
    ) -> Result<EmptyResponse, Failure> {
        let id = req.experiment_id.unwrap_or_default();
        let new_name = match req.new_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(Failure::invalid_parameter("The experiment name cannot be empty")),
        };
        let experiment = self.experiment_by_id(&id).await?;
        if experiment.lifecycle_stage != STAGE_ACTIVE {
            return Err(Failure::new(
                ErrorCode::InvalidState,
                format!("Cannot rename a non-active experiment (id={id})"),
            ));
        }
        self.store.rename_experiment(&id, &new_name).await?;
        tracing::info!(experiment_id = %id, new_name = %new_name, "experiment renamed");
        Ok(EmptyResponse {})
    }

    pub async fn search_experiments(
        self: Arc<Self>,
        req: SearchExperiments,
    ) -> Result<SearchExperimentsResponse, Failure> {
        let max_results = req.max_results.unwrap_or(SEARCH_DEFAULT_MAX_RESULTS);
        if !(1..=SEARCH_MAX_RESULTS_LIMIT).contains(&max_results) {
            return Err(Failure::invalid_parameter(format!(
                "Invalid value {max_results} for parameter 'max_results' supplied. \
                 It must be between 1 and {SEARCH_MAX_RESULTS_LIMIT}"
            )));
        }
        let page_size = usize::try_from(max_results).unwrap_or(1);

        let order_by = if req.order_by.is_empty() {
            OrderBy::DEFAULT.to_vec()
        } else {
            req.order_by
                .iter()
                .map(|clause| parse_order_by(clause))
                .collect::<Result<Vec<_>, _>>()?
        };
        let offset = parse_page_token(req.page_token.as_deref())?;

        let filter = ExperimentFilter {
            view_type: req.view_type.unwrap_or_default(),
            order_by,
            offset,
            limit: page_size + 1,
        };
        let mut experiments = self.store.list_experiments(&filter).await?;

        let next_page_token = if experiments.len() > page_size {
            experiments.truncate(page_size);
            Some((offset + page_size).to_string())
        } else {
            None
        };
        Ok(SearchExperimentsResponse {
            experiments,
            next_page_token,
        })
    }

    async fn experiment_by_id(&self, id: &str) -> Result<Experiment, Failure> {
        self.store
            .get_experiment(id)
            .await?
            .ok_or_else(|| Failure::not_found(format!("No Experiment with id={id} exists")))
    }
}

/// Parse one `order_by` clause: `<key> [ASC|DESC]`, where the key may carry
/// an `attribute.` prefix.
fn parse_order_by(clause: &str) -> Result<OrderBy, Failure> {
    let invalid = || Failure::invalid_parameter(format!("Invalid order_by clause '{clause}'"));

    let mut tokens = clause.split_whitespace();
    let key = tokens.next().ok_or_else(invalid)?;
    let ascending = match tokens.next() {
        None => true,
        Some(dir) if dir.eq_ignore_ascii_case("asc") => true,
        Some(dir) if dir.eq_ignore_ascii_case("desc") => false,
        Some(_) => return Err(invalid()),
    };
    if tokens.next().is_some() {
        return Err(invalid());
    }

    let key = match key.strip_prefix("attribute.").unwrap_or(key) {
        "name" => OrderKey::Name,
        "experiment_id" => OrderKey::ExperimentId,
        "creation_time" => OrderKey::CreationTime,
        "last_update_time" => OrderKey::LastUpdateTime,
        _ => return Err(invalid()),
    };
    Ok(OrderBy { key, ascending })
}

/// Page tokens are the decimal offset of the next page's first row.
fn parse_page_token(token: Option<&str>) -> Result<usize, Failure> {
    match token {
        None | Some("") => Ok(0),
        Some(t) => t
            .parse()
            .map_err(|_| Failure::invalid_parameter(format!("Invalid page token '{t}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use runledger_api::{ExperimentTag, ViewType};

    fn service() -> Arc<TrackingService> {
        TrackingService::new(Arc::new(MemoryStore::new()), "/srv/mlruns")
    }

    async fn create(svc: &Arc<TrackingService>, name: &str) -> String {
        Arc::clone(svc)
            .create_experiment(CreateExperiment {
                name: Some(name.into()),
                ..Default::default()
            })
            .await
            .unwrap()
            .experiment_id
    }

    async fn get(svc: &Arc<TrackingService>, id: &str) -> Result<Experiment, Failure> {
        Arc::clone(svc)
            .get_experiment(GetExperiment {
                experiment_id: Some(id.into()),
            })
            .await
            .map(|r| r.experiment)
    }

    #[tokio::test]
    async fn create_assigns_location_under_root() {
        let svc = service();
        let id = create(&svc, "exp").await;
        let exp = get(&svc, &id).await.unwrap();
        assert_eq!(exp.artifact_location, format!("/srv/mlruns/{id}"));
        assert_eq!(exp.lifecycle_stage, STAGE_ACTIVE);
    }

    #[tokio::test]
    async fn create_normalises_explicit_location() {
        let svc = service();
        let id = Arc::clone(&svc)
            .create_experiment(CreateExperiment {
                name: Some("exp".into()),
                artifact_location: Some("s3://bucket/path/".into()),
                tags: vec![ExperimentTag {
                    key: Some("team".into()),
                    value: Some("ml".into()),
                }],
            })
            .await
            .unwrap()
            .experiment_id;
        let exp = get(&svc, &id).await.unwrap();
        assert_eq!(exp.artifact_location, "s3://bucket/path");
        assert_eq!(exp.tags.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_bad_location() {
        let err = service()
            .create_experiment(CreateExperiment {
                name: Some("exp".into()),
                artifact_location: Some("://nowhere".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
    }

    #[tokio::test]
    async fn duplicate_name_already_exists() {
        let svc = service();
        create(&svc, "exp").await;
        let err = Arc::clone(&svc)
            .create_experiment(CreateExperiment {
                name: Some("exp".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn missing_experiment_is_not_found() {
        let err = get(&service(), "42").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.message(), "No Experiment with id=42 exists");
    }

    #[tokio::test]
    async fn get_by_name() {
        let svc = service();
        let id = create(&svc, "named").await;
        let resp = Arc::clone(&svc)
            .get_experiment_by_name(GetExperimentByName {
                experiment_name: Some("named".into()),
            })
            .await
            .unwrap();
        assert_eq!(resp.experiment.experiment_id, id);
    }

    #[tokio::test]
    async fn delete_restore_lifecycle() {
        let svc = service();
        let id = create(&svc, "exp").await;
        let del = || DeleteExperiment {
            experiment_id: Some(id.clone()),
        };
        let restore = || RestoreExperiment {
            experiment_id: Some(id.clone()),
        };

        let err = Arc::clone(&svc).restore_experiment(restore()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);

        Arc::clone(&svc).delete_experiment(del()).await.unwrap();
        assert_eq!(get(&svc, &id).await.unwrap().lifecycle_stage, STAGE_DELETED);

        let err = Arc::clone(&svc).delete_experiment(del()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);

        Arc::clone(&svc).restore_experiment(restore()).await.unwrap();
        assert_eq!(get(&svc, &id).await.unwrap().lifecycle_stage, STAGE_ACTIVE);
    }

    #[tokio::test]
    async fn update_renames() {
        let svc = service();
        let id = create(&svc, "old").await;
        let err = Arc::clone(&svc)
            .update_experiment(UpdateExperiment {
                experiment_id: Some(id.clone()),
                new_name: Some(String::new()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);

        Arc::clone(&svc)
            .update_experiment(UpdateExperiment {
                experiment_id: Some(id.clone()),
                new_name: Some("new".into()),
            })
            .await
            .unwrap();
        assert_eq!(get(&svc, &id).await.unwrap().name, "new");
    }

    #[tokio::test]
    async fn search_pages_through_results() {
        let svc = service();
        for name in ["a", "b", "c"] {
            create(&svc, name).await;
        }
        let page = |token: Option<String>| SearchExperiments {
            max_results: Some(2),
            order_by: vec!["name ASC".into()],
            page_token: token,
            ..Default::default()
        };

        let first = Arc::clone(&svc).search_experiments(page(None)).await.unwrap();
        let names: Vec<_> = first.experiments.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        let token = first.next_page_token.clone();
        assert_eq!(token.as_deref(), Some("2"));

        let second = Arc::clone(&svc).search_experiments(page(token)).await.unwrap();
        let names: Vec<_> = second.experiments.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c"]);
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn search_view_type_filters_deleted() {
        let svc = service();
        let id = create(&svc, "gone").await;
        create(&svc, "kept").await;
        Arc::clone(&svc)
            .delete_experiment(DeleteExperiment {
                experiment_id: Some(id),
            })
            .await
            .unwrap();

        let deleted = Arc::clone(&svc)
            .search_experiments(SearchExperiments {
                view_type: Some(ViewType::DeletedOnly),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(deleted.experiments.len(), 1);
        assert_eq!(deleted.experiments[0].name, "gone");

        let all = Arc::clone(&svc)
            .search_experiments(SearchExperiments {
                view_type: Some(ViewType::All),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.experiments.len(), 2);
    }

    #[tokio::test]
    async fn search_rejects_bad_arguments() {
        let svc = service();
        for req in [
            SearchExperiments {
                max_results: Some(0),
                ..Default::default()
            },
            SearchExperiments {
                max_results: Some(SEARCH_MAX_RESULTS_LIMIT + 1),
                ..Default::default()
            },
            SearchExperiments {
                order_by: vec!["colour".into()],
                ..Default::default()
            },
            SearchExperiments {
                page_token: Some("not-a-token".into()),
                ..Default::default()
            },
        ] {
            let err = Arc::clone(&svc).search_experiments(req).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
        }
    }

    #[test]
    fn order_by_clauses() {
        assert_eq!(
            parse_order_by("attribute.name DESC").unwrap(),
            OrderBy {
                key: OrderKey::Name,
                ascending: false
            }
        );
        assert_eq!(
            parse_order_by("creation_time").unwrap(),
            OrderBy {
                key: OrderKey::CreationTime,
                ascending: true
            }
        );
        assert!(parse_order_by("name sideways").is_err());
        assert!(parse_order_by("name ASC extra").is_err());
        assert!(parse_order_by("").is_err());
    }
}
