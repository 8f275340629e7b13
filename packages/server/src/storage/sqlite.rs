//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! - `experiments`: one row per experiment; `experiment_id` is an
//!   `AUTOINCREMENT` key so ids are never reused.
//! - `experiment_tags`: `(experiment_id, key)` → value.
//! - `registered_models`: registered model names.
//! - `model_versions`: `(name, version)` with the current stage.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use runledger_api::registry::VERSION_STATUS_READY;
use runledger_api::{stages, Experiment, ExperimentTag, ModelVersion, RegisteredModel, ViewType};

use super::{
    now_millis, ExperimentFilter, NewExperiment, NewModelVersion, OrderBy, OrderKey, Store,
    StoreError,
};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS experiments (
    experiment_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT NOT NULL UNIQUE,
    artifact_location TEXT NOT NULL,
    lifecycle_stage   TEXT NOT NULL DEFAULT 'active',
    creation_time     INTEGER NOT NULL,
    last_update_time  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_experiments_stage ON experiments(lifecycle_stage);

CREATE TABLE IF NOT EXISTS experiment_tags (
    experiment_id INTEGER NOT NULL REFERENCES experiments(experiment_id),
    key           TEXT NOT NULL,
    value         TEXT NOT NULL,
    PRIMARY KEY (experiment_id, key)
);

CREATE TABLE IF NOT EXISTS registered_models (
    name                   TEXT PRIMARY KEY,
    description            TEXT,
    creation_timestamp     INTEGER NOT NULL,
    last_updated_timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS model_versions (
    name                   TEXT NOT NULL REFERENCES registered_models(name),
    version                INTEGER NOT NULL,
    creation_timestamp     INTEGER NOT NULL,
    last_updated_timestamp INTEGER NOT NULL,
    current_stage          TEXT NOT NULL,
    description            TEXT,
    source                 TEXT NOT NULL,
    run_id                 TEXT,
    status                 TEXT NOT NULL,
    PRIMARY KEY (name, version)
);
";

const EXPERIMENT_COLUMNS: &str =
    "experiment_id, name, artifact_location, lifecycle_stage, last_update_time, creation_time";

const VERSION_COLUMNS: &str = "name, version, creation_timestamp, last_updated_timestamp, \
     current_stage, description, source, run_id, status";

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Store`].
///
/// Holds a single database connection protected by a `Mutex`. All operations
/// run inside `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("task join error: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock()
        .map_err(|_| StoreError::Internal("sqlite connection lock poisoned".into()))
}

// ---------------------------------------------------------------------------
// Error conversions and row mapping
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StoreError {
    StoreError::Internal(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn experiment_from_row(row: &Row<'_>) -> rusqlite::Result<Experiment> {
    Ok(Experiment {
        experiment_id: row.get::<_, i64>(0)?.to_string(),
        name: row.get(1)?,
        artifact_location: row.get(2)?,
        lifecycle_stage: row.get(3)?,
        last_update_time: row.get(4)?,
        creation_time: row.get(5)?,
        tags: Vec::new(),
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ModelVersion> {
    Ok(ModelVersion {
        name: row.get(0)?,
        version: row.get::<_, i64>(1)?.to_string(),
        creation_timestamp: row.get(2)?,
        last_updated_timestamp: row.get(3)?,
        current_stage: row.get(4)?,
        description: row.get(5)?,
        source: row.get(6)?,
        run_id: row.get(7)?,
        status: row.get(8)?,
    })
}

fn load_tags(conn: &Connection, experiment: &mut Experiment) -> Result<(), StoreError> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM experiment_tags WHERE experiment_id = ?1 ORDER BY key")
        .map_err(map_err)?;
    let tags = stmt
        .query_map(params![experiment.experiment_id], |row| {
            Ok(ExperimentTag {
                key: Some(row.get(0)?),
                value: Some(row.get(1)?),
            })
        })
        .map_err(map_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(map_err)?;
    experiment.tags = tags;
    Ok(())
}

fn find_experiment(
    conn: &Connection,
    column: &str,
    value: &dyn rusqlite::ToSql,
) -> Result<Option<Experiment>, StoreError> {
    let sql = format!("SELECT {EXPERIMENT_COLUMNS} FROM experiments WHERE {column} = ?1");
    let found = conn
        .query_row(&sql, params![value], experiment_from_row)
        .optional()
        .map_err(map_err)?;
    match found {
        Some(mut experiment) => {
            load_tags(conn, &mut experiment)?;
            Ok(Some(experiment))
        }
        None => Ok(None),
    }
}

fn order_clause(order_by: &[OrderBy]) -> String {
    let mut terms: Vec<String> = order_by
        .iter()
        .map(|o| {
            let column = match o.key {
                OrderKey::Name => "name",
                OrderKey::ExperimentId => "experiment_id",
                OrderKey::CreationTime => "creation_time",
                OrderKey::LastUpdateTime => "last_update_time",
            };
            format!("{column} {}", if o.ascending { "ASC" } else { "DESC" })
        })
        .collect();
    terms.push("experiment_id ASC".into());
    terms.join(", ")
}

fn parse_version(version: &str) -> Option<i64> {
    version.parse().ok()
}

// ---------------------------------------------------------------------------
// Store impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Store for SqliteStore {
    // --- Experiments ---------------------------------------------------------

    async fn create_experiment(&self, experiment: NewExperiment) -> Result<String, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            let now = now_millis();

            // The default location embeds the id, so insert first and fill
            // the location in once the id is known.
            let inserted = tx.execute(
                "INSERT INTO experiments
                    (name, artifact_location, lifecycle_stage, creation_time, last_update_time)
                 VALUES (?1, '', 'active', ?2, ?2)",
                params![experiment.name, now],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::Conflict(format!(
                        "Experiment(name={}) already exists",
                        experiment.name
                    )));
                }
                Err(e) => return Err(map_err(e)),
            }
            let id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE experiments SET artifact_location = ?1 WHERE experiment_id = ?2",
                params![experiment.artifact_location.resolve(id), id],
            )
            .map_err(map_err)?;

            for (key, value) in &experiment.tags {
                tx.execute(
                    "INSERT OR REPLACE INTO experiment_tags (experiment_id, key, value)
                     VALUES (?1, ?2, ?3)",
                    params![id, key, value],
                )
                .map_err(map_err)?;
            }

            tx.commit().map_err(map_err)?;
            Ok(id.to_string())
        })
        .await
    }

    async fn get_experiment(&self, id: &str) -> Result<Option<Experiment>, StoreError> {
        let Ok(key) = id.parse::<i64>() else {
            return Ok(None);
        };
        self.with_conn(move |conn| find_experiment(conn, "experiment_id", &key))
            .await
    }

    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| find_experiment(conn, "name", &name))
            .await
    }

    async fn set_lifecycle_stage(&self, id: &str, stage: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        let stage = stage.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE experiments SET lifecycle_stage = ?1, last_update_time = ?2
                     WHERE experiment_id = ?3",
                    params![stage, now_millis(), id],
                )
                .map_err(map_err)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("experiment {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn rename_experiment(&self, id: &str, new_name: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        let new_name = new_name.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE experiments SET name = ?1, last_update_time = ?2
                 WHERE experiment_id = ?3",
                params![new_name, now_millis(), id],
            );
            match changed {
                Ok(0) => Err(StoreError::NotFound(format!("experiment {id}"))),
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                    "Experiment(name={new_name}) already exists"
                ))),
                Err(e) => Err(map_err(e)),
            }
        })
        .await
    }

    async fn list_experiments(
        &self,
        filter: &ExperimentFilter,
    ) -> Result<Vec<Experiment>, StoreError> {
        let stage_clause = match filter.view_type {
            ViewType::All => "",
            ViewType::ActiveOnly => "WHERE lifecycle_stage = 'active'",
            ViewType::DeletedOnly => "WHERE lifecycle_stage = 'deleted'",
        };
        let sql = format!(
            "SELECT {EXPERIMENT_COLUMNS} FROM experiments {stage_clause}
             ORDER BY {} LIMIT ?1 OFFSET ?2",
            order_clause(&filter.order_by)
        );
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(filter.offset).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let mut experiments = {
                let mut stmt = conn.prepare(&sql).map_err(map_err)?;
                let rows = stmt
                    .query_map(params![limit, offset], experiment_from_row)
                    .map_err(map_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_err)?
            };
            for experiment in &mut experiments {
                load_tags(conn, experiment)?;
            }
            Ok(experiments)
        })
        .await
    }

    // --- Model registry ------------------------------------------------------

    async fn create_registered_model(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<RegisteredModel, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let now = now_millis();
            let inserted = conn.execute(
                "INSERT INTO registered_models
                    (name, description, creation_timestamp, last_updated_timestamp)
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, description, now],
            );
            match inserted {
                Ok(_) => Ok(RegisteredModel {
                    name,
                    creation_timestamp: now,
                    last_updated_timestamp: now,
                    description,
                    latest_versions: Vec::new(),
                }),
                Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                    "Registered Model (name={name}) already exists"
                ))),
                Err(e) => Err(map_err(e)),
            }
        })
        .await
    }

    async fn get_registered_model(
        &self,
        name: &str,
    ) -> Result<Option<RegisteredModel>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT name, description, creation_timestamp, last_updated_timestamp
                 FROM registered_models WHERE name = ?1",
                params![name],
                |row| {
                    Ok(RegisteredModel {
                        name: row.get(0)?,
                        description: row.get(1)?,
                        creation_timestamp: row.get(2)?,
                        last_updated_timestamp: row.get(3)?,
                        latest_versions: Vec::new(),
                    })
                },
            )
            .optional()
            .map_err(map_err)
        })
        .await
    }

    async fn create_model_version(
        &self,
        version: NewModelVersion,
    ) -> Result<ModelVersion, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            let exists: bool = tx
                .query_row(
                    "SELECT COUNT(*) FROM registered_models WHERE name = ?1",
                    params![version.name],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(map_err)?
                > 0;
            if !exists {
                return Err(StoreError::NotFound(format!(
                    "registered model {}",
                    version.name
                )));
            }

            let next: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(version), 0) + 1 FROM model_versions WHERE name = ?1",
                    params![version.name],
                    |row| row.get(0),
                )
                .map_err(map_err)?;
            let now = now_millis();
            tx.execute(
                "INSERT INTO model_versions
                    (name, version, creation_timestamp, last_updated_timestamp,
                     current_stage, description, source, run_id, status)
                 VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    version.name,
                    next,
                    now,
                    stages::NONE,
                    version.description,
                    version.source,
                    version.run_id,
                    VERSION_STATUS_READY,
                ],
            )
            .map_err(map_err)?;
            tx.execute(
                "UPDATE registered_models SET last_updated_timestamp = ?1 WHERE name = ?2",
                params![now, version.name],
            )
            .map_err(map_err)?;
            tx.commit().map_err(map_err)?;

            Ok(ModelVersion {
                name: version.name,
                version: next.to_string(),
                creation_timestamp: now,
                last_updated_timestamp: now,
                current_stage: stages::NONE.into(),
                description: version.description,
                source: version.source,
                run_id: version.run_id,
                status: VERSION_STATUS_READY.into(),
            })
        })
        .await
    }

    async fn list_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let sql =
                format!("SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 ORDER BY version");
            let mut stmt = conn.prepare(&sql).map_err(map_err)?;
            let rows = stmt
                .query_map(params![name], version_from_row)
                .map_err(map_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_err)
        })
        .await
    }

    async fn set_model_version_stage(
        &self,
        name: &str,
        version: &str,
        stage: &str,
        archive_existing: bool,
    ) -> Result<ModelVersion, StoreError> {
        let missing = || StoreError::NotFound(format!("model version {name}/{version}"));
        let number = parse_version(version).ok_or_else(missing)?;
        let name = name.to_string();
        let stage = stage.to_string();
        let not_found = missing();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            let now = now_millis();
            let changed = tx
                .execute(
                    "UPDATE model_versions SET current_stage = ?1, last_updated_timestamp = ?2
                     WHERE name = ?3 AND version = ?4",
                    params![stage, now, name, number],
                )
                .map_err(map_err)?;
            if changed == 0 {
                return Err(not_found);
            }
            if archive_existing {
                tx.execute(
                    "UPDATE model_versions SET current_stage = ?1, last_updated_timestamp = ?2
                     WHERE name = ?3 AND version != ?4 AND current_stage = ?5",
                    params![stages::ARCHIVED, now, name, number, stage],
                )
                .map_err(map_err)?;
            }
            let sql = format!(
                "SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 AND version = ?2"
            );
            let updated = tx
                .query_row(&sql, params![name, number], version_from_row)
                .map_err(map_err)?;
            tx.commit().map_err(map_err)?;
            Ok(updated)
        })
        .await
    }
}
