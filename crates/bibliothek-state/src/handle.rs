//! SurrealDB Handle - Connection and Catalog Operations
//!
//! Manages the connection and provides the catalog primitives:
//! - ensure_project / ensure_group / ensure_version (atomic find-or-create)
//! - insert_build (pure insert, duplicate identity rejected)
//! - latest_build and the read-side lookups
//!
//! Record ids are derived from identity tuples:
//! `projects:<name>`, `groups:[<project>, <name>]`,
//! `versions:[<project>, <name>]`, `builds:[<project>, <version>, <number>]`.
//! That makes every find-or-create a single `INSERT IGNORE` keyed by the
//! record id, and makes a second insert of the same build fail at the store.

use crate::config::ConnectionConfig;
use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{BuildRecord, GroupRecord, ProjectRecord, VersionRecord};
use crate::storage_traits::{
    Build, NewBuild, Project, StorageResult, Version, VersionGroup,
};
use crate::Result;
use serde::de::DeserializeOwned;
use std::time::Duration;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

/// Attempts after the first when a write loses a transaction conflict
const MAX_CONFLICT_RETRIES: u32 = 8;

/// SurrealDB connection handle for the build catalog
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to an in-memory database and set up the schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        Self::connect(&ConnectionConfig::in_memory()).await
    }

    /// Connect using a resolved [`ConnectionConfig`]
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        info!("Connecting to catalog database");

        let db = surrealdb::engine::any::connect(config.endpoint.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if let Some(creds) = &config.credentials {
            if creds.is_root {
                db.signin(Root {
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map_err(|e| {
                    StateError::Connection(format!("Root authentication failed: {}", e))
                })?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map_err(|e| {
                    StateError::Connection(format!("Database authentication failed: {}", e))
                })?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        migrations::init_schema(&db).await?;

        info!("Catalog database connected and schema initialized");
        Ok(SurrealHandle { db })
    }

    // ========== Hierarchy ==========

    /// Find or create a project. The friendly name is only written on insert.
    #[instrument(skip(self, friendly_name), fields(project = %name))]
    pub async fn ensure_project(&self, name: &str, friendly_name: &str) -> StorageResult<Project> {
        debug!("Resolving project");

        let found: Option<ProjectRecord> = self
            .find_or_create(
                "INSERT IGNORE INTO projects { id: $name, name: $name, friendlyName: $friendly_name };
                 SELECT * FROM type::thing('projects', $name);",
                "SELECT * FROM type::thing('projects', $name);",
                vec![
                    ("name", name.to_string()),
                    ("friendly_name", friendly_name.to_string()),
                ],
            )
            .await?;

        found
            .map(ProjectRecord::into_project)
            .ok_or_else(|| StorageError::Missing {
                table: "projects",
                key: name.to_string(),
            })
    }

    /// Find or create a version group of a project
    #[instrument(skip(self, project), fields(project = %project.name, group = %name))]
    pub async fn ensure_group(&self, project: &Project, name: &str) -> StorageResult<VersionGroup> {
        debug!("Resolving version group");

        let found: Option<GroupRecord> = self
            .find_or_create(
                "INSERT IGNORE INTO groups {
                     id: [$project, $name],
                     project: type::thing('projects', $project),
                     name: $name,
                     timestamp: time::now()
                 };
                 SELECT * FROM type::thing('groups', [$project, $name]);",
                "SELECT * FROM type::thing('groups', [$project, $name]);",
                vec![("project", project.name.clone()), ("name", name.to_string())],
            )
            .await?;

        found
            .map(GroupRecord::into_group)
            .ok_or_else(|| StorageError::Missing {
                table: "groups",
                key: format!("{}/{}", project.name, name),
            })
    }

    /// Find or create a version. The group reference is only written on insert.
    #[instrument(skip(self, project, group), fields(project = %project.name, group = %group.name, version = %name))]
    pub async fn ensure_version(
        &self,
        project: &Project,
        group: &VersionGroup,
        name: &str,
    ) -> StorageResult<Version> {
        debug!("Resolving version");

        let found: Option<VersionRecord> = self
            .find_or_create(
                "INSERT IGNORE INTO versions {
                     id: [$project, $name],
                     project: type::thing('projects', $project),
                     \"group\": type::thing('groups', [$project, $group]),
                     name: $name,
                     timestamp: time::now()
                 };
                 SELECT * FROM type::thing('versions', [$project, $name]);",
                "SELECT * FROM type::thing('versions', [$project, $name]);",
                vec![
                    ("project", project.name.clone()),
                    ("group", group.name.clone()),
                    ("name", name.to_string()),
                ],
            )
            .await?;

        let version = found
            .map(VersionRecord::into_version)
            .ok_or_else(|| StorageError::Missing {
                table: "versions",
                key: format!("{}/{}", project.name, name),
            })?;

        if version.group_id != group.id {
            debug!(
                existing_group = %version.group_id,
                "version already belongs to another group; keeping original association"
            );
        }
        Ok(version)
    }

    /// Run an `INSERT IGNORE` + `SELECT` pair and return the selected record.
    ///
    /// Concurrent inserts of the same id can lose with a retriable
    /// transaction conflict. The record the winner wrote is then read back
    /// with `lookup`; if it is not there yet the upsert is attempted again.
    async fn find_or_create<R>(
        &self,
        upsert: &'static str,
        lookup: &'static str,
        bindings: Vec<(&'static str, String)>,
    ) -> StorageResult<Option<R>>
    where
        R: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            let mut query = self.db.query(upsert);
            for binding in &bindings {
                query = query.bind(binding.clone());
            }
            let error = match query.await.and_then(|response| response.check()) {
                Ok(mut response) => {
                    let rows: Vec<R> = response.take(1)?;
                    return Ok(rows.into_iter().next());
                }
                Err(e) => e,
            };

            if !is_transaction_conflict(&error.to_string()) || attempt >= MAX_CONFLICT_RETRIES {
                return Err(error.into());
            }
            attempt += 1;
            debug!(attempt, "find-or-create hit a write conflict");

            let mut query = self.db.query(lookup);
            for binding in &bindings {
                query = query.bind(binding.clone());
            }
            let rows: Vec<R> = query.await?.take(0)?;
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(row));
            }
            tokio::time::sleep(conflict_backoff(attempt)).await;
        }
    }

    // ========== Builds ==========

    /// Insert a build record. Fails with `DuplicateBuild` if the
    /// (project, version, number) identity is taken.
    #[instrument(skip(self, project, version, build), fields(project = %project.name, version = %version.name, number = build.number))]
    pub async fn insert_build(
        &self,
        project: &Project,
        version: &Version,
        build: NewBuild,
    ) -> StorageResult<Build> {
        debug!("Inserting build");

        let number = build.number;
        let duplicate = || StorageError::DuplicateBuild {
            project: project.name.clone(),
            version: version.name.clone(),
            number,
        };

        let mut attempt = 0;
        let mut result = loop {
            let response = self
                .db
                .query(
                    "CREATE type::thing('builds', [$project, $version, $number]) CONTENT {
                         project: type::thing('projects', $project),
                         version: type::thing('versions', [$project, $version]),
                         number: $number,
                         timestamp: time::now(),
                         changes: $changes,
                         downloads: $downloads,
                         displayMode: $display_mode,
                         channel: $channel
                     };",
                )
                .bind(("project", project.name.clone()))
                .bind(("version", version.name.clone()))
                .bind(("number", number))
                .bind(("changes", build.changes.clone()))
                .bind(("downloads", build.downloads.clone()))
                .bind(("display_mode", crate::DisplayMode::Hide.as_str()))
                .bind(("channel", build.channel.as_str()))
                .await?;

            let error = match response.check() {
                Ok(result) => break result,
                Err(e) => e.to_string(),
            };
            if is_uniqueness_violation(&error) {
                return Err(duplicate());
            }
            if !is_transaction_conflict(&error) {
                return Err(StorageError::Backend(error));
            }

            // A concurrent insert of the same identity may have won the
            // conflict. The number is never changed here.
            if self.get_build(project, version, number).await?.is_some() {
                return Err(duplicate());
            }
            if attempt >= MAX_CONFLICT_RETRIES {
                return Err(StorageError::Backend(error));
            }
            attempt += 1;
            debug!(attempt, "build insert hit a write conflict");
            tokio::time::sleep(conflict_backoff(attempt)).await;
        };

        let created: Vec<BuildRecord> = result.take(0)?;
        let build = created
            .into_iter()
            .next()
            .map(BuildRecord::into_build)
            .ok_or_else(|| StorageError::Missing {
                table: "builds",
                key: format!("{}/{}/{}", project.name, version.name, number),
            })?;

        info!(build_id = %build.id, "Build inserted");
        Ok(build)
    }

    /// Highest-numbered build of a version
    #[instrument(skip(self, project, version), fields(project = %project.name, version = %version.name))]
    pub async fn latest_build(
        &self,
        project: &Project,
        version: &Version,
    ) -> StorageResult<Option<Build>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM builds
                 WHERE project = type::thing('projects', $project)
                   AND version = type::thing('versions', [$project, $version])
                 ORDER BY number DESC LIMIT 1",
            )
            .bind(("project", project.name.clone()))
            .bind(("version", version.name.clone()))
            .await?;

        let builds: Vec<BuildRecord> = result.take(0)?;
        Ok(builds.into_iter().next().map(BuildRecord::into_build))
    }

    #[instrument(skip(self, project, version), fields(project = %project.name, version = %version.name))]
    pub async fn get_build(
        &self,
        project: &Project,
        version: &Version,
        number: u32,
    ) -> StorageResult<Option<Build>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::thing('builds', [$project, $version, $number])")
            .bind(("project", project.name.clone()))
            .bind(("version", version.name.clone()))
            .bind(("number", number))
            .await?;

        let builds: Vec<BuildRecord> = result.take(0)?;
        Ok(builds.into_iter().next().map(BuildRecord::into_build))
    }

    #[instrument(skip(self, project, version), fields(project = %project.name, version = %version.name))]
    pub async fn list_builds(&self, project: &Project, version: &Version) -> StorageResult<Vec<Build>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM builds
                 WHERE project = type::thing('projects', $project)
                   AND version = type::thing('versions', [$project, $version])
                 ORDER BY number ASC",
            )
            .bind(("project", project.name.clone()))
            .bind(("version", version.name.clone()))
            .await?;

        let builds: Vec<BuildRecord> = result.take(0)?;
        Ok(builds.into_iter().map(BuildRecord::into_build).collect())
    }

    // ========== Lookups ==========

    #[instrument(skip(self))]
    pub async fn find_project(&self, name: &str) -> StorageResult<Option<Project>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::thing('projects', $name)")
            .bind(("name", name.to_string()))
            .await?;

        let projects: Vec<ProjectRecord> = result.take(0)?;
        Ok(projects.into_iter().next().map(ProjectRecord::into_project))
    }

    #[instrument(skip(self, project), fields(project = %project.name))]
    pub async fn find_version(&self, project: &Project, name: &str) -> StorageResult<Option<Version>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::thing('versions', [$project, $name])")
            .bind(("project", project.name.clone()))
            .bind(("name", name.to_string()))
            .await?;

        let versions: Vec<VersionRecord> = result.take(0)?;
        Ok(versions.into_iter().next().map(VersionRecord::into_version))
    }

    #[instrument(skip(self))]
    pub async fn list_projects(&self) -> StorageResult<Vec<Project>> {
        let mut result = self.db.query("SELECT * FROM projects ORDER BY name").await?;

        let projects: Vec<ProjectRecord> = result.take(0)?;
        Ok(projects.into_iter().map(ProjectRecord::into_project).collect())
    }

    #[instrument(skip(self, project), fields(project = %project.name))]
    pub async fn list_groups(&self, project: &Project) -> StorageResult<Vec<VersionGroup>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM groups WHERE project = type::thing('projects', $project) ORDER BY timestamp",
            )
            .bind(("project", project.name.clone()))
            .await?;

        let groups: Vec<GroupRecord> = result.take(0)?;
        Ok(groups.into_iter().map(GroupRecord::into_group).collect())
    }

    #[instrument(skip(self, project), fields(project = %project.name))]
    pub async fn list_versions(&self, project: &Project) -> StorageResult<Vec<Version>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM versions WHERE project = type::thing('projects', $project) ORDER BY timestamp",
            )
            .bind(("project", project.name.clone()))
            .await?;

        let versions: Vec<VersionRecord> = result.take(0)?;
        Ok(versions.into_iter().map(VersionRecord::into_version).collect())
    }
}

/// Record-id collisions report "already exists"; unique index violations
/// report "already contains".
fn is_uniqueness_violation(message: &str) -> bool {
    message.contains("already exists") || message.contains("already contains")
}

/// Optimistic transactions that touched the same keys as a concurrent
/// commit fail with a retriable conflict.
fn is_transaction_conflict(message: &str) -> bool {
    message.contains("read or write conflict") || message.contains("can be retried")
}

fn conflict_backoff(attempt: u32) -> Duration {
    Duration::from_millis(5 * u64::from(attempt))
}
