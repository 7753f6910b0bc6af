use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::storage_traits::{
    Build, CatalogStore, NewBuild, Project, StorageResult, Version, VersionGroup,
};
use crate::SurrealHandle;

/// SurrealDB-backed implementation of the CatalogStore trait.
#[derive(Clone)]
pub struct SurrealCatalogStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealCatalogStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }

    /// Connect and initialise the schema in one step.
    pub async fn connect(config: &ConnectionConfig) -> crate::Result<Self> {
        let handle = SurrealHandle::connect(config).await?;
        Ok(Self::new(Arc::new(handle)))
    }

    /// Fresh in-memory catalog, for tests.
    pub async fn in_memory() -> crate::Result<Self> {
        let handle = SurrealHandle::setup_db().await?;
        Ok(Self::new(Arc::new(handle)))
    }
}

#[async_trait]
impl CatalogStore for SurrealCatalogStore {
    async fn ensure_project(&self, name: &str, friendly_name: &str) -> StorageResult<Project> {
        self.handle.ensure_project(name, friendly_name).await
    }

    async fn ensure_group(&self, project: &Project, name: &str) -> StorageResult<VersionGroup> {
        self.handle.ensure_group(project, name).await
    }

    async fn ensure_version(
        &self,
        project: &Project,
        group: &VersionGroup,
        name: &str,
    ) -> StorageResult<Version> {
        self.handle.ensure_version(project, group, name).await
    }

    async fn latest_build(
        &self,
        project: &Project,
        version: &Version,
    ) -> StorageResult<Option<Build>> {
        self.handle.latest_build(project, version).await
    }

    async fn insert_build(
        &self,
        project: &Project,
        version: &Version,
        build: NewBuild,
    ) -> StorageResult<Build> {
        self.handle.insert_build(project, version, build).await
    }

    async fn find_project(&self, name: &str) -> StorageResult<Option<Project>> {
        self.handle.find_project(name).await
    }

    async fn find_version(&self, project: &Project, name: &str) -> StorageResult<Option<Version>> {
        self.handle.find_version(project, name).await
    }

    async fn get_build(
        &self,
        project: &Project,
        version: &Version,
        number: u32,
    ) -> StorageResult<Option<Build>> {
        self.handle.get_build(project, version, number).await
    }

    async fn list_projects(&self) -> StorageResult<Vec<Project>> {
        self.handle.list_projects().await
    }

    async fn list_groups(&self, project: &Project) -> StorageResult<Vec<VersionGroup>> {
        self.handle.list_groups(project).await
    }

    async fn list_versions(&self, project: &Project) -> StorageResult<Vec<Version>> {
        self.handle.list_versions(project).await
    }

    async fn list_builds(&self, project: &Project, version: &Version) -> StorageResult<Vec<Build>> {
        self.handle.list_builds(project, version).await
    }
}
