//! In-memory fake for the catalog store (testing only)
//!
//! `MemoryCatalogStore` satisfies the `CatalogStore` contract without any
//! external dependencies. It can also be switched offline to exercise
//! store-unavailable paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Catalog {
    projects: BTreeMap<String, Project>,
    groups: HashMap<(String, String), VersionGroup>,
    versions: HashMap<(String, String), Version>,
    builds: HashMap<(String, String), BTreeMap<u32, Build>>,
}

fn new_id(table: &str) -> String {
    format!("{table}:{}", uuid::Uuid::new_v4().simple())
}

/// In-memory catalog keyed exactly like the real store.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    catalog: Mutex<Catalog>,
    offline: AtomicBool,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When offline, every operation fails with `StorageError::Backend`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("catalog store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn ensure_project(&self, name: &str, friendly_name: &str) -> StorageResult<Project> {
        self.check_online()?;
        let mut catalog = self.catalog.lock().unwrap();
        let project = catalog
            .projects
            .entry(name.to_string())
            .or_insert_with(|| Project {
                id: new_id("projects"),
                name: name.to_string(),
                friendly_name: friendly_name.to_string(),
            });
        Ok(project.clone())
    }

    async fn ensure_group(&self, project: &Project, name: &str) -> StorageResult<VersionGroup> {
        self.check_online()?;
        let mut catalog = self.catalog.lock().unwrap();
        let group = catalog
            .groups
            .entry((project.name.clone(), name.to_string()))
            .or_insert_with(|| VersionGroup {
                id: new_id("groups"),
                project_id: project.id.clone(),
                name: name.to_string(),
                created_at: Utc::now(),
            });
        Ok(group.clone())
    }

    async fn ensure_version(
        &self,
        project: &Project,
        group: &VersionGroup,
        name: &str,
    ) -> StorageResult<Version> {
        self.check_online()?;
        let mut catalog = self.catalog.lock().unwrap();
        let version = catalog
            .versions
            .entry((project.name.clone(), name.to_string()))
            .or_insert_with(|| Version {
                id: new_id("versions"),
                project_id: project.id.clone(),
                group_id: group.id.clone(),
                name: name.to_string(),
                created_at: Utc::now(),
            });
        Ok(version.clone())
    }

    async fn latest_build(
        &self,
        project: &Project,
        version: &Version,
    ) -> StorageResult<Option<Build>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .builds
            .get(&(project.name.clone(), version.name.clone()))
            .and_then(|builds| builds.values().next_back().cloned()))
    }

    async fn insert_build(
        &self,
        project: &Project,
        version: &Version,
        build: NewBuild,
    ) -> StorageResult<Build> {
        self.check_online()?;
        let mut catalog = self.catalog.lock().unwrap();
        let builds = catalog
            .builds
            .entry((project.name.clone(), version.name.clone()))
            .or_default();
        if builds.contains_key(&build.number) {
            return Err(StorageError::DuplicateBuild {
                project: project.name.clone(),
                version: version.name.clone(),
                number: build.number,
            });
        }
        let record = Build {
            id: new_id("builds"),
            project_id: project.id.clone(),
            version_id: version.id.clone(),
            number: build.number,
            created_at: Utc::now(),
            changes: build.changes,
            downloads: build.downloads,
            display_mode: DisplayMode::Hide,
            channel: build.channel,
        };
        builds.insert(record.number, record.clone());
        Ok(record)
    }

    async fn find_project(&self, name: &str) -> StorageResult<Option<Project>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog.projects.get(name).cloned())
    }

    async fn find_version(&self, project: &Project, name: &str) -> StorageResult<Option<Version>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .versions
            .get(&(project.name.clone(), name.to_string()))
            .cloned())
    }

    async fn get_build(
        &self,
        project: &Project,
        version: &Version,
        number: u32,
    ) -> StorageResult<Option<Build>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .builds
            .get(&(project.name.clone(), version.name.clone()))
            .and_then(|builds| builds.get(&number).cloned()))
    }

    async fn list_projects(&self) -> StorageResult<Vec<Project>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog.projects.values().cloned().collect())
    }

    async fn list_groups(&self, project: &Project) -> StorageResult<Vec<VersionGroup>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        let mut groups: Vec<VersionGroup> = catalog
            .groups
            .iter()
            .filter(|((p, _), _)| *p == project.name)
            .map(|(_, g)| g.clone())
            .collect();
        groups.sort_by_key(|g| g.created_at);
        Ok(groups)
    }

    async fn list_versions(&self, project: &Project) -> StorageResult<Vec<Version>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        let mut versions: Vec<Version> = catalog
            .versions
            .iter()
            .filter(|((p, _), _)| *p == project.name)
            .map(|(_, v)| v.clone())
            .collect();
        versions.sort_by_key(|v| v.created_at);
        Ok(versions)
    }

    async fn list_builds(&self, project: &Project, version: &Version) -> StorageResult<Vec<Build>> {
        self.check_online()?;
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .builds
            .get(&(project.name.clone(), version.name.clone()))
            .map(|builds| builds.values().cloned().collect())
            .unwrap_or_default())
    }
}
