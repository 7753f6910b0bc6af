//! Hierarchy resolution: project → version group → version.

use bibliothek_state::{CatalogStore, Project, Version, VersionGroup};
use tracing::{debug, instrument};

use crate::error::Result;

/// The three catalog levels a build hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHierarchy {
    pub project: Project,
    pub group: VersionGroup,
    pub version: Version,
}

/// Find or create each level in order.
///
/// Every step is a single atomic insert-if-absent-then-fetch in the store.
/// A version keeps the group it was first created under; a different
/// `group_name` for an existing version is logged and otherwise ignored.
#[instrument(skip(store))]
pub async fn resolve(
    store: &dyn CatalogStore,
    project_name: &str,
    friendly_name: &str,
    group_name: &str,
    version_name: &str,
) -> Result<ResolvedHierarchy> {
    let project = store.ensure_project(project_name, friendly_name).await?;
    if project.friendly_name != friendly_name {
        debug!(
            project = %project.name,
            stored = %project.friendly_name,
            requested = %friendly_name,
            "Keeping existing friendly name"
        );
    }

    let group = store.ensure_group(&project, group_name).await?;
    let version = store.ensure_version(&project, &group, version_name).await?;

    debug!(
        project_id = %project.id,
        group_id = %group.id,
        version_id = %version.id,
        "Resolved hierarchy"
    );
    Ok(ResolvedHierarchy {
        project,
        group,
        version,
    })
}
