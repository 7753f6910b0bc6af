//! Final build record assembly and insert.

use std::collections::BTreeMap;

use bibliothek_state::{Build, CatalogStore, Change, Channel, Download, NewBuild};
use tracing::{info, instrument};

use crate::error::Result;
use crate::hierarchy::ResolvedHierarchy;
use crate::relocate::RelocatedArtifact;

/// Downloads keyed by artifact type. The source path is dropped.
pub fn downloads(relocated: &[RelocatedArtifact]) -> BTreeMap<String, Download> {
    relocated
        .iter()
        .map(|r| {
            (
                r.artifact.artifact_type.clone(),
                Download {
                    name: r.file_name.clone(),
                    sha256: r.artifact.sha256.clone(),
                },
            )
        })
        .collect()
}

/// Insert the build. This is never an upsert: an existing
/// (project, version, number) fails with `DuplicateBuild` and no other
/// number is tried.
#[instrument(
    skip(store, hierarchy, changes, relocated),
    fields(project = %hierarchy.project.name, version = %hierarchy.version.name)
)]
pub async fn write(
    store: &dyn CatalogStore,
    hierarchy: &ResolvedHierarchy,
    number: u32,
    channel: Channel,
    changes: Vec<Change>,
    relocated: &[RelocatedArtifact],
) -> Result<Build> {
    let build = store
        .insert_build(
            &hierarchy.project,
            &hierarchy.version,
            NewBuild {
                number,
                channel,
                changes,
                downloads: downloads(relocated),
            },
        )
        .await?;

    info!(
        build_id = %build.id,
        number = build.number,
        channel = %build.channel,
        changes = build.changes.len(),
        downloads = build.downloads.len(),
        "Build record written"
    );
    Ok(build)
}
