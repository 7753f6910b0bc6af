//! Artifact relocation into the canonical storage layout:
//! `<storage>/<project>/<version>/<build>/<file>`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::artifact::ValidatedArtifact;
use crate::error::{IngestError, Result};

/// What to do when a destination file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Silently replace the previous file.
    #[default]
    Replace,
    /// Fail with `ArtifactAlreadyExists` before copying anything.
    Reject,
}

/// A copied artifact. Only `file_name` is recorded on the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatedArtifact {
    pub artifact: ValidatedArtifact,
    pub file_name: String,
    pub destination: PathBuf,
}

pub fn build_dir(storage_root: &Path, project: &str, version: &str, number: u32) -> PathBuf {
    storage_root
        .join(project)
        .join(version)
        .join(number.to_string())
}

/// Explicit name, or `<project>-<version>-<build>.jar` for the primary artifact.
pub fn file_name(artifact: &ValidatedArtifact, project: &str, version: &str, number: u32) -> String {
    match &artifact.name {
        Some(name) => name.clone(),
        None => format!("{project}-{version}-{number}.jar"),
    }
}

#[instrument(skip(artifacts), fields(count = artifacts.len()))]
pub fn relocate(
    artifacts: &[ValidatedArtifact],
    storage_root: &Path,
    project: &str,
    version: &str,
    number: u32,
    policy: OverwritePolicy,
) -> Result<Vec<RelocatedArtifact>> {
    let dir = build_dir(storage_root, project, version, number);

    let planned: Vec<RelocatedArtifact> = artifacts
        .iter()
        .map(|artifact| {
            let file_name = file_name(artifact, project, version, number);
            RelocatedArtifact {
                destination: dir.join(&file_name),
                file_name,
                artifact: artifact.clone(),
            }
        })
        .collect();

    let mut seen = HashSet::new();
    if let Some(clash) = planned.iter().find(|r| !seen.insert(r.file_name.as_str())) {
        return Err(IngestError::InvalidArgument(format!(
            "two artifacts would be stored as {} (second is {})",
            clash.file_name, clash.artifact.artifact_type
        )));
    }

    if policy == OverwritePolicy::Reject {
        if let Some(existing) = planned.iter().find(|r| r.destination.exists()) {
            return Err(IngestError::ArtifactAlreadyExists {
                path: existing.destination.clone(),
            });
        }
    }

    std::fs::create_dir_all(&dir)?;
    for relocated in &planned {
        std::fs::copy(&relocated.artifact.path, &relocated.destination)?;
        debug!(
            artifact_type = %relocated.artifact.artifact_type,
            destination = %relocated.destination.display(),
            "Copied artifact"
        );
    }
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibliothek_state::ContentDigest;

    fn artifact(dir: &Path, file: &str, name: Option<&str>, contents: &[u8]) -> ValidatedArtifact {
        let path = dir.join(file);
        std::fs::write(&path, contents).unwrap();
        ValidatedArtifact {
            artifact_type: format!("application.{file}"),
            path,
            sha256: ContentDigest::from_bytes(contents),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn copies_into_canonical_layout() {
        let src = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact(src.path(), "server", None, b"server"),
            artifact(src.path(), "mojmap", Some("paper-mojmap.jar"), b"mojmap"),
        ];

        let relocated = relocate(
            &artifacts,
            storage.path(),
            "paper",
            "1.20.1",
            7,
            OverwritePolicy::Replace,
        )
        .unwrap();

        let dir = storage.path().join("paper/1.20.1/7");
        assert_eq!(relocated[0].file_name, "paper-1.20.1-7.jar");
        assert_eq!(std::fs::read(dir.join("paper-1.20.1-7.jar")).unwrap(), b"server");
        assert_eq!(std::fs::read(dir.join("paper-mojmap.jar")).unwrap(), b"mojmap");
    }

    #[test]
    fn replace_overwrites_previous_files() {
        let src = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let first = vec![artifact(src.path(), "server", None, b"old")];
        relocate(&first, storage.path(), "paper", "1.20.1", 1, OverwritePolicy::Replace).unwrap();

        let second = vec![artifact(src.path(), "server", None, b"new")];
        relocate(&second, storage.path(), "paper", "1.20.1", 1, OverwritePolicy::Replace).unwrap();

        let copied = storage.path().join("paper/1.20.1/1/paper-1.20.1-1.jar");
        assert_eq!(std::fs::read(copied).unwrap(), b"new");
    }

    #[test]
    fn reject_fails_before_copying_anything() {
        let src = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let dir = build_dir(storage.path(), "paper", "1.20.1", 1);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("paper-mojmap.jar"), b"existing").unwrap();

        let artifacts = vec![
            artifact(src.path(), "server", None, b"server"),
            artifact(src.path(), "mojmap", Some("paper-mojmap.jar"), b"mojmap"),
        ];
        let err = relocate(&artifacts, storage.path(), "paper", "1.20.1", 1, OverwritePolicy::Reject)
            .unwrap_err();

        assert!(matches!(err, IngestError::ArtifactAlreadyExists { .. }));
        assert!(!dir.join("paper-1.20.1-1.jar").exists());
        assert_eq!(std::fs::read(dir.join("paper-mojmap.jar")).unwrap(), b"existing");
    }

    #[test]
    fn colliding_file_names_are_rejected_before_copying() {
        let src = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact(src.path(), "server", None, b"server"),
            artifact(src.path(), "mojmap", Some("paper-1.20.1-1.jar"), b"mojmap"),
        ];

        let err = relocate(&artifacts, storage.path(), "paper", "1.20.1", 1, OverwritePolicy::Replace)
            .unwrap_err();

        assert!(matches!(err, IngestError::InvalidArgument(_)), "{err:?}");
        assert!(err.to_string().contains("paper-1.20.1-1.jar"));
        assert!(!build_dir(storage.path(), "paper", "1.20.1", 1).exists());
    }
}
