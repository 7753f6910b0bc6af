//! Artifact validation.
//!
//! Download descriptors arrive as `type:path[:hash][:name]`. Parsing is pure
//! and happens before anything else; validation touches the filesystem only
//! to check existence and to hash files that came without a digest.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::str::FromStr;

use bibliothek_state::ContentDigest;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::names::validate_artifact_name;

/// The conventional first segment of every artifact type.
pub const STANDARD_TYPE_ROOT: &str = "application";

/// One `--download` argument, parsed but not yet checked against disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor {
    pub artifact_type: String,
    pub path: PathBuf,
    /// Supplied digest; `None` means compute it from the file.
    pub sha256: Option<ContentDigest>,
    /// Explicit file name; `None` marks the primary artifact.
    pub name: Option<String>,
}

impl DownloadDescriptor {
    pub fn is_primary(&self) -> bool {
        self.name.is_none()
    }

    /// Whether the type is rooted at `application`.
    pub fn is_standard_type(&self) -> bool {
        self.artifact_type.split('.').next() == Some(STANDARD_TYPE_ROOT)
    }
}

impl FromStr for DownloadDescriptor {
    type Err = IngestError;

    fn from_str(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(IngestError::InvalidArgument(format!(
                "download \"{raw}\" must look like type:path[:hash][:name]"
            )));
        }

        let artifact_type = parts[0].trim();
        if artifact_type.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "download \"{raw}\" has an empty type"
            )));
        }
        let path = parts[1].trim();
        if path.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "download \"{raw}\" has an empty path"
            )));
        }

        let sha256 = match parts.get(2).map(|h| h.trim()) {
            None | Some("") => None,
            Some(hash) => Some(ContentDigest::try_from(hash.to_string()).map_err(|_| {
                IngestError::InvalidArgument(format!(
                    "download \"{raw}\": \"{hash}\" is not a SHA-256 hex digest"
                ))
            })?),
        };

        let name = match parts.get(3).map(|n| n.trim()) {
            None | Some("") => None,
            Some(name) => {
                validate_artifact_name(name)?;
                Some(name.to_string())
            }
        };

        Ok(Self {
            artifact_type: artifact_type.to_string(),
            path: PathBuf::from(path),
            sha256,
            name,
        })
    }
}

/// A descriptor whose file exists and whose digest is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedArtifact {
    pub artifact_type: String,
    pub path: PathBuf,
    pub sha256: ContentDigest,
    pub name: Option<String>,
}

/// Parse raw descriptors and enforce the invocation-wide rules that need no
/// filesystem access: at least one download, unique types, at most one
/// primary artifact.
pub fn parse_descriptors<S: AsRef<str>>(raw: &[S]) -> Result<Vec<DownloadDescriptor>> {
    if raw.is_empty() {
        return Err(IngestError::InvalidArgument(
            "at least one download is required".to_string(),
        ));
    }

    let mut descriptors: Vec<DownloadDescriptor> = Vec::with_capacity(raw.len());
    let mut primary: Option<String> = None;
    for entry in raw {
        let descriptor: DownloadDescriptor = entry.as_ref().parse()?;

        if descriptors
            .iter()
            .any(|d| d.artifact_type == descriptor.artifact_type)
        {
            return Err(IngestError::InvalidArgument(format!(
                "download type {} given more than once",
                descriptor.artifact_type
            )));
        }

        if let Some(name) = &descriptor.name {
            if descriptors.iter().any(|d| d.name.as_ref() == Some(name)) {
                return Err(IngestError::InvalidArgument(format!(
                    "download name {name} given more than once"
                )));
            }
        }

        if descriptor.is_primary() {
            if let Some(first) = &primary {
                return Err(IngestError::DuplicatePrimaryArtifact {
                    first: first.clone(),
                    second: descriptor.artifact_type.clone(),
                });
            }
            primary = Some(descriptor.artifact_type.clone());
        }

        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

/// Check every file exists and fill in missing digests.
///
/// Fails on the first missing file; nothing is hashed past that point.
pub fn validate(descriptors: &[DownloadDescriptor]) -> Result<Vec<ValidatedArtifact>> {
    let mut validated = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if !descriptor.path.is_file() {
            return Err(IngestError::MissingArtifactFile {
                artifact_type: descriptor.artifact_type.clone(),
                path: descriptor.path.clone(),
            });
        }

        if !descriptor.is_standard_type() {
            warn!(
                artifact_type = %descriptor.artifact_type,
                "Non-standard artifact type (expected {STANDARD_TYPE_ROOT}.*)"
            );
        }

        let sha256 = match &descriptor.sha256 {
            Some(digest) => digest.clone(),
            None => {
                let file = File::open(&descriptor.path)?;
                ContentDigest::from_reader(BufReader::new(file))?
            }
        };

        debug!(
            artifact_type = %descriptor.artifact_type,
            sha256 = %sha256.short(),
            "Validated download"
        );
        validated.push(ValidatedArtifact {
            artifact_type: descriptor.artifact_type.clone(),
            path: descriptor.path.clone(),
            sha256,
            name: descriptor.name.clone(),
        });
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_and_path_only() {
        let d: DownloadDescriptor = "application:build/paper.jar".parse().unwrap();
        assert_eq!(d.artifact_type, "application");
        assert_eq!(d.path, PathBuf::from("build/paper.jar"));
        assert!(d.sha256.is_none());
        assert!(d.is_primary());
    }

    #[test]
    fn parses_full_descriptor_and_lowercases_hash() {
        let hash = "AB".repeat(32);
        let d: DownloadDescriptor = format!("application.mojmap:out.jar:{hash}:paper-mojmap.jar")
            .parse()
            .unwrap();
        assert_eq!(d.sha256.unwrap().as_str(), "ab".repeat(32));
        assert_eq!(d.name.as_deref(), Some("paper-mojmap.jar"));
    }

    #[test]
    fn empty_hash_segment_means_compute() {
        let d: DownloadDescriptor = "application.extra:out.jar::extra.jar".parse().unwrap();
        assert!(d.sha256.is_none());
        assert_eq!(d.name.as_deref(), Some("extra.jar"));
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for raw in ["application", ":out.jar", "application:", "a:b:c:d:e"] {
            let err = raw.parse::<DownloadDescriptor>().unwrap_err();
            assert!(matches!(err, IngestError::InvalidArgument(_)), "{raw}");
        }
        let err = "application:out.jar:nothex"
            .parse::<DownloadDescriptor>()
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_second_primary() {
        let err = parse_descriptors(&["application:a.jar", "application.other:b.jar"]).unwrap_err();
        assert!(matches!(err, IngestError::DuplicatePrimaryArtifact { .. }));
    }

    #[test]
    fn rejects_empty_list_and_repeated_types() {
        let none: [&str; 0] = [];
        assert!(matches!(
            parse_descriptors(&none).unwrap_err(),
            IngestError::InvalidArgument(_)
        ));
        let err = parse_descriptors(&["application:a.jar", "application:b.jar::b.jar"]).unwrap_err();
        assert!(matches!(err, IngestError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_repeated_download_names() {
        let err = parse_descriptors(&[
            "application:a.jar",
            "application.mojmap:b.jar::shared.jar",
            "application.extra:c.jar::shared.jar",
        ])
        .unwrap_err();
        assert!(matches!(err, IngestError::InvalidArgument(_)));
        assert!(err.to_string().contains("shared.jar"));
    }

    #[test]
    fn standard_type_checks_first_segment() {
        let d: DownloadDescriptor = "application.mojmap:a.jar::x.jar".parse().unwrap();
        assert!(d.is_standard_type());
        let d: DownloadDescriptor = "source:a.zip".parse().unwrap();
        assert!(!d.is_standard_type());
    }

    #[test]
    fn validate_computes_missing_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.jar");
        std::fs::write(&path, b"jar bytes").unwrap();

        let descriptors = parse_descriptors(&[format!("application:{}", path.display())]).unwrap();
        let validated = validate(&descriptors).unwrap();
        assert_eq!(validated[0].sha256, ContentDigest::from_bytes(b"jar bytes"));
    }

    #[test]
    fn validate_keeps_supplied_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.jar");
        std::fs::write(&path, b"jar bytes").unwrap();
        let supplied = "0".repeat(64);

        let descriptors =
            parse_descriptors(&[format!("application:{}:{supplied}", path.display())]).unwrap();
        let validated = validate(&descriptors).unwrap();
        assert_eq!(validated[0].sha256.as_str(), supplied);
    }

    #[test]
    fn validate_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.jar");
        let descriptors = parse_descriptors(&[format!("application:{}", path.display())]).unwrap();
        let err = validate(&descriptors).unwrap_err();
        assert!(matches!(err, IngestError::MissingArtifactFile { .. }));
    }
}
