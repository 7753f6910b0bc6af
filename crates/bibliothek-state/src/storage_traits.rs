//! Storage trait definitions for the build catalog
//!
//! The catalog is a four-level hierarchy:
//! projects → version groups → versions → builds.
//!
//! `CatalogStore` is async and backend-agnostic. The SurrealDB
//! implementation lives in `surreal_catalog`; an in-memory fake for tests
//! lives in `fakes`.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest: artifact hash
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes`/`from_reader` or validated via
/// `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Compute the SHA-256 digest of everything readable from `reader`.
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        std::io::copy(&mut reader, &mut hasher)?;
        Ok(ContentDigest(hex::encode(hasher.finalize())))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Closed enumerations
// ---------------------------------------------------------------------------

/// Distribution tier of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    #[default]
    Default,
    Experimental,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Default, Channel::Experimental];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Default => "DEFAULT",
            Channel::Experimental => "EXPERIMENTAL",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected channel input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel \"{0}\" (expected one of: DEFAULT, EXPERIMENTAL)")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    /// Case-insensitive: `default`, `Default` and `DEFAULT` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// Whether the serving layer lists a build. New builds are always hidden;
/// promotion happens outside the ingestion pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayMode {
    #[default]
    Hide,
    Promote,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Hide => "HIDE",
            DisplayMode::Promote => "PROMOTE",
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// Top-level catalog entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Storage-assigned identifier
    pub id: String,
    pub name: String,
    pub friendly_name: String,
}

/// Coarse grouping of versions (e.g. a major release line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGroup {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A release line within a project.
///
/// The group association is fixed by the first `ensure_version` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub project_id: String,
    pub group_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A version-control commit attributed to a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Full commit hash
    pub commit: String,
    /// One-line summary
    pub summary: String,
    /// Full commit message
    pub message: String,
}

/// Artifact metadata as persisted on a build. The source path is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub name: String,
    pub sha256: ContentDigest,
}

/// Input to [`CatalogStore::insert_build`].
#[derive(Debug, Clone)]
pub struct NewBuild {
    pub number: u32,
    pub channel: Channel,
    /// Newest first.
    pub changes: Vec<Change>,
    /// Keyed by artifact type (e.g. `application.primary`).
    pub downloads: BTreeMap<String, Download>,
}

/// One numbered, immutable publication of artifacts for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: String,
    pub project_id: String,
    pub version_id: String,
    pub number: u32,
    pub created_at: DateTime<Utc>,
    pub changes: Vec<Change>,
    pub downloads: BTreeMap<String, Download>,
    pub display_mode: DisplayMode,
    pub channel: Channel,
}

impl Build {
    /// The commit the build was produced from, if any change was recorded.
    pub fn head_commit(&self) -> Option<&str> {
        self.changes.first().map(|c| c.commit.as_str())
    }
}

// ---------------------------------------------------------------------------
// CatalogStore
// ---------------------------------------------------------------------------

/// Build catalog persistence.
///
/// Guarantees:
/// - `ensure_*` are atomic insert-if-absent-then-fetch operations keyed by
///   the record's identity; concurrent callers observe the same record and
///   attributes are only set on insert.
/// - `insert_build` is a pure insert. A second build with the same
///   (project, version, number) fails with `StorageError::DuplicateBuild`.
/// - Builds are never updated.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Find or create a project by name. `friendly_name` is only stored on insert.
    async fn ensure_project(&self, name: &str, friendly_name: &str) -> StorageResult<Project>;

    /// Find or create a version group keyed by (project, name).
    async fn ensure_group(&self, project: &Project, name: &str) -> StorageResult<VersionGroup>;

    /// Find or create a version keyed by (project, name). `group` is only
    /// recorded on insert.
    async fn ensure_version(
        &self,
        project: &Project,
        group: &VersionGroup,
        name: &str,
    ) -> StorageResult<Version>;

    /// The highest-numbered build of a version, if any.
    async fn latest_build(&self, project: &Project, version: &Version)
        -> StorageResult<Option<Build>>;

    /// Insert a new build record, hidden until promoted.
    async fn insert_build(
        &self,
        project: &Project,
        version: &Version,
        build: NewBuild,
    ) -> StorageResult<Build>;

    async fn find_project(&self, name: &str) -> StorageResult<Option<Project>>;

    async fn find_version(&self, project: &Project, name: &str) -> StorageResult<Option<Version>>;

    async fn get_build(
        &self,
        project: &Project,
        version: &Version,
        number: u32,
    ) -> StorageResult<Option<Build>>;

    async fn list_projects(&self) -> StorageResult<Vec<Project>>;

    async fn list_groups(&self, project: &Project) -> StorageResult<Vec<VersionGroup>>;

    async fn list_versions(&self, project: &Project) -> StorageResult<Vec<Version>>;

    /// All builds of a version, ascending by number.
    async fn list_builds(&self, project: &Project, version: &Version) -> StorageResult<Vec<Build>>;
}
