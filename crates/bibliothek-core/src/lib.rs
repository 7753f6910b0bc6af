//! Bibliothek Core: the build ingestion pipeline
//!
//! Takes an already-built set of artifact files and records it as a build in
//! the catalog (projects → version groups → versions → builds).
//!
//! ## Stages
//!
//! - [`artifact`]: parse download descriptors, check files, compute digests
//! - [`hierarchy`]: find-or-create project, group and version
//! - [`numbering`]: explicit or auto build numbers
//! - [`changelog`]: commits since the previous build (via [`git`])
//! - [`relocate`]: copy files into `<storage>/<project>/<version>/<build>/`
//! - [`writer`]: insert the immutable build record
//!
//! [`pipeline::IngestPipeline`] runs them in order.

pub mod artifact;
pub mod changelog;
pub mod error;
pub mod git;
pub mod hierarchy;
pub mod names;
pub mod numbering;
pub mod pipeline;
pub mod relocate;
pub mod telemetry;
pub mod writer;

pub use artifact::{DownloadDescriptor, ValidatedArtifact};
pub use changelog::{collect_changes, ChangeBoundary};
pub use error::{IngestError, Result};
pub use git::{capture_head_sha, is_git_repo};
pub use hierarchy::ResolvedHierarchy;
pub use numbering::BuildNumber;
pub use pipeline::{IngestArgs, IngestPipeline, IngestReceipt, IngestRequest, IngestStage};
pub use relocate::{OverwritePolicy, RelocatedArtifact};

pub use bibliothek_state::{
    Build, CatalogStore, Change, Channel, ContentDigest, Download, Project, Version, VersionGroup,
};
