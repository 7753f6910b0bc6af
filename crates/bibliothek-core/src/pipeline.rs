//! The ingestion pipeline.
//!
//! One invocation walks a fixed sequence of stages:
//!
//! ```text
//! Validating → ResolvingHierarchy → AllocatingNumber → CollectingChanges
//!            → RelocatingArtifacts → Writing → Done
//! ```
//!
//! Any failure moves straight to `Failed`. No stage is re-entered and
//! nothing already done is undone: hierarchy records and copied files stay.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bibliothek_state::{Build, CatalogStore, Channel, Project, Version, VersionGroup};
use serde::{Deserialize, Serialize};
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::artifact::{self, DownloadDescriptor};
use crate::changelog::{self, ChangeBoundary};
use crate::error::{IngestError, Result};
use crate::hierarchy;
use crate::names;
use crate::numbering::{self, BuildNumber};
use crate::relocate::{self, OverwritePolicy};
use crate::writer;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Validating,
    ResolvingHierarchy,
    AllocatingNumber,
    CollectingChanges,
    RelocatingArtifacts,
    Writing,
    Done,
    Failed,
}

impl IngestStage {
    /// The stage that follows on success. Terminal stages have none.
    pub fn next(self) -> Option<IngestStage> {
        use IngestStage::*;
        match self {
            Validating => Some(ResolvingHierarchy),
            ResolvingHierarchy => Some(AllocatingNumber),
            AllocatingNumber => Some(CollectingChanges),
            CollectingChanges => Some(RelocatingArtifacts),
            RelocatingArtifacts => Some(Writing),
            Writing => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, IngestStage::Done | IngestStage::Failed)
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestStage::Validating => "validating",
            IngestStage::ResolvingHierarchy => "resolving_hierarchy",
            IngestStage::AllocatingNumber => "allocating_number",
            IngestStage::CollectingChanges => "collecting_changes",
            IngestStage::RelocatingArtifacts => "relocating_artifacts",
            IngestStage::Writing => "writing",
            IngestStage::Done => "done",
            IngestStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Unparsed command parameters, as typed by the operator.
#[derive(Debug, Clone, Default)]
pub struct IngestArgs {
    pub project: String,
    pub friendly_name: String,
    pub group: String,
    pub version: String,
    pub build: String,
    pub repo: PathBuf,
    pub storage: PathBuf,
    pub channel: String,
    pub downloads: Vec<String>,
    pub boundary: ChangeBoundary,
    pub overwrite: OverwritePolicy,
}

/// Fully parsed parameters. Building one touches neither the store nor the
/// filesystem, so every `InvalidArgument` and `DuplicatePrimaryArtifact`
/// surfaces before any side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub project: String,
    pub friendly_name: String,
    pub group: String,
    pub version: String,
    pub build: BuildNumber,
    pub repo: PathBuf,
    pub storage: PathBuf,
    pub channel: Channel,
    pub downloads: Vec<DownloadDescriptor>,
    pub boundary: ChangeBoundary,
    pub overwrite: OverwritePolicy,
}

impl IngestRequest {
    pub fn parse(args: IngestArgs) -> Result<Self> {
        names::validate_project_name(&args.project)?;
        if args.friendly_name.trim().is_empty() {
            return Err(IngestError::InvalidArgument(
                "friendly name must not be empty".to_string(),
            ));
        }
        names::validate_group_name(&args.group)?;
        names::validate_version_name(&args.version)?;

        let channel = if args.channel.trim().is_empty() {
            Channel::default()
        } else {
            args.channel
                .parse::<Channel>()
                .map_err(|e| IngestError::InvalidArgument(e.to_string()))?
        };
        let build = if args.build.trim().is_empty() {
            BuildNumber::Auto
        } else {
            args.build.parse()?
        };
        let downloads = artifact::parse_descriptors(&args.downloads)?;

        Ok(Self {
            project: args.project,
            friendly_name: args.friendly_name,
            group: args.group,
            version: args.version,
            build,
            repo: args.repo,
            storage: args.storage,
            channel,
            downloads,
            boundary: args.boundary,
            overwrite: args.overwrite,
        })
    }
}

/// Everything created or resolved by a successful invocation.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub invocation_id: Uuid,
    pub project: Project,
    pub group: VersionGroup,
    pub version: Version,
    pub build: Build,
    /// Stages passed through, ending in `Done`.
    pub stages: Vec<IngestStage>,
}

impl IngestReceipt {
    /// One-line operator summary.
    pub fn summary(&self) -> String {
        format!(
            "Inserted build {} (Channel: {}) for project {} ({}) version {} ({}) as {}",
            self.build.number,
            self.build.channel,
            self.project.name,
            self.project.id,
            self.version.name,
            self.version.id,
            self.build.id
        )
    }
}

struct StageTracker {
    invocation_id: Uuid,
    current: IngestStage,
    visited: Vec<IngestStage>,
}

impl StageTracker {
    fn new(invocation_id: Uuid) -> Self {
        info!(event = "ingest.stage", stage = %IngestStage::Validating);
        Self {
            invocation_id,
            current: IngestStage::Validating,
            visited: vec![IngestStage::Validating],
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.current.next() {
            info!(event = "ingest.stage", from = %self.current, stage = %next);
            self.current = next;
            self.visited.push(next);
        }
    }

    fn fail(&mut self, err: &IngestError) {
        error!(
            event = "ingest.failed",
            invocation_id = %self.invocation_id,
            stage = %self.current,
            error = %err,
        );
        self.current = IngestStage::Failed;
        self.visited.push(IngestStage::Failed);
    }
}

/// Runs ingestion invocations against one catalog store.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn CatalogStore>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Run one invocation end to end.
    pub async fn run(&self, request: IngestRequest) -> Result<IngestReceipt> {
        let invocation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "bibliothek.ingest",
            invocation_id = %invocation_id,
            project = %request.project,
            version = %request.version,
        );
        async move {
            let mut tracker = StageTracker::new(invocation_id);
            match self.execute(&request, &mut tracker).await {
                Ok((hierarchy, build)) => {
                    info!(event = "ingest.done", build_id = %build.id, number = build.number);
                    Ok(IngestReceipt {
                        invocation_id,
                        project: hierarchy.project,
                        group: hierarchy.group,
                        version: hierarchy.version,
                        build,
                        stages: tracker.visited,
                    })
                }
                Err(err) => {
                    tracker.fail(&err);
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &IngestRequest,
        tracker: &mut StageTracker,
    ) -> Result<(hierarchy::ResolvedHierarchy, Build)> {
        let store = self.store.as_ref();

        let artifacts = artifact::validate(&request.downloads)?;
        tracker.advance();

        let hierarchy = hierarchy::resolve(
            store,
            &request.project,
            &request.friendly_name,
            &request.group,
            &request.version,
        )
        .await?;
        tracker.advance();

        let number =
            numbering::allocate(store, &hierarchy.project, &hierarchy.version, request.build)
                .await?;
        tracker.advance();

        let previous = store
            .latest_build(&hierarchy.project, &hierarchy.version)
            .await?;
        let repo = request.repo.clone();
        let boundary = request.boundary;
        let changes = tokio::task::spawn_blocking(move || {
            changelog::collect_changes(&repo, previous.as_ref(), boundary)
        })
        .await
        .map_err(|e| IngestError::RepositoryUnavailable(format!("change collection aborted: {e}")))??;
        tracker.advance();

        let storage = request.storage.clone();
        let project = request.project.clone();
        let version = request.version.clone();
        let policy = request.overwrite;
        let relocated = tokio::task::spawn_blocking(move || {
            relocate::relocate(&artifacts, &storage, &project, &version, number, policy)
        })
        .await
        .map_err(|e| IngestError::Io(std::io::Error::other(e)))??;
        tracker.advance();

        let build = writer::write(
            store,
            &hierarchy,
            number,
            request.channel,
            changes,
            &relocated,
        )
        .await?;
        tracker.advance();

        Ok((hierarchy, build))
    }
}
