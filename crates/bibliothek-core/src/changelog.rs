//! Change log collection between two build points.

use std::path::Path;

use bibliothek_state::{Build, Change};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};
use crate::git;

/// Whether the walk's starting commit is itself part of the new change log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeBoundary {
    /// The starting commit is emitted as the last (oldest) entry. With a
    /// previous build this repeats that build's head commit.
    #[default]
    Inclusive,
    /// Only commits after the starting commit; consecutive builds never
    /// share a commit.
    Exclusive,
}

/// Walk from the repository head back to the previous build's head commit,
/// or to HEAD's parent when there is no previous build (or it recorded no
/// changes). Result is newest first.
#[instrument(skip(previous), fields(previous = previous.map(|b| b.number)))]
pub fn collect_changes(
    repo_dir: &Path,
    previous: Option<&Build>,
    boundary: ChangeBoundary,
) -> Result<Vec<Change>> {
    if !git::is_git_repo(repo_dir) {
        return Err(IngestError::RepositoryUnavailable(format!(
            "{} is not a git work tree",
            repo_dir.display()
        )));
    }

    let start_rev = previous
        .and_then(|b| b.head_commit())
        .unwrap_or("HEAD^1")
        .to_string();
    let start = git::resolve_commit(repo_dir, &start_rev)?;
    let head = git::capture_head_sha(repo_dir)?;

    let mut changes = git::log_range(repo_dir, &start, &head)?;
    if boundary == ChangeBoundary::Inclusive {
        changes.push(git::show_commit(repo_dir, &start)?);
    }

    debug!(
        start = %start,
        head = %head,
        count = changes.len(),
        "Collected changes"
    );
    Ok(changes)
}
