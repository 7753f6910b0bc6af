//! Git integration utilities for reading repository history.
//!
//! The repository is read-only input. Everything goes through the `git`
//! executable so no libgit bindings are needed.

use std::path::Path;
use std::process::Command;

use bibliothek_state::Change;

use crate::error::{IngestError, Result};

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const LOG_FORMAT: &str = "--format=%H%x1f%s%x1f%B%x1e";

fn git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| IngestError::RepositoryUnavailable(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(IngestError::RepositoryUnavailable(format!(
            "git {} failed in {}: {}",
            args.join(" "),
            repo_dir.display(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Capture the HEAD commit SHA from a git repository.
///
/// Runs `git rev-parse HEAD` in the given directory. Returns an error if the
/// directory is not inside a git repository or if git is not available.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    resolve_commit(repo_dir, "HEAD")
}

/// Resolve any revision to a full commit SHA.
pub fn resolve_commit(repo_dir: &Path, rev: &str) -> Result<String> {
    let object = format!("{rev}^{{commit}}");
    let sha = git(repo_dir, &["rev-parse", "--verify", "--quiet", &object])?
        .trim()
        .to_string();
    if sha.is_empty() {
        return Err(IngestError::RepositoryUnavailable(format!(
            "git rev-parse {rev} returned empty output"
        )));
    }
    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Commits reachable from `to` but not from `from`, newest first in
/// topological order.
pub fn log_range(repo_dir: &Path, from: &str, to: &str) -> Result<Vec<Change>> {
    let range = format!("{from}..{to}");
    let out = git(repo_dir, &["log", "--topo-order", LOG_FORMAT, &range])?;
    Ok(parse_log(&out))
}

/// The single commit `rev`.
pub fn show_commit(repo_dir: &Path, rev: &str) -> Result<Change> {
    let out = git(repo_dir, &["log", "-1", LOG_FORMAT, rev])?;
    parse_log(&out).into_iter().next().ok_or_else(|| {
        IngestError::RepositoryUnavailable(format!("commit {rev} produced no log entry"))
    })
}

fn parse_log(out: &str) -> Vec<Change> {
    out.split(RECORD_SEP)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(3, FIELD_SEP);
            let commit = fields.next()?.trim().to_string();
            let summary = fields.next()?.to_string();
            let message = fields.next().unwrap_or_default().trim_end().to_string();
            Some(Change {
                commit,
                summary,
                message,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[test]
    fn capture_head_sha_returns_40_hex_chars() {
        let repo = make_git_repo();
        let sha = capture_head_sha(repo.path()).unwrap();
        assert_eq!(sha.len(), 40, "SHA should be 40 hex chars, got: {sha}");
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn capture_head_sha_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let result = capture_head_sha(dir.path());
        assert!(matches!(result, Err(IngestError::RepositoryUnavailable(_))));
    }

    #[test]
    fn resolve_commit_fails_for_missing_parent() {
        let repo = make_git_repo();
        let result = resolve_commit(repo.path(), "HEAD^1");
        assert!(matches!(result, Err(IngestError::RepositoryUnavailable(_))));
    }

    #[test]
    fn is_git_repo_true_for_repo() {
        let repo = make_git_repo();
        assert!(is_git_repo(repo.path()));
    }

    #[test]
    fn is_git_repo_false_for_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_git_repo(dir.path()));
    }

    #[test]
    fn log_keeps_summary_and_full_message() {
        let repo = make_git_repo();
        run_git(
            repo.path(),
            &["commit", "--allow-empty", "-m", "Fix chunk loading", "-m", "Details here."],
        );
        run_git(repo.path(), &["commit", "--allow-empty", "-m", "Bump version"]);

        let changes = log_range(repo.path(), "HEAD~2", "HEAD").unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].summary, "Bump version");
        assert_eq!(changes[1].summary, "Fix chunk loading");
        assert_eq!(changes[1].message, "Fix chunk loading\n\nDetails here.");
        assert_eq!(changes[0].commit, capture_head_sha(repo.path()).unwrap());
    }

    #[test]
    fn show_commit_returns_single_entry() {
        let repo = make_git_repo();
        let change = show_commit(repo.path(), "HEAD").unwrap();
        assert_eq!(change.summary, "initial");
        assert_eq!(change.message, "initial");
    }
}
