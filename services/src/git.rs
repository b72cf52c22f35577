//! Git-driven change discovery for incremental rebuilds.

use std::path::{Path, PathBuf};

use git2::{Repository, Status, StatusOptions};
use tracing::{debug, info};

/// A Markdown file that differs from `HEAD` in the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// Absolute path inside the working tree.
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated.
    pub relative: String,
    /// The file was removed (index or worktree).
    pub deleted: bool,
}

/// Working-tree root of the repository containing `repo_dir`.
pub fn repo_workdir(repo_dir: &Path) -> Result<PathBuf, git2::Error> {
    let repo = Repository::discover(repo_dir)?;
    workdir_of(&repo)
}

fn workdir_of(repo: &Repository) -> Result<PathBuf, git2::Error> {
    repo.workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| git2::Error::from_str("bare repository has no working tree"))
}

/// Lists `*.md` files that are modified against `HEAD`, staged, deleted or untracked.
///
/// Mirrors `git diff --name-only HEAD -- '*.md'` plus
/// `git ls-files --others --exclude-standard -- '*.md'`. Ignored files are skipped.
/// The result is sorted by relative path.
pub fn changed_markdown_files(repo_dir: &Path) -> Result<Vec<ChangedFile>, git2::Error> {
    let repo = Repository::discover(repo_dir)?;
    let workdir = workdir_of(&repo)?;

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    let statuses = repo.statuses(Some(&mut opts))?;
    let mut out = Vec::new();
    for entry in statuses.iter() {
        let Some(rel) = entry.path() else {
            continue;
        };
        if !rel.ends_with(".md") {
            continue;
        }
        let status = entry.status();
        if status.is_empty() || status.contains(Status::IGNORED) {
            continue;
        }
        let deleted = status.intersects(Status::WT_DELETED | Status::INDEX_DELETED);
        debug!(path = rel, ?status, "git change");
        out.push(ChangedFile {
            path: workdir.join(rel),
            relative: rel.to_string(),
            deleted,
        });
    }

    out.sort_by(|a, b| a.relative.cmp(&b.relative));
    out.dedup_by(|a, b| a.relative == b.relative);
    info!(
        repo = %workdir.display(),
        changed = out.len(),
        "collected changed markdown files"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn untracked_markdown_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();
        fs::create_dir_all(tmp.path().join("docs/runbook")).unwrap();
        fs::write(tmp.path().join("docs/runbook/redis.md"), "# Redis\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "not markdown").unwrap();

        let changed = changed_markdown_files(tmp.path()).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].relative, "docs/runbook/redis.md");
        assert!(!changed[0].deleted);
        assert!(changed[0].path.ends_with("docs/runbook/redis.md"));
    }

    #[test]
    fn clean_repo_has_no_changes() {
        let tmp = tempfile::TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();
        assert!(changed_markdown_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn workdir_is_found_from_a_subdirectory() {
        let tmp = tempfile::TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();
        fs::create_dir_all(tmp.path().join("docs/runbook")).unwrap();

        let got = repo_workdir(&tmp.path().join("docs/runbook")).unwrap();
        assert_eq!(
            got.canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }
}
