//! Markdown file discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// True for `*.md` files (case-insensitive extension).
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// All Markdown files under `dirs`, sorted and without duplicates.
///
/// Unreadable entries are logged and skipped; a missing directory yields nothing.
pub fn markdown_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for dir in dirs {
        for entry in WalkDir::new(dir).follow_links(true) {
            match entry {
                Ok(e) if e.file_type().is_file() && is_markdown(e.path()) => {
                    out.push(e.into_path());
                }
                Ok(_) => {}
                Err(err) => warn!(dir = %dir.display(), error = %err, "skipping unreadable entry"),
            }
        }
    }
    out.sort();
    out.dedup();
    debug!("discovery::markdown_files dirs={} files={}", dirs.len(), out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_nested_markdown_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("runbook")).unwrap();
        fs::write(dir.path().join("runbook/b.md"), "# B").unwrap();
        fs::write(dir.path().join("a.MD"), "# A").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = markdown_files(&[dir.path().to_path_buf()]);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.MD", "runbook/b.md"]);
    }

    #[test]
    fn missing_dir_yields_nothing() {
        assert!(markdown_files(&[PathBuf::from("/definitely/not/here")]).is_empty());
    }
}
