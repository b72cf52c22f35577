//! Stable document identifiers derived from file paths.

use std::path::{Component, Path, PathBuf};

/// Width (in hex chars) of a derived document id.
pub const DOC_ID_WIDTH: usize = 8;

/// Normalizes a document path so ids match across machines and checkouts.
///
/// - Backslashes become forward slashes.
/// - A leading `./` is dropped.
/// - Everything up to and including the first matching prefix in
///   `strip_prefixes` is removed (e.g. `/home/me/kb/docs/a.md` → `a.md`
///   with prefix `docs/`).
pub fn normalize_doc_path(path: &str, strip_prefixes: &[String]) -> String {
    let mut p = path.replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    for prefix in strip_prefixes.iter().filter(|s| !s.is_empty()) {
        if let Some(idx) = p.find(prefix.as_str()) {
            p = p[idx + prefix.len()..].to_string();
            break;
        }
    }
    p
}

/// Resolves `path` against `root` (the current directory when `None`) and
/// returns it relative to that root, `/`-separated.
///
/// Relative inputs are taken relative to the current directory. Paths are
/// cleaned lexically and their deepest existing ancestor is canonicalized, so
/// `notes/a.md`, `./notes/a.md` and `/work/notes/a.md` agree when run from
/// `/work`. A path outside the root
/// keeps its absolute form.
pub fn relative_doc_path(path: &Path, root: Option<&Path>) -> String {
    let cwd = std::env::current_dir().ok();
    let abs = resolve(path, cwd.as_deref());
    let root = match root {
        Some(r) => Some(resolve(r, cwd.as_deref())),
        None => cwd.as_deref().map(|c| resolve(c, None)),
    };
    let rel = root
        .as_deref()
        .and_then(|r| abs.strip_prefix(r).ok())
        .filter(|r| !r.as_os_str().is_empty())
        .unwrap_or(abs.as_path());
    rel.to_string_lossy().replace('\\', "/")
}

fn resolve(path: &Path, cwd: Option<&Path>) -> PathBuf {
    let joined = match cwd {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    };
    let clean = lexical(&joined);
    // Canonicalize the deepest existing ancestor so deleted files still resolve.
    for ancestor in clean.ancestors() {
        let (Ok(base), Ok(rest)) = (ancestor.canonicalize(), clean.strip_prefix(ancestor)) else {
            continue;
        };
        return if rest.as_os_str().is_empty() {
            base
        } else {
            base.join(rest)
        };
    }
    clean
}

fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Fixed-width hex id for a document path (first 8 hex chars of BLAKE3).
pub fn stable_doc_id(path: &str, strip_prefixes: &[String]) -> String {
    let normalized = normalize_doc_path(path, strip_prefixes);
    let hash = blake3::hash(normalized.as_bytes()).to_hex();
    hash[..DOC_ID_WIDTH].to_string()
}

/// Chunk id: `doc_id` plus a zero-padded ordinal (`abc12345-007`).
pub fn chunk_id(doc_id: &str, ordinal: usize) -> String {
    format!("{doc_id}-{ordinal:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["docs/".to_string()]
    }

    #[test]
    fn id_is_fixed_width_hex() {
        let id = stable_doc_id("docs/runbook/redis.md", &prefixes());
        assert_eq!(id.len(), DOC_ID_WIDTH);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn prefix_stripping_makes_ids_location_independent() {
        let a = stable_doc_id("docs/runbook/redis.md", &prefixes());
        let b = stable_doc_id("/srv/kb/docs/runbook/redis.md", &prefixes());
        let c = stable_doc_id(".\\docs\\runbook\\redis.md", &prefixes());
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn different_paths_differ() {
        assert_ne!(
            stable_doc_id("docs/a.md", &prefixes()),
            stable_doc_id("docs/b.md", &prefixes())
        );
    }

    #[test]
    fn relative_and_absolute_spellings_agree() {
        let cwd = std::env::current_dir().unwrap();
        let rel = relative_doc_path(Path::new("notes/a.md"), None);
        assert_eq!(rel, "notes/a.md");
        assert_eq!(relative_doc_path(&cwd.join("notes/a.md"), None), rel);
        assert_eq!(relative_doc_path(Path::new("./notes/x/../a.md"), None), rel);
    }

    #[test]
    fn paths_are_made_relative_to_an_explicit_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs/a.md"), "x").unwrap();

        let root = Some(tmp.path());
        assert_eq!(relative_doc_path(&tmp.path().join("docs/a.md"), root), "docs/a.md");
        // deleted files still resolve through their parent directory
        assert_eq!(relative_doc_path(&tmp.path().join("docs/gone.md"), root), "docs/gone.md");
    }

    #[test]
    fn outside_root_stays_absolute() {
        let tmp = tempfile::TempDir::new().unwrap();
        let other = tempfile::TempDir::new().unwrap();
        let got = relative_doc_path(&other.path().join("a.md"), Some(tmp.path()));
        assert!(Path::new(&got).is_absolute());
        assert!(got.ends_with("/a.md"));
    }

    #[test]
    fn chunk_id_is_zero_padded() {
        assert_eq!(chunk_id("abc12345", 0), "abc12345-000");
        assert_eq!(chunk_id("abc12345", 42), "abc12345-042");
        assert_eq!(chunk_id("abc12345", 1234), "abc12345-1234");
    }
}
