use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning a Markdown file into a [`crate::Document`].
///
/// Callers that rebuild a whole corpus treat these as per-document soft
/// failures: log, skip the file, continue.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// The file could not be read (missing, permissions, not UTF-8).
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Front matter block is present but is not valid YAML.
    #[error("malformed front matter in {path}: {source}")]
    FrontMatter {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Front matter parsed, but has an unexpected shape.
    #[error("invalid front matter in {path}: {reason}")]
    InvalidFrontMatter { path: String, reason: &'static str },
}
