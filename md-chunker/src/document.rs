//! Markdown documents with YAML front matter, and the chunks derived from them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value as Yaml;
use services::doc_id::{chunk_id, relative_doc_path, stable_doc_id};
use tracing::debug;

use crate::errors::ChunkError;
use crate::headings::SECTION_PATH_SEPARATOR;

/// Default size budget (in chars) for a merged chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 3200;

const DEFAULT_CONFIDENCE: &str = "unknown";

/// Knobs for document parsing.
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    /// Merge budget passed to the section merger.
    pub max_chars: usize,
    /// Path prefixes stripped before hashing a path into a doc id.
    pub strip_prefixes: Vec<String>,
    /// Directory loaded paths are made relative to; the current directory when unset.
    pub root: Option<PathBuf>,
}

impl ChunkOptions {
    /// The root-relative form of `path` used for doc ids and payloads.
    pub fn doc_path(&self, path: &Path) -> String {
        relative_doc_path(path, self.root.as_deref())
    }
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHUNK_CHARS,
            strip_prefixes: vec!["docs/".to_string()],
            root: None,
        }
    }
}

/// Front matter fields the knowledge base understands. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub confidence: Option<String>,
    pub tags: Vec<String>,
    pub source_repo: Option<String>,
    pub source_path: Option<String>,
    pub source_commit: Option<String>,
}

/// A parsed Markdown file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub path: String,
    /// Body with the front matter removed.
    pub content: String,
    pub metadata: DocMetadata,
}

/// One retrievable unit of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default)]
    pub section_path: Vec<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_confidence")]
    pub confidence: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_repo: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub source_commit: String,
}

fn default_confidence() -> String {
    DEFAULT_CONFIDENCE.to_string()
}

impl Chunk {
    /// Text handed to embedding and rerank models: the title line gives
    /// short sections their document context.
    pub fn embedding_text(&self) -> String {
        if self.title.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n{}", self.title, self.text)
        }
    }

    /// Section path rendered as `"A > B"`.
    pub fn section_path_string(&self) -> String {
        self.section_path.join(SECTION_PATH_SEPARATOR)
    }
}

impl Document {
    /// Reads and parses a Markdown file. The stored path is
    /// [`ChunkOptions::doc_path`], so the same file gets the same doc id
    /// however it was named.
    ///
    /// # Errors
    /// [`ChunkError::Io`] when the file cannot be read, or a front matter error.
    pub fn load(path: &Path, opts: &ChunkOptions) -> Result<Self, ChunkError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ChunkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&opts.doc_path(path), &raw, opts)
    }

    /// Parses already-loaded Markdown. `path` is used for the doc id, the
    /// default title and the stored payload.
    pub fn parse(path: &str, raw: &str, opts: &ChunkOptions) -> Result<Self, ChunkError> {
        let (front, body) = split_front_matter(raw);
        let metadata = match front {
            Some(yaml) => parse_metadata(path, yaml)?,
            None => DocMetadata::default(),
        };

        let doc_id = metadata
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| stable_doc_id(path, &opts.strip_prefixes));
        let title = metadata
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| file_name(path).to_string());

        Ok(Self {
            doc_id,
            title,
            path: path.to_string(),
            content: body.to_string(),
            metadata,
        })
    }

    /// Cleans, splits and merges the body, numbering chunks from zero.
    pub fn to_chunks(&self, max_chars: usize) -> Vec<Chunk> {
        let sections = crate::chunk_text(&self.content, max_chars);
        debug!(doc_id = %self.doc_id, path = %self.path, chunks = sections.len(), "document chunked");

        let m = &self.metadata;
        sections
            .into_iter()
            .enumerate()
            .map(|(i, sec)| Chunk {
                doc_id: self.doc_id.clone(),
                chunk_id: chunk_id(&self.doc_id, i),
                chunk_index: i,
                text: sec.text,
                section_path: sec.section_path,
                path: self.path.clone(),
                title: self.title.clone(),
                confidence: m.confidence.clone().unwrap_or_else(default_confidence),
                tags: m.tags.clone(),
                source_repo: m.source_repo.clone().unwrap_or_default(),
                source_path: m.source_path.clone().unwrap_or_default(),
                source_commit: m.source_commit.clone().unwrap_or_default(),
            })
            .collect()
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Splits a leading `---` fenced YAML block from the body.
///
/// The block must start on the first line and close with a `---` (or `...`)
/// line; otherwise the whole input is body.
fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(first_nl) = raw.find('\n') else {
        return (None, raw);
    };
    if raw[..first_nl].trim_end() != "---" {
        return (None, raw);
    }

    let yaml_start = first_nl + 1;
    let mut pos = yaml_start;
    while pos <= raw.len() {
        let line_end = raw[pos..].find('\n').map_or(raw.len(), |i| pos + i);
        let line = raw[pos..line_end].trim_end();
        if line == "---" || line == "..." {
            let body_start = (line_end + 1).min(raw.len());
            return (Some(&raw[yaml_start..pos]), &raw[body_start..]);
        }
        if line_end == raw.len() {
            break;
        }
        pos = line_end + 1;
    }
    (None, raw)
}

fn parse_metadata(path: &str, yaml: &str) -> Result<DocMetadata, ChunkError> {
    let value: Yaml = serde_yaml::from_str(yaml).map_err(|source| ChunkError::FrontMatter {
        path: path.to_string(),
        source,
    })?;
    let map = match value {
        Yaml::Null => return Ok(DocMetadata::default()),
        Yaml::Mapping(m) => m,
        _ => {
            return Err(ChunkError::InvalidFrontMatter {
                path: path.to_string(),
                reason: "expected a mapping",
            });
        }
    };

    let field = |key: &str| map.get(key).and_then(scalar_string);
    let tags = match map.get("tags") {
        Some(Yaml::Sequence(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(other) => scalar_string(other).into_iter().collect(),
        None => Vec::new(),
    };

    Ok(DocMetadata {
        id: field("id"),
        title: field("title"),
        confidence: field("confidence"),
        tags,
        source_repo: field("source_repo"),
        source_path: field("source_path"),
        source_commit: field("source_commit"),
    })
}

fn scalar_string(v: &Yaml) -> Option<String> {
    match v {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
