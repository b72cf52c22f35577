//! Store-agnostic payload filters and their Qdrant conversion.
//!
//! Supports the two match kinds the knowledge base needs:
//! exact keyword equality and full-text token matching. All conditions are
//! AND-ed (`must`).

use qdrant_client::qdrant::{Condition, Filter};
use tracing::debug;

use crate::record::ChunkPayload;

/// One condition on a payload field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldMatch {
    /// Exact equality (`doc_id`, `source_repo`).
    Keyword { field: String, value: String },
    /// Every token of `text` occurs in the field (`text`, `path`).
    Text { field: String, text: String },
}

/// Conjunction of field conditions. An empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreFilter {
    pub must: Vec<FieldMatch>,
}

impl StoreFilter {
    pub fn keyword(field: &str, value: &str) -> Self {
        Self::default().and_keyword(field, value)
    }

    pub fn text(field: &str, text: &str) -> Self {
        Self::default().and_text(field, text)
    }

    pub fn and_keyword(mut self, field: &str, value: &str) -> Self {
        self.must.push(FieldMatch::Keyword {
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn and_text(mut self, field: &str, text: &str) -> Self {
        self.must.push(FieldMatch::Text {
            field: field.to_string(),
            text: text.to_string(),
        });
        self
    }

    /// Chunks of one document.
    pub fn doc(doc_id: &str) -> Self {
        Self::keyword("doc_id", doc_id)
    }

    /// Restricts to paths under a directory segment, e.g. `runbook` → `/runbook/`.
    pub fn with_scope(self, scope: Option<&str>) -> Self {
        match scope.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => self.and_text("path", &format!("/{}/", s.trim_matches('/'))),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// In-process evaluation against a payload (used by the memory store).
    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        self.must.iter().all(|m| match m {
            FieldMatch::Keyword { field, value } => {
                payload_field(payload, field).is_some_and(|v| v.iter().any(|x| x == value))
            }
            FieldMatch::Text { field, text } => payload_field(payload, field)
                .is_some_and(|v| v.iter().any(|x| text_contains(x, text))),
        })
    }
}

/// String values of a payload field; lists yield every element.
fn payload_field(p: &ChunkPayload, field: &str) -> Option<Vec<String>> {
    Some(match field {
        "doc_id" => vec![p.doc_id.clone()],
        "chunk_id" => vec![p.chunk_id.clone()],
        "path" => vec![p.path.clone()],
        "title" => vec![p.title.clone()],
        "section_path" => p.section_path.clone(),
        "text" => vec![p.text.clone()],
        "confidence" => vec![p.confidence.clone()],
        "tags" => p.tags.clone(),
        "source_repo" => vec![p.source_repo.clone()],
        "source_path" => vec![p.source_path.clone()],
        "source_commit" => vec![p.source_commit.clone()],
        _ => return None,
    })
}

/// Lowercased alphanumeric runs, the way a word tokenizer sees text.
pub(crate) fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Full-text match: every query token appears among the haystack tokens.
/// A query without tokens matches nothing.
pub(crate) fn text_contains(haystack: &str, query: &str) -> bool {
    let q = tokens(query);
    if q.is_empty() {
        return false;
    }
    let h = tokens(haystack);
    q.iter().all(|t| h.contains(t))
}

/// Converts [`StoreFilter`] to a Qdrant [`Filter`] (`must` clauses).
pub fn to_qdrant_filter(f: &StoreFilter) -> Filter {
    debug!("filters::to_qdrant_filter must={}", f.must.len());
    let conditions: Vec<Condition> = f
        .must
        .iter()
        .map(|m| match m {
            FieldMatch::Keyword { field, value } => Condition::matches(field.as_str(), value.clone()),
            FieldMatch::Text { field, text } => Condition::matches_text(field.as_str(), text.as_str()),
        })
        .collect();
    Filter::must(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(path: &str, text: &str) -> ChunkPayload {
        ChunkPayload {
            doc_id: "d1".into(),
            chunk_id: "d1-000".into(),
            chunk_index: 0,
            path: path.into(),
            title: "T".into(),
            section_path: vec![],
            text: text.into(),
            confidence: "unknown".into(),
            tags: vec!["redis".into()],
            source_repo: "https://git/x".into(),
            source_path: String::new(),
            source_commit: String::new(),
        }
    }

    #[test]
    fn keyword_and_text_are_anded() {
        let p = payload("docs/runbook/redis.md", "Promote the Replica now");
        assert!(StoreFilter::doc("d1").matches(&p));
        assert!(!StoreFilter::doc("d2").matches(&p));
        assert!(StoreFilter::text("text", "replica promote").matches(&p));
        assert!(!StoreFilter::doc("d1").and_text("text", "sentinel").matches(&p));
        assert!(StoreFilter::keyword("tags", "redis").matches(&p));
    }

    #[test]
    fn scope_matches_directory_segment() {
        let p = payload("docs/runbook/redis.md", "x");
        assert!(StoreFilter::default().with_scope(Some("runbook")).matches(&p));
        assert!(!StoreFilter::default().with_scope(Some("adr")).matches(&p));
        assert!(StoreFilter::default().with_scope(Some("  ")).is_empty());
    }

    #[test]
    fn empty_filter_matches_all() {
        assert!(StoreFilter::default().matches(&payload("a.md", "")));
    }

    #[test]
    fn tokenless_query_matches_nothing() {
        assert!(!text_contains("anything", "  !! "));
    }

    #[test]
    fn qdrant_filter_has_one_condition_per_match() {
        let f = StoreFilter::doc("d1").and_text("path", "/runbook/");
        assert_eq!(to_qdrant_filter(&f).must.len(), 2);
    }
}
