//! Heading-based section splitting.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::code_fence;

/// Separator used when a section path is rendered as a single string.
pub const SECTION_PATH_SEPARATOR: &str = " > ";

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.+)$").expect("valid heading regex"));

/// A run of body text plus the heading titles enclosing it, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub text: String,
    pub section_path: Vec<String>,
}

impl Section {
    pub fn new(text: impl Into<String>, section_path: Vec<String>) -> Self {
        Self {
            text: text.into(),
            section_path,
        }
    }

    /// `"A > B > C"`; empty for text before the first heading.
    pub fn path_string(&self) -> String {
        self.section_path.join(SECTION_PATH_SEPARATOR)
    }
}

/// Splits `content` at ATX headings (`#` … `######`).
///
/// Headings inside fenced code are ignored. Each heading pops stack entries
/// at the same or deeper level before being pushed, so a section's path is
/// the chain of headings that encloses it. Blank sections are dropped; when
/// no section survives, the whole trimmed content comes back as a single
/// section with an empty path.
pub fn split(content: &str) -> Vec<Section> {
    let fences = code_fence::ranges(content);
    let mut sections = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut last = 0usize;

    for caps in HEADING_RE.captures_iter(content) {
        let (Some(whole), Some(hashes), Some(title)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        if code_fence::in_range(whole.start(), &fences) {
            continue;
        }
        let title = title.as_str().trim();
        if title.is_empty() {
            continue;
        }

        // Flush with the path as it was before this heading.
        push_section(&mut sections, &content[last..whole.start()], &stack);

        let level = hashes.as_str().len();
        while stack.last().is_some_and(|(l, _)| *l >= level) {
            stack.pop();
        }
        stack.push((level, title.to_string()));
        last = whole.end();
    }

    push_section(&mut sections, &content[last..], &stack);

    if sections.is_empty() {
        sections.push(Section::new(content.trim(), Vec::new()));
    }
    sections
}

fn push_section(out: &mut Vec<Section>, raw: &str, stack: &[(usize, String)]) {
    let text = raw.trim();
    if text.is_empty() {
        return;
    }
    let path = stack.iter().map(|(_, t)| t.clone()).collect();
    out.push(Section::new(text, path));
}
