//! Coalescing of small sibling sections.

use crate::headings::Section;

const SEPARATOR: &str = "\n\n";
const SEPARATOR_CHARS: usize = SEPARATOR.len();

/// Two paths are siblings when everything but their last segment matches.
///
/// An empty path and any single-segment path share the empty parent.
pub fn same_parent(a: &[String], b: &[String]) -> bool {
    parent(a) == parent(b)
}

fn parent(path: &[String]) -> &[String] {
    &path[..path.len().saturating_sub(1)]
}

/// Single forward pass that folds each section into the running buffer while
/// the combined size, separator included, stays strictly below `max_chars`
/// (in chars) and both sections are siblings.
///
/// Merged text is joined by a blank line and takes the path of the *last*
/// section folded in. Order is preserved; nothing is split.
pub fn merge(sections: Vec<Section>, max_chars: usize) -> Vec<Section> {
    let mut out = Vec::with_capacity(sections.len());
    let mut buf: Option<(Section, usize)> = None;

    for sec in sections {
        let sec_len = sec.text.chars().count();
        buf = match buf.take() {
            None => Some((sec, sec_len)),
            Some((mut acc, acc_len))
                if acc_len + SEPARATOR_CHARS + sec_len < max_chars
                    && same_parent(&acc.section_path, &sec.section_path) =>
            {
                acc.text.push_str(SEPARATOR);
                acc.text.push_str(&sec.text);
                acc.section_path = sec.section_path;
                Some((acc, acc_len + SEPARATOR_CHARS + sec_len))
            }
            Some((acc, _)) => {
                out.push(acc);
                Some((sec, sec_len))
            }
        };
    }

    if let Some((acc, _)) = buf {
        out.push(acc);
    }
    out
}
