//! Fenced code block detection.
//!
//! Markers are lines starting with three backticks. They are paired strictly
//! top to bottom (1st with 2nd, 3rd with 4th, ...); the info string after the
//! backticks is ignored and an unmatched trailing marker opens nothing.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^```").expect("valid fence regex"));

/// Byte ranges of fenced code blocks in `text`.
///
/// Each range spans from the start of the opening marker to the end of the
/// closing marker. Ranges are sorted and never overlap.
pub fn ranges(text: &str) -> Vec<Range<usize>> {
    let markers: Vec<_> = FENCE_RE.find_iter(text).collect();
    markers
        .chunks_exact(2)
        .map(|pair| pair[0].start()..pair[1].end())
        .collect()
}

/// Whether byte offset `pos` falls inside any of `ranges`.
pub fn in_range(pos: usize, ranges: &[Range<usize>]) -> bool {
    // Ranges are sorted and disjoint.
    let idx = ranges.partition_point(|r| r.end <= pos);
    ranges.get(idx).is_some_and(|r| r.contains(&pos))
}
