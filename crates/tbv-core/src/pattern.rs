//! Capture-group substitution over generated query text.
//!
//! The rewriter does not own the compiler's query representation, so it edits
//! text: find the Nth match of a pattern and splice a replacement over one of
//! its capture groups.

use std::ops::Range;

use regex::Regex;

/// Byte span of `group` in the `occurrence`-th (1-based) match of `regex`.
///
/// Returns `None` when there are fewer matches, when `occurrence` is zero, or
/// when the group did not participate in the match.
pub fn group_span(regex: &Regex, source: &str, group: usize, occurrence: usize) -> Option<Range<usize>> {
    if occurrence == 0 {
        return None;
    }
    regex
        .captures_iter(source)
        .nth(occurrence - 1)?
        .get(group)
        .map(|m| m.range())
}

/// Replace one capture group of one match, or `None` if it is not there.
pub fn try_replace_group(
    regex: &Regex,
    source: &str,
    group: usize,
    occurrence: usize,
    replacement: &str,
) -> Option<String> {
    let span = group_span(regex, source, group, occurrence)?;
    let mut out = String::with_capacity(source.len() - span.len() + replacement.len());
    out.push_str(&source[..span.start]);
    out.push_str(replacement);
    out.push_str(&source[span.end..]);
    Some(out)
}

/// Replace one capture group of one match.
///
/// Best effort: when the requested occurrence does not exist the source is
/// returned unchanged.
pub fn replace_group(
    regex: &Regex,
    source: &str,
    group: usize,
    occurrence: usize,
    replacement: &str,
) -> String {
    try_replace_group(regex, source, group, occurrence, replacement)
        .unwrap_or_else(|| source.to_string())
}
