//! `DiffEngine`: generate and apply line-oriented textual patches.
//!
//! Diffing uses `similar`'s Myers-style shortest-edit-script algorithm
//! ([`similar::TextDiff::from_lines`]); this module is responsible only for
//! grouping the resulting edit script into hunks, serializing those hunks to
//! this system's private text encoding, and re-applying them to a (possibly
//! slightly different) copy of the original text with fuzzy anchor matching.
//!
//! The wire format intentionally mirrors unidiff's visual grammar (`@@
//! -a,b +c,d @@` headers, `+`/`-`/` ` prefixed lines) for human
//! readability in logs, but the parser is private to this crate — it is not
//! meant to round-trip through `patch(1)` or any other unidiff consumer.

use agentfs_common::ApiError;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};

/// One contiguous diff region, anchored by its pre-image line range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub pre_start: usize,
    pub pre_len: usize,
    pub post_start: usize,
    pub post_len: usize,
    pub lines: Vec<HunkLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Add(String),
    Remove(String),
}

pub type Patch = Vec<Hunk>;

const CONTEXT_LINES: usize = 3;
const FUZZ: usize = 4;

/// Split text into lines, dropping a single trailing empty element produced
/// by a final `\n` (restored on serialization from whether `modified` itself
/// ends in `\n`).
fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Diff `original` against `modified` and group the edit script into hunks
/// with `CONTEXT_LINES` lines of surrounding context, the anchor a future
/// `apply_patch` fuzz-matches against.
pub fn generate_diff(original: &str, modified: &str) -> Patch {
    let original_lines = split_lines(original);
    let modified_lines = split_lines(modified);

    let diff = TextDiff::from_slices(&original_lines, &modified_lines);
    let mut hunks = Vec::new();

    for group in diff.grouped_ops(CONTEXT_LINES) {
        let Some(first) = group.first() else { continue };
        let Some(last) = group.last() else { continue };

        let pre_start = first.old_range().start;
        let pre_end = last.old_range().end;
        let post_start = first.new_range().start;
        let post_end = last.new_range().end;

        let mut lines = Vec::new();
        for op in &group {
            for change in diff.iter_changes(op) {
                let text = change.value().to_string();
                match change.tag() {
                    ChangeTag::Equal => lines.push(HunkLine::Context(text)),
                    ChangeTag::Delete => lines.push(HunkLine::Remove(text)),
                    ChangeTag::Insert => lines.push(HunkLine::Add(text)),
                }
            }
        }

        hunks.push(Hunk {
            pre_start,
            pre_len: pre_end - pre_start,
            post_start,
            post_len: post_end - post_start,
            lines,
        });
    }

    hunks
}

/// Serialize a patch to this system's private hunk text format.
pub fn patch_to_text(patch: &Patch) -> String {
    let mut out = String::new();
    for (i, hunk) in patch.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk.pre_start + 1,
            hunk.pre_len,
            hunk.post_start + 1,
            hunk.post_len
        ));
        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) => out.push_str(&format!(" {text}\n")),
                HunkLine::Add(text) => out.push_str(&format!("+{text}\n")),
                HunkLine::Remove(text) => out.push_str(&format!("-{text}\n")),
            }
        }
    }
    out
}

/// Parse a patch serialized by [`patch_to_text`]. Malformed headers are
/// rejected; this parser does not attempt to support arbitrary third-party
/// unidiff input.
pub fn patch_from_text(text: &str) -> Result<Patch, ApiError> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("@@ ") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            current = Some(parse_header(rest)?);
        } else if let Some(hunk) = current.as_mut() {
            if let Some(text) = line.strip_prefix('+') {
                hunk.lines.push(HunkLine::Add(text.to_string()));
            } else if let Some(text) = line.strip_prefix('-') {
                hunk.lines.push(HunkLine::Remove(text.to_string()));
            } else if let Some(text) = line.strip_prefix(' ') {
                hunk.lines.push(HunkLine::Context(text.to_string()));
            } else if line.is_empty() {
                // blank separator line between hunks; ignore
            } else {
                return Err(ApiError::invalid_argument(format!(
                    "malformed patch line: {line:?}"
                )));
            }
        } else {
            return Err(ApiError::invalid_argument(
                "patch text does not start with a hunk header",
            ));
        }
    }
    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }
    Ok(hunks)
}

fn parse_header(rest: &str) -> Result<Hunk, ApiError> {
    let rest = rest
        .strip_suffix(" @@")
        .ok_or_else(|| ApiError::invalid_argument(format!("malformed hunk header: {rest:?}")))?;
    let mut parts = rest.split(' ');
    let pre = parts
        .next()
        .and_then(|p| p.strip_prefix('-'))
        .ok_or_else(|| ApiError::invalid_argument("malformed hunk header: missing pre-image range"))?;
    let post = parts
        .next()
        .and_then(|p| p.strip_prefix('+'))
        .ok_or_else(|| ApiError::invalid_argument("malformed hunk header: missing post-image range"))?;

    let (pre_start, pre_len) = parse_range(pre)?;
    let (post_start, post_len) = parse_range(post)?;

    Ok(Hunk {
        pre_start: pre_start.saturating_sub(1),
        pre_len,
        post_start: post_start.saturating_sub(1),
        post_len,
        lines: Vec::new(),
    })
}

fn parse_range(range: &str) -> Result<(usize, usize), ApiError> {
    let mut split = range.splitn(2, ',');
    let start: usize = split
        .next()
        .ok_or_else(|| ApiError::invalid_argument(format!("malformed range: {range:?}")))?
        .parse()
        .map_err(|_| ApiError::invalid_argument(format!("malformed range: {range:?}")))?;
    let len: usize = split
        .next()
        .ok_or_else(|| ApiError::invalid_argument(format!("malformed range: {range:?}")))?
        .parse()
        .map_err(|_| ApiError::invalid_argument(format!("malformed range: {range:?}")))?;
    Ok((start, len))
}

/// Result of [`apply_patch`].
pub struct ApplyResult {
    pub text: String,
    pub all_applied: bool,
}

/// Apply `patch` to `original`, tolerant to the pre-image anchor having
/// drifted by up to [`FUZZ`] lines (e.g. because unrelated lines were added
/// or removed earlier in the file since the patch was generated). A hunk
/// whose context can't be located within the fuzz window is skipped — the
/// overall apply still "succeeds" but `all_applied` is `false`.
pub fn apply_patch(original: &str, patch: &Patch) -> ApplyResult {
    let mut lines = split_lines(original);
    let trailing_newline = original.ends_with('\n') || original.is_empty();
    let mut all_applied = true;

    // Apply in order, tracking a running offset so later hunks' anchors
    // account for earlier hunks' net line-count change.
    let mut offset: isize = 0;

    for hunk in patch {
        let context_before: Vec<&str> = hunk
            .lines
            .iter()
            .take_while(|l| matches!(l, HunkLine::Context(_)))
            .map(|l| match l {
                HunkLine::Context(t) => t.as_str(),
                _ => unreachable!(),
            })
            .collect();

        #[allow(clippy::cast_possible_wrap)]
        let nominal_start = (hunk.pre_start as isize + offset).max(0) as usize;

        let Some(anchor) = locate_anchor(&lines, nominal_start, &context_before) else {
            all_applied = false;
            continue;
        };

        let removed: Vec<String> = hunk
            .lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(t) | HunkLine::Remove(t) => Some(t.clone()),
                HunkLine::Add(_) => None,
            })
            .collect();
        let replacement: Vec<String> = hunk
            .lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(t) | HunkLine::Add(t) => Some(t.clone()),
                HunkLine::Remove(_) => None,
            })
            .collect();

        let end = (anchor + removed.len()).min(lines.len());
        let removed_count = end - anchor;
        let added_count = replacement.len();

        lines.splice(anchor..end, replacement);
        #[allow(clippy::cast_possible_wrap)]
        {
            offset += added_count as isize - removed_count as isize;
        }
    }

    let mut text = lines.join("\n");
    if trailing_newline && !text.is_empty() {
        text.push('\n');
    }

    ApplyResult { text, all_applied }
}

/// Search forward then backward from `nominal_start` (within [`FUZZ`] lines)
/// for a position where `context` appears verbatim.
fn locate_anchor(lines: &[String], nominal_start: usize, context: &[&str]) -> Option<usize> {
    if context.is_empty() {
        return Some(nominal_start.min(lines.len()));
    }

    let matches_at = |start: usize| -> bool {
        if start + context.len() > lines.len() {
            return false;
        }
        context
            .iter()
            .enumerate()
            .all(|(i, expected)| lines[start + i] == *expected)
    };

    if matches_at(nominal_start) {
        return Some(nominal_start);
    }

    for delta in 1..=FUZZ {
        if nominal_start + delta + context.len() <= lines.len() + FUZZ && matches_at(nominal_start + delta)
        {
            return Some(nominal_start + delta);
        }
        if delta <= nominal_start && matches_at(nominal_start - delta) {
            return Some(nominal_start - delta);
        }
    }
    None
}

/// JSON view of `GenerateDiff`'s response: `{patches}`.
#[derive(Serialize)]
pub struct DiffResponse {
    pub patches: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text_serialization() {
        let patch = generate_diff("alpha\nbeta\n", "alpha\ngamma\n");
        let text = patch_to_text(&patch);
        let parsed = patch_from_text(&text).unwrap();
        assert_eq!(patch, parsed);
    }

    #[test]
    fn generate_then_apply_yields_modified() {
        let original = "alpha\nbeta\ngamma\n";
        let modified = "alpha\ngamma\ndelta\n";
        let patch = generate_diff(original, modified);
        let result = apply_patch(original, &patch);
        assert!(result.all_applied);
        assert_eq!(result.text, modified);
    }

    #[test]
    fn identical_inputs_produce_no_hunks() {
        let patch = generate_diff("same\ntext\n", "same\ntext\n");
        assert!(patch.is_empty());
    }

    #[test]
    fn apply_tolerates_small_anchor_drift() {
        let original = "one\ntwo\nthree\nfour\nfive\n";
        let modified = "one\ntwo\nTHREE\nfour\nfive\n";
        let patch = generate_diff(original, modified);

        // Simulate drift: two unrelated lines inserted before the hunk.
        let drifted = "zero\nzero_b\none\ntwo\nthree\nfour\nfive\n";
        let result = apply_patch(drifted, &patch);
        assert!(result.all_applied);
        assert!(result.text.contains("THREE"));
    }

    #[test]
    fn unlocatable_hunk_is_skipped_not_fatal() {
        let patch = generate_diff("a\nb\nc\n", "a\nX\nc\n");
        let unrelated = "totally\nunrelated\ncontent\n";
        let result = apply_patch(unrelated, &patch);
        assert!(!result.all_applied);
    }
}
