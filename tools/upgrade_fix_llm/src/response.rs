//! Picking the repaired file out of a model response.

use regex::Regex;
use std::sync::LazyLock;

const NO_CHANGES: &str = "No changes needed";
const LANGUAGE_TAGS: [&str; 1] = ["java"];

// An unterminated block runs to the end of the response.
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)(?:```|\z)").expect("invalid regex"));

/// Returns the updated file content in `response`, or `None` if the response has no usable
/// code: no fenced block, an empty one, a bare "No changes needed", or a copy of `original`.
///
/// When several blocks are present the one with the most lines wins; ties go to the first.
pub fn updated_code(response: &str, original: &str) -> Option<String> {
    let block = FENCED_BLOCK
        .captures_iter(response)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .reduce(|best, block| {
            if block.lines().count() > best.lines().count() {
                block
            } else {
                best
            }
        })?;
    let code = strip_language_tag(block).trim();
    if code.is_empty() || code == NO_CHANGES || code == original.trim() {
        return None;
    }
    Some(format!("{code}\n"))
}

fn strip_language_tag(block: &str) -> &str {
    let (first, rest) = block.split_once('\n').unwrap_or((block, ""));
    if LANGUAGE_TAGS.contains(&first.trim().to_lowercase().as_str()) {
        rest
    } else {
        block
    }
}
