//! Release notes of the upgraded library, used as repair context.
//!
//! Notes are stored per library as `<dir>/<groupId>.json`, an array of `{version, details}`.

use bumpfix_core::repair::{LibraryContext, RepairError};
use serde::Deserialize;
use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ReleaseNote {
    pub version: String,
    pub details: String,
}

/// Loads the notes for the versions the update moved across. A library without a notes file
/// has no notes.
pub fn load(dir: &Path, library: &LibraryContext) -> Result<Vec<ReleaseNote>, RepairError> {
    let path = dir.join(format!("{}.json", library.name));
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No release notes at {}", path.display());
            return Ok(vec![]);
        }
        Err(e) => return Err(e.into()),
    };
    let notes: Vec<ReleaseNote> = serde_json::from_str(&contents)
        .map_err(|e| RepairError::Parse(format!("{}: {e}", path.display())))?;
    Ok(between(notes, &library.base_version, &library.new_version))
}

/// Keeps notes with `previous < version <= new`, oldest first.
pub fn between(notes: Vec<ReleaseNote>, previous: &str, new: &str) -> Vec<ReleaseNote> {
    let mut kept: Vec<_> = notes
        .into_iter()
        .filter(|n| {
            compare_versions(&n.version, previous) == Ordering::Greater
                && compare_versions(&n.version, new) != Ordering::Greater
        })
        .collect();
    kept.sort_by(|a, b| compare_versions(&a.version, &b.version));
    kept
}

#[derive(Debug, Eq, Ord, PartialEq, PartialOrd)]
enum Part<'a> {
    Number(u64),
    Text(&'a str),
}

/// Compares dotted versions numerically, part by part. Trailing zero parts are ignored, so
/// `1.2` equals `1.2.0`. Non-numeric parts sort after numeric ones, so `1.0.Final` is above
/// `1.0.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parts(a).cmp(&parts(b))
}

fn parts(version: &str) -> Vec<Part<'_>> {
    let version = version.trim().trim_start_matches(['v', 'V']);
    let mut parts: Vec<Part> = version
        .split(['.', '-', '_'])
        .filter(|p| !p.is_empty())
        .map(|p| match p.parse() {
            Ok(n) => Part::Number(n),
            Err(_) => Part::Text(p),
        })
        .collect();
    while parts.last() == Some(&Part::Number(0)) {
        parts.pop();
    }
    parts
}
