//! The structured form of a build log: compiler diagnostics grouped by source file.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Where a diagnostic points. Paths are the absolute in-container paths Maven prints.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DiagnosticLocation {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

/// A single compiler diagnostic.
///
/// `message` always starts with the `[line,column]` locator and has its whitespace collapsed, so
/// two diagnostics that differ only in log formatting compare equal.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    pub location: DiagnosticLocation,
    pub message: String,
}

impl Diagnostic {
    /// Builds a diagnostic, normalizing `message`. Returns `None` if nothing but whitespace is
    /// left.
    pub fn new(location: DiagnosticLocation, message: &str) -> Option<Diagnostic> {
        let message = normalize_message(message);
        if message.is_empty() {
            return None;
        }
        Some(Diagnostic { location, message })
    }

    pub fn file_path(&self) -> &str {
        &self.location.file_path
    }

    /// The identity used to match this diagnostic across two builds.
    pub fn key(&self) -> DiagnosticKey {
        DiagnosticKey {
            file_path: self.location.file_path.clone(),
            line: self.location.line,
            column: self.location.column,
            message: self.message.clone(),
        }
    }
}

/// Identity of a diagnostic: `(file, line, column, normalized message)`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct DiagnosticKey {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for DiagnosticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_path, self.message)
    }
}

/// Collapses every run of whitespace into one space and trims the ends.
pub fn normalize_message(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All diagnostics of one source file, in first-seen order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileDiagnostics {
    pub file_path: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Diagnostics grouped by file path.
///
/// Files keep the order in which they were first seen in the log and every file present has at
/// least one diagnostic. Inserting a diagnostic whose key is already present is a no-op.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileDiagnosticMap {
    files: Vec<FileDiagnostics>,
    index: HashMap<String, usize>,
}

impl FileDiagnosticMap {
    pub fn new() -> FileDiagnosticMap {
        FileDiagnosticMap::default()
    }

    /// Adds `diagnostic` under its file. Returns false if an identical diagnostic was already
    /// recorded.
    pub fn insert(&mut self, diagnostic: Diagnostic) -> bool {
        match self.index.get(diagnostic.file_path()) {
            Some(&i) => {
                let entry = &mut self.files[i];
                if entry.diagnostics.contains(&diagnostic) {
                    return false;
                }
                entry.diagnostics.push(diagnostic);
            }
            None => {
                let file_path = diagnostic.file_path().to_string();
                self.index.insert(file_path.clone(), self.files.len());
                self.files.push(FileDiagnostics {
                    file_path,
                    diagnostics: vec![diagnostic],
                });
            }
        }
        true
    }

    /// Returns the diagnostics recorded for `file_path`, if any.
    pub fn get(&self, file_path: &str) -> Option<&[Diagnostic]> {
        self.index
            .get(file_path)
            .map(|&i| self.files[i].diagnostics.as_slice())
    }

    pub fn contains_file(&self, file_path: &str) -> bool {
        self.index.contains_key(file_path)
    }

    /// Iterates over `(file path, diagnostics)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Diagnostic])> {
        self.files
            .iter()
            .map(|f| (f.file_path.as_str(), f.diagnostics.as_slice()))
    }

    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.file_path.as_str())
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn diagnostic_count(&self) -> usize {
        self.files.iter().map(|f| f.diagnostics.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<Diagnostic> for FileDiagnosticMap {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> FileDiagnosticMap {
        let mut map = FileDiagnosticMap::new();
        iter.into_iter().for_each(|d| {
            map.insert(d);
        });
        map
    }
}

impl Extend<Diagnostic> for FileDiagnosticMap {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        iter.into_iter().for_each(|d| {
            self.insert(d);
        });
    }
}

/// Serialized as a JSON object from file path to its list of diagnostics.
impl Serialize for FileDiagnosticMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for file in &self.files {
            map.serialize_entry(&file.file_path, &file.diagnostics)?;
        }
        map.end()
    }
}
