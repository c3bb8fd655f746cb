//! Comparison of the diagnostics seen before and after a repair.

use crate::diagnostic::{Diagnostic, DiagnosticKey, FileDiagnosticMap};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Which files and diagnostics a repair fixed, left alone, or introduced.
///
/// File sets are sorted by path. Diagnostic lists keep the order of the map they came from.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReconciliationResult {
    /// Files with diagnostics before the repair and none after.
    pub fixed_files: BTreeSet<String>,
    /// Files with diagnostics both before and after.
    pub unfixed_files: BTreeSet<String>,
    /// Files with diagnostics only after.
    pub new_error_files: BTreeSet<String>,
    pub fixed_diagnostics: Vec<DiagnosticKey>,
    pub unfixed_diagnostics: Vec<DiagnosticKey>,
    pub new_diagnostics: Vec<DiagnosticKey>,
    pub pre_fix_file_count: usize,
    pub post_fix_file_count: usize,
    pub pre_fix_diagnostic_count: usize,
    pub post_fix_diagnostic_count: usize,
}

/// Reconciles `pre` against `post`. Pure and total.
pub fn reconcile(pre: &FileDiagnosticMap, post: &FileDiagnosticMap) -> ReconciliationResult {
    let mut result = ReconciliationResult {
        pre_fix_file_count: pre.file_count(),
        post_fix_file_count: post.file_count(),
        pre_fix_diagnostic_count: pre.diagnostic_count(),
        post_fix_diagnostic_count: post.diagnostic_count(),
        ..Default::default()
    };

    for (path, before) in pre.iter() {
        let Some(after) = post.get(path) else {
            result.fixed_files.insert(path.to_string());
            result.fixed_diagnostics.extend(keys(before));
            continue;
        };
        result.unfixed_files.insert(path.to_string());
        for diagnostic in before {
            if after.contains(diagnostic) {
                result.unfixed_diagnostics.push(diagnostic.key());
            } else {
                result.fixed_diagnostics.push(diagnostic.key());
            }
        }
        result.new_diagnostics.extend(
            after
                .iter()
                .filter(|d| !before.contains(*d))
                .map(Diagnostic::key),
        );
    }

    for (path, after) in post.iter().filter(|(path, _)| !pre.contains_file(path)) {
        result.new_error_files.insert(path.to_string());
        result.new_diagnostics.extend(keys(after));
    }
    result
}

fn keys(diagnostics: &[Diagnostic]) -> impl Iterator<Item = DiagnosticKey> + '_ {
    diagnostics.iter().map(Diagnostic::key)
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files: {} fixed, {} unfixed, {} new; diagnostics: {} fixed, {} unfixed, {} new",
            self.fixed_files.len(),
            self.unfixed_files.len(),
            self.new_error_files.len(),
            self.fixed_diagnostics.len(),
            self.unfixed_diagnostics.len(),
            self.new_diagnostics.len(),
        )
    }
}
