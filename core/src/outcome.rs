//! Classification of a build run into success, failure or "could not tell".

use serde::{Deserialize, Serialize};
use std::fmt;

const SUCCESS_MARKERS: [&str; 1] = ["build success"];
const FAILURE_MARKERS: [&str; 2] = ["build failure", "compilation failure"];

/// How a non-empty stderr affects classification.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrPolicy {
    /// Any non-empty stderr means the build failed.
    Fail,
    /// Decide from stdout alone. Docker and Maven both write progress noise to stderr.
    #[default]
    Ignore,
}

/// The verdict for one build run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BuildOutcome {
    Success,
    Failure,
    /// Neither marker was found. Carries the stdout so the caller can still inspect it.
    Indeterminate { output: String },
}

impl BuildOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            BuildOutcome::Success => "SUCCESS",
            BuildOutcome::Failure => "FAILURE",
            BuildOutcome::Indeterminate { .. } => "INDETERMINATE",
        }
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a build's stdout and stderr to a [BuildOutcome].
#[derive(Clone, Copy, Debug, Default)]
pub struct Classifier {
    pub stderr_policy: StderrPolicy,
}

impl Classifier {
    pub fn new(stderr_policy: StderrPolicy) -> Classifier {
        Classifier { stderr_policy }
    }

    /// Markers are matched case-insensitively. A success marker wins over a failure marker.
    pub fn classify(&self, stdout: &str, stderr: &str) -> BuildOutcome {
        if self.stderr_policy == StderrPolicy::Fail && !stderr.trim().is_empty() {
            return BuildOutcome::Failure;
        }
        let lowered = stdout.to_lowercase();
        if SUCCESS_MARKERS.iter().any(|m| lowered.contains(m)) {
            BuildOutcome::Success
        } else if FAILURE_MARKERS.iter().any(|m| lowered.contains(m)) {
            BuildOutcome::Failure
        } else {
            BuildOutcome::Indeterminate {
                output: stdout.to_string(),
            }
        }
    }
}
