//! Run configuration shared by the orchestrator and the tools.
//!
//! The values are layered by the `bumpfix` binary; this module only defines the shape.

use crate::outcome::StderrPolicy;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory of benchmark JSON files.
    pub input: PathBuf,

    /// Directory that receives logs, temporary file copies, `run_data.csv` and `error_files/`.
    pub output: PathBuf,

    /// Only datapoints with this failure category are processed.
    pub category: String,

    /// Process at most this many datapoints, chosen at random.
    pub limit: Option<usize>,

    /// Seed for the random choice; unseeded when absent.
    pub seed: Option<u64>,

    pub build_timeout_secs: u64,

    /// How many times a timed-out build is retried before giving up.
    pub timeout_retries: u32,

    pub stderr_policy: StderrPolicy,

    /// Fetch source files from the container. When false, existing local copies are reused.
    pub download_files: bool,

    /// Build the pre-update commit first and skip datapoints where it fails.
    pub check_pre_commit: bool,

    /// Sub-structure for tool-specific configuration.
    pub tools: HashMap<String, Value>,

    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

impl Config {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output.join("logs")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.output.join("temp")
    }

    pub fn error_files_dir(&self) -> PathBuf {
        self.output.join("error_files")
    }

    pub fn validate(&self) {
        unknown_field_warning("", &self.unknown);
    }

    /// Returns the `[tools.<name>]` table.
    pub fn tool(&self, name: &str) -> Result<&Value, String> {
        self.tools.get(name).ok_or_else(|| {
            format!("no {name} config found; please add a [tools.{name}] section to config.toml")
        })
    }

    /// Returns a mock config for testing purposes.
    pub fn mock() -> Self {
        Self {
            input: PathBuf::from("mock_input"),
            output: PathBuf::from("mock_output"),
            category: "COMPILATION_FAILURE".into(),
            limit: None,
            seed: None,
            build_timeout_secs: 1200,
            timeout_retries: 0,
            stderr_policy: StderrPolicy::Ignore,
            download_files: true,
            check_pre_commit: false,
            tools: HashMap::new(),
            unknown: HashMap::new(),
        }
    }
}

/// Logs a warning for every field in `unknown`.
///
/// `prefix` is the path to the table being validated (e.g. `tools.remote_docker`).
pub fn unknown_field_warning(prefix: &str, unknown: &HashMap<String, Value>) {
    let mut entries: Vec<_> = unknown.keys().collect();
    entries.sort_unstable();
    entries.into_iter().for_each(|name| match prefix {
        "" => warn!("unknown config key {name}"),
        p => warn!("unknown config key {p}.{name}"),
    });
}
