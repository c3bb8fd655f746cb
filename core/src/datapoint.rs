//! Benchmark datapoints: one breaking dependency update each, stored as a JSON file named after
//! the breaking commit.

use crate::repair::LibraryContext;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatapointLoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("{0} has no file stem to use as the datapoint id")]
    NoId(String),
}

/// The dependency whose version bump broke the build.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedDependency {
    #[serde(rename = "dependencyGroupID")]
    pub dependency_group_id: String,
    #[serde(rename = "dependencyArtifactID", default)]
    pub dependency_artifact_id: Option<String>,
    pub previous_version: String,
    pub new_version: String,
}

/// The on-disk JSON record. Unknown keys are ignored.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct BenchmarkRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    pre_commit_reproduction_command: Option<String>,
    breaking_update_reproduction_command: String,
    #[serde(default)]
    failure_category: Option<String>,
    updated_dependency: UpdatedDependency,
}

/// One reproducible breaking-update case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datapoint {
    pub id: String,
    pub pre_commit_command: Option<String>,
    pub breaking_command: String,
    pub dependency: UpdatedDependency,
    pub failure_category: Option<String>,
    pub pr_url: Option<String>,
    /// Image named by `docker run` in `breaking_command`.
    pub docker_image_ref: Option<String>,
}

impl Datapoint {
    /// Loads a datapoint from `path`; the id is the file stem.
    pub fn load(path: &Path) -> Result<Datapoint, DatapointLoadError> {
        let display = path.display().to_string();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DatapointLoadError::NoId(display.clone()))?
            .to_string();
        let contents = fs::read_to_string(path).map_err(|source| DatapointLoadError::Io {
            path: display.clone(),
            source,
        })?;
        Datapoint::from_json(id, &contents).map_err(|source| DatapointLoadError::Parse {
            path: display,
            source,
        })
    }

    pub fn from_json(id: String, json: &str) -> Result<Datapoint, serde_json::Error> {
        let record: BenchmarkRecord = serde_json::from_str(json)?;
        Ok(Datapoint {
            docker_image_ref: docker_image(&record.breaking_update_reproduction_command),
            id,
            pre_commit_command: record
                .pre_commit_reproduction_command
                .filter(|c| !c.trim().is_empty()),
            breaking_command: record.breaking_update_reproduction_command,
            dependency: record.updated_dependency,
            failure_category: record.failure_category,
            pr_url: record.url,
        })
    }

    pub fn library_context(&self) -> LibraryContext {
        LibraryContext {
            name: self.dependency.dependency_group_id.clone(),
            base_version: self.dependency.previous_version.clone(),
            new_version: self.dependency.new_version.clone(),
        }
    }
}

/// Returns the first non-flag argument following `docker run`.
pub fn docker_image(command: &str) -> Option<String> {
    let mut tokens = command.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "docker" && tokens.clone().next() == Some("run") {
            tokens.next();
            return tokens.find(|t| !t.starts_with('-')).map(String::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::tempdir;

    const RECORD: &str = r#"{
        "url": "https://github.com/example/demo/pull/12",
        "project": "demo",
        "breakingCommit": "0a1b2c",
        "preCommitReproductionCommand": "docker run ghcr.io/bench/breaking-updates:0a1b2c-pre",
        "breakingUpdateReproductionCommand": "docker run ghcr.io/bench/breaking-updates:0a1b2c-breaking",
        "updatedDependency": {
            "dependencyGroupID": "org.example",
            "dependencyArtifactID": "lib",
            "previousVersion": "1.2.0",
            "newVersion": "2.0.0",
            "dependencyScope": "compile"
        },
        "failureCategory": "COMPILATION_FAILURE"
    }"#;

    #[test]
    fn load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0a1b2c.json");
        fs::write(&path, RECORD).unwrap();
        let datapoint = Datapoint::load(&path).unwrap();
        assert_eq!(datapoint.id, "0a1b2c");
        assert_eq!(
            datapoint.docker_image_ref.as_deref(),
            Some("ghcr.io/bench/breaking-updates:0a1b2c-breaking")
        );
        assert_eq!(datapoint.failure_category.as_deref(), Some("COMPILATION_FAILURE"));
        let library = datapoint.library_context();
        assert_eq!(library.name, "org.example");
        assert_eq!(library.base_version, "1.2.0");
        assert_eq!(library.new_version, "2.0.0");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(
            Datapoint::load(&path),
            Err(DatapointLoadError::Parse { .. })
        ));
    }

    #[test]
    fn image_after_docker_run_flags() {
        assert_eq!(
            docker_image("docker run --rm img:tag mvn test").as_deref(),
            Some("img:tag")
        );
        assert_eq!(docker_image("mvn clean test"), None);
        assert_eq!(docker_image("docker pull img"), None);
    }
}
