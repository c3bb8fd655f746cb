//! `RemoteDocker`: the remote build host, reached over `ssh` and driven with the `docker` CLI.
//!
//! Every container started here gets a `bumpfix-<pid>-<n>` name and is removed with
//! `docker rm -f` once the call returns, including when the call times out.

mod docker;
mod ssh;

use bumpfix_core::config::unknown_field_warning;
use bumpfix_core::remote::{ExecOutput, RemoteError, RemoteExec, RemoteFileStore, write_local_copy};
use serde::Deserialize;
use serde_json::Value;
use ssh::SshSession;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Deadline for the short housekeeping commands (start, copy, remove).
const HOUSEKEEPING_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration read from `[tools.remote_docker]`.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub hostname: String,
    pub username: String,

    /// Private key passed to `ssh -i`. Without it the ssh agent is used.
    pub key_path: Option<PathBuf>,

    #[serde(default = "Config::default_port")]
    pub port: u16,

    #[serde(default = "Config::default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Build command run inside the redeployed container.
    #[serde(default = "Config::default_rebuild_command")]
    pub rebuild_command: String,

    #[serde(flatten)]
    unknown: HashMap<String, Value>,
}

impl Config {
    fn default_port() -> u16 {
        22
    }

    fn default_connect_timeout_secs() -> u64 {
        30
    }

    fn default_rebuild_command() -> String {
        "mvn clean test".to_string()
    }

    pub fn validate(&self) {
        unknown_field_warning("tools.remote_docker", &self.unknown);
    }
}

/// The remote host. Implements both [RemoteExec] and [RemoteFileStore].
pub struct RemoteDocker {
    session: SshSession,
    rebuild_command: String,
    containers_started: usize,
}

impl RemoteDocker {
    pub fn new(config: &Config) -> Result<RemoteDocker, String> {
        config.validate();
        if config.hostname.is_empty() || config.username.is_empty() {
            return Err("tools.remote_docker.hostname and username must be set".into());
        }
        info!(
            "Using remote docker host {}@{}:{}",
            config.username, config.hostname, config.port
        );
        Ok(RemoteDocker {
            session: SshSession::new(config),
            rebuild_command: config.rebuild_command.clone(),
            containers_started: 0,
        })
    }

    fn next_container_name(&mut self) -> String {
        let name = format!("bumpfix-{}-{}", std::process::id(), self.containers_started);
        self.containers_started += 1;
        name
    }

    fn housekeeping(&self, command: &str, stdin: Option<&str>) -> Result<ExecOutput, RemoteError> {
        self.session.run(command, stdin, HOUSEKEEPING_TIMEOUT)
    }

    fn remove_container(&self, name: &str) {
        if let Err(e) = self.housekeeping(&docker::remove(name), None) {
            warn!("Failed to remove container {name}: {e}");
        }
    }

    /// Starts an idle container of `image`, runs `body` against it and removes it afterwards.
    fn with_idle_container<T>(
        &mut self,
        image: &str,
        body: impl FnOnce(&Self, &str) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let name = self.next_container_name();
        let start = docker::start_idle(&name, image).map_err(RemoteError::Infrastructure)?;
        // `docker run -d` prints the container id on success; pull progress goes to stderr.
        let result = match self.housekeeping(&start, None) {
            Ok(output) if !output.stdout.trim().is_empty() => body(self, &name),
            Ok(output) => Err(RemoteError::Infrastructure(format!(
                "failed to start a container of {image}: {}",
                output.stderr.trim()
            ))),
            Err(e) => Err(e),
        };
        self.remove_container(&name);
        result
    }
}

impl RemoteExec for RemoteDocker {
    fn run(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput, RemoteError> {
        let name = self.next_container_name();
        let Some(named) = docker::with_container_name(command, &name) else {
            return self.session.run(command, None, timeout);
        };
        let result = self.session.run(&named, None, timeout);
        if let Err(RemoteError::Timeout(_)) = result {
            warn!("Build in container {name} timed out; removing it");
        }
        self.remove_container(&name);
        result
    }
}

impl RemoteFileStore for RemoteDocker {
    fn fetch(
        &mut self,
        image: &str,
        remote_paths: &[String],
        local_dir: &Path,
    ) -> Result<Vec<PathBuf>, RemoteError> {
        self.with_idle_container(image, |this, name| {
            let mut written = vec![];
            for remote_path in remote_paths {
                let command =
                    docker::read_file(name, remote_path).map_err(RemoteError::Infrastructure)?;
                match this.housekeeping(&command, None) {
                    Ok(output) if output.stderr.trim().is_empty() => {
                        written.push(write_local_copy(local_dir, remote_path, &output.stdout)?);
                        debug!("Fetched {remote_path}");
                    }
                    Ok(output) => warn!("Failed to fetch {remote_path}: {}", output.stderr.trim()),
                    Err(e) => warn!("Failed to fetch {remote_path}: {e}"),
                }
            }
            Ok(written)
        })
    }

    fn deploy(
        &mut self,
        image: &str,
        files: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError> {
        let rebuild = self.rebuild_command.clone();
        self.with_idle_container(image, |this, name| {
            for (remote_path, content) in files {
                let command =
                    docker::write_file(name, remote_path).map_err(RemoteError::Infrastructure)?;
                match this.housekeeping(&command, Some(content.as_str())) {
                    Ok(output) if output.stderr.trim().is_empty() => {
                        debug!("Deployed {remote_path}")
                    }
                    Ok(output) => warn!("Failed to deploy {remote_path}: {}", output.stderr.trim()),
                    Err(e) => warn!("Failed to deploy {remote_path}: {e}"),
                }
            }
            let command = docker::exec(name, &rebuild).map_err(RemoteError::Infrastructure)?;
            this.session.run(&command, None, timeout)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "hostname": "build.example.org",
            "username": "bench",
        }))
        .unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.rebuild_command, "mvn clean test");
        assert!(config.key_path.is_none());
        assert!(config.unknown.is_empty());
    }

    #[test]
    fn unknown_keys_are_collected() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "hostname": "h",
            "username": "u",
            "passphrase": "secret",
        }))
        .unwrap();
        assert!(config.unknown.contains_key("passphrase"));
    }

    #[test]
    fn host_must_be_configured() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "hostname": "",
            "username": "u",
        }))
        .unwrap();
        assert!(RemoteDocker::new(&config).is_err());
    }

    #[test]
    fn container_names_are_unique() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "hostname": "h",
            "username": "u",
        }))
        .unwrap();
        let mut remote = RemoteDocker::new(&config).unwrap();
        let first = remote.next_container_name();
        let second = remote.next_container_name();
        assert_ne!(first, second);
        assert!(first.starts_with("bumpfix-"));
    }
}
