//! The remote Docker host, as seen by the orchestrator.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Captured output of one remote command. A non-zero exit status is not an error at this level;
/// the build verdict comes from the output.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// stdout followed by stderr, the form handed to the extractor.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote command timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("remote infrastructure failure: {0}")]
    Infrastructure(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Runs a shell command on the remote host.
pub trait RemoteExec {
    /// Runs `command` and waits at most `timeout`. The command is killed on timeout.
    fn run(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput, RemoteError>;
}

/// Moves source files between a container image and the local machine.
pub trait RemoteFileStore {
    /// Copies each of `remote_paths` out of a container of `image` into `local_dir` (see
    /// [write_local_copy]). Files that cannot be copied are skipped; the local paths written are
    /// returned.
    fn fetch(
        &mut self,
        image: &str,
        remote_paths: &[String],
        local_dir: &Path,
    ) -> Result<Vec<PathBuf>, RemoteError>;

    /// Starts a fresh container of `image`, overwrites `files` (remote path to content) inside
    /// it, reruns the build and returns its output.
    fn deploy(
        &mut self,
        image: &str,
        files: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError>;
}

/// Both halves of the remote host.
pub trait Remote: RemoteExec + RemoteFileStore {}

impl<T: RemoteExec + RemoteFileStore> Remote for T {}

/// The file name a local copy of `remote_path` is stored under.
pub fn local_name(remote_path: &str) -> &str {
    remote_path.rsplit('/').next().unwrap_or(remote_path)
}

/// Writes a local copy of a remote file: its remote path on the first line, then its content.
pub fn write_local_copy(local_dir: &Path, remote_path: &str, content: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(local_dir)?;
    let path = local_dir.join(local_name(remote_path));
    fs::write(&path, format!("{remote_path}\n{content}"))?;
    Ok(path)
}

/// Reads a local copy back into `(remote path, content)`.
pub fn read_local_copy(path: &Path) -> io::Result<(String, String)> {
    let raw = fs::read_to_string(path)?;
    let (remote_path, content) = raw.split_once('\n').unwrap_or((raw.as_str(), ""));
    if remote_path.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} has no remote path header", path.display()),
        ));
    }
    Ok((remote_path.trim().to_string(), content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::tempdir;

    #[test]
    fn local_copy_keeps_remote_path() {
        let dir = tempdir().unwrap();
        let path = write_local_copy(dir.path(), "/app/src/Foo.java", "class Foo {}\n").unwrap();
        assert_eq!(path, dir.path().join("Foo.java"));
        let (remote, content) = read_local_copy(&path).unwrap();
        assert_eq!(remote, "/app/src/Foo.java");
        assert_eq!(content, "class Foo {}\n");
    }

    #[test]
    fn header_only_copy_is_empty_file() {
        let dir = tempdir().unwrap();
        let path = write_local_copy(dir.path(), "/app/Empty.java", "").unwrap();
        assert_eq!(read_local_copy(&path).unwrap().1, "");
    }

    #[test]
    fn combined_output_order() {
        let output = ExecOutput {
            stdout: "out".into(),
            stderr: "err".into(),
        };
        assert_eq!(output.combined(), "out\nerr");
    }
}
