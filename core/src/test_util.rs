//! Place to put utilities that are only used by tests.

use crate::diagnostic::Diagnostic;
use crate::remote::{ExecOutput, RemoteError, RemoteExec, RemoteFileStore, write_local_copy};
use crate::repair::{LibraryContext, RepairError, Repairer};
use crate::report::{DatapointReport, ReportSink};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a new temporary directory. Unlike the defaults in the `tempdir` and `tempfile` crates,
/// this directory is not world-accessible by default.
#[cfg(not(miri))]
pub fn tempdir() -> std::io::Result<tempfile::TempDir> {
    use std::fs::Permissions;
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o700));
    }
    builder.tempdir()
}

/// Output of a build that printed `stdout` and nothing on stderr.
pub fn output(stdout: &str) -> ExecOutput {
    ExecOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

type RunFn = Box<dyn FnMut(&str, Duration) -> Result<ExecOutput, RemoteError>>;
type DeployFn = Box<dyn FnMut(&BTreeMap<String, String>) -> Result<ExecOutput, RemoteError>>;

/// A remote host that can be programmed to behave in different ways, for testing code that
/// drives `RemoteExec` and `RemoteFileStore`.
///
/// # Example
/// ```
/// use bumpfix_core::test_util::{MockRemote, output};
/// let remote = MockRemote::new()
///     .run(|_, _| Ok(output("[INFO] BUILD SUCCESS")))
///     .file("/app/src/Foo.java", "class Foo {}");
/// ```
pub struct MockRemote {
    run: RunFn,
    deploy: DeployFn,
    files: HashMap<String, String>,
    /// Every command passed to `run`, in order.
    pub commands: Vec<String>,
    /// The file sets passed to `deploy`, in order.
    pub deployed: Vec<BTreeMap<String, String>>,
    /// How many times `fetch` was called.
    pub fetches: usize,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(miri, allow(unused))]
impl MockRemote {
    /// A remote whose builds all succeed and which holds no files.
    pub fn new() -> MockRemote {
        MockRemote {
            run: Box::new(|_, _| Ok(output("[INFO] BUILD SUCCESS"))),
            deploy: Box::new(|_| Ok(output("[INFO] BUILD SUCCESS"))),
            files: HashMap::new(),
            commands: vec![],
            deployed: vec![],
            fetches: 0,
        }
    }

    /// Sets a closure to be run when `RemoteExec::run` is called.
    pub fn run<F>(mut self, f: F) -> MockRemote
    where
        F: FnMut(&str, Duration) -> Result<ExecOutput, RemoteError> + 'static,
    {
        self.run = Box::new(f);
        self
    }

    /// Sets a closure to be run when `RemoteFileStore::deploy` is called.
    pub fn deploy<F>(mut self, f: F) -> MockRemote
    where
        F: FnMut(&BTreeMap<String, String>) -> Result<ExecOutput, RemoteError> + 'static,
    {
        self.deploy = Box::new(f);
        self
    }

    /// Adds a file that `fetch` can copy out.
    pub fn file(mut self, remote_path: &str, content: &str) -> MockRemote {
        self.files.insert(remote_path.into(), content.into());
        self
    }
}

impl RemoteExec for MockRemote {
    fn run(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput, RemoteError> {
        self.commands.push(command.to_string());
        (self.run)(command, timeout)
    }
}

impl RemoteFileStore for MockRemote {
    fn fetch(
        &mut self,
        _image: &str,
        remote_paths: &[String],
        local_dir: &Path,
    ) -> Result<Vec<PathBuf>, RemoteError> {
        self.fetches += 1;
        let mut written = vec![];
        for path in remote_paths {
            if let Some(content) = self.files.get(path) {
                written.push(write_local_copy(local_dir, path, content)?);
            }
        }
        Ok(written)
    }

    fn deploy(
        &mut self,
        _image: &str,
        files: &BTreeMap<String, String>,
        _timeout: Duration,
    ) -> Result<ExecOutput, RemoteError> {
        self.deployed.push(files.clone());
        (self.deploy)(files)
    }
}

type RepairFn = Box<dyn FnMut(&str, &str, &[Diagnostic]) -> Result<Option<String>, RepairError>>;

/// A repairer driven by a closure of `(file content, file name, diagnostics)`.
pub struct MockRepairer {
    repair: RepairFn,
    /// File names passed to `repair`, in order.
    pub calls: Vec<String>,
}

impl Default for MockRepairer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRepairer {
    /// A repairer that appends a marker comment to every file.
    pub fn new() -> MockRepairer {
        MockRepairer {
            repair: Box::new(|content, _, _| Ok(Some(format!("{content}\n// repaired")))),
            calls: vec![],
        }
    }

    pub fn repair<F>(mut self, f: F) -> MockRepairer
    where
        F: FnMut(&str, &str, &[Diagnostic]) -> Result<Option<String>, RepairError> + 'static,
    {
        self.repair = Box::new(f);
        self
    }
}

impl Repairer for MockRepairer {
    fn repair(
        &mut self,
        file_content: &str,
        file_name: &str,
        diagnostics: &[Diagnostic],
        _library: &LibraryContext,
    ) -> Result<Option<String>, RepairError> {
        self.calls.push(file_name.to_string());
        (self.repair)(file_content, file_name, diagnostics)
    }
}

/// A report sink that keeps every report in memory.
#[derive(Default)]
pub struct MemorySink {
    pub reports: Vec<DatapointReport>,
}

impl ReportSink for MemorySink {
    fn record(&mut self, report: &DatapointReport) -> Result<(), Box<dyn Error>> {
        self.reports.push(report.clone());
        Ok(())
    }
}
