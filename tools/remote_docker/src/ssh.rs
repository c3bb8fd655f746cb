//! Running commands on the remote host through the system `ssh` client.

use bumpfix_core::remote::{ExecOutput, RemoteError};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};
use wait_timeout::ChildExt;

/// ssh reserves this exit status for its own (connection) errors.
const SSH_FAILURE_STATUS: i32 = 255;

/// A command prefix that executes its last argument on the remote host.
pub struct SshSession {
    program: String,
    args: Vec<String>,
}

impl SshSession {
    pub fn new(config: &crate::Config) -> SshSession {
        let mut args = vec![
            "-p".to_string(),
            config.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", config.connect_timeout_secs),
        ];
        if let Some(ref key) = config.key_path {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(format!("{}@{}", config.username, config.hostname));
        SshSession {
            program: "ssh".to_string(),
            args,
        }
    }

    /// Runs commands with the local `sh` instead of a remote host.
    #[cfg(test)]
    pub fn local_shell() -> SshSession {
        SshSession {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }

    /// Runs `remote_command`, feeding it `stdin` if given. The local client is killed when
    /// `timeout` elapses.
    pub fn run(
        &self,
        remote_command: &str,
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<ExecOutput, RemoteError> {
        debug!("remote: {remote_command}");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(remote_command)
            .stdin(match stdin {
                Some(_) => Stdio::piped(),
                None => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RemoteError::Infrastructure(format!("failed to spawn ssh: {e}")))?;

        // Pipes are drained on their own threads so a chatty build cannot fill them and stall.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_string();
                Some(thread::spawn(move || pipe.write_all(input.as_bytes())))
            }
            _ => None,
        };
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RemoteError::Timeout(timeout));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        if let Some(writer) = writer {
            join(writer)?.map_err(|e| {
                RemoteError::Infrastructure(format!("failed to send input to remote: {e}"))
            })?;
        }
        let output = ExecOutput {
            stdout: String::from_utf8_lossy(&join(stdout)?).into_owned(),
            stderr: String::from_utf8_lossy(&join(stderr)?).into_owned(),
        };
        trace!(status = ?status.code(), "remote command finished");
        if status.code() == Some(SSH_FAILURE_STATUS) {
            return Err(RemoteError::Infrastructure(format!(
                "ssh exited with status {SSH_FAILURE_STATUS}: {}",
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = vec![];
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

fn join<T>(handle: JoinHandle<T>) -> Result<T, RemoteError> {
    handle
        .join()
        .map_err(|_| RemoteError::Infrastructure("pipe thread panicked".to_string()))
}
