//! Construction of the docker command lines sent to the remote host.
//!
//! Everything here returns a single shell command string; quoting follows POSIX `sh` rules.

use std::borrow::Cow;

const IDLE_LOOP: &str = "while true; do sleep 1000; done";

/// Quotes `word` for the remote shell.
pub fn quote(word: &str) -> Result<Cow<'_, str>, String> {
    shlex::try_quote(word).map_err(|e| format!("cannot quote {word:?}: {e}"))
}

/// Inserts `--name <name>` right after `docker run`, so the container can be removed later.
/// Returns `None` if `command` does not contain `docker run`.
pub fn with_container_name(command: &str, name: &str) -> Option<String> {
    let at = command.find("docker run")? + "docker run".len();
    Some(format!("{} --name {name}{}", &command[..at], &command[at..]))
}

/// Starts a detached container of `image` that idles until removed.
pub fn start_idle(name: &str, image: &str) -> Result<String, String> {
    Ok(format!(
        "docker run -d --name {name} --entrypoint /bin/sh {} -c {}",
        quote(image)?,
        quote(IDLE_LOOP)?
    ))
}

/// Prints a file from inside a running container.
pub fn read_file(name: &str, path: &str) -> Result<String, String> {
    Ok(format!("docker exec {name} cat {}", quote(path)?))
}

/// Replaces a file inside a running container with the command's stdin.
pub fn write_file(name: &str, path: &str) -> Result<String, String> {
    let inner = format!("cat > {}", quote(path)?);
    Ok(format!("docker exec -i {name} /bin/sh -c {}", quote(&inner)?))
}

/// Runs `command` inside a running container.
pub fn exec(name: &str, command: &str) -> Result<String, String> {
    Ok(format!("docker exec {name} /bin/sh -c {}", quote(command)?))
}

pub fn remove(name: &str) -> String {
    format!("docker rm -f {name}")
}
