//! Locating and running the external programs (age, gpg, git).
//!
//! Every call is synchronous and captures stdout/stderr; nothing is
//! inherited from the parent's terminal.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::errors::{LockboxError, Result};

/// Resolve `program` to an executable path.
///
/// A value containing a path separator is taken as a path; a bare name
/// is looked up in each directory of `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Like `find_program`, but a miss is a `ToolNotFound` error.
pub fn require_program(program: &str) -> Result<PathBuf> {
    find_program(program).ok_or_else(|| LockboxError::ToolNotFound(program.to_string()))
}

/// Run `program` and return its raw output, whatever the exit status.
pub fn run_capture<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    command.output().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LockboxError::ToolNotFound(display_name(program)),
        _ => LockboxError::io(program)(e),
    })
}

/// Run `program`; a non-zero exit becomes `ExternalToolFailed`.
pub fn run_checked<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_capture(program, args, cwd)?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(failure(program, &output))
    }
}

/// Build the error for a failed invocation, attaching the tool's output.
///
/// Only stderr is attached; for the encryption tools stdout is the
/// payload and must not end up in an error message.
pub fn failure(program: &Path, output: &Output) -> LockboxError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    LockboxError::ExternalToolFailed {
        tool: display_name(program),
        status: output.status.code().unwrap_or(-1),
        output: stderr,
    }
}

/// File name of the program, for messages.
pub fn display_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}
