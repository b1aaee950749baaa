//! Git synchronization of ciphertext files.
//!
//! Only used with the external backends, whose secrets are individual
//! encrypted files.  Nothing here ever sees a plaintext: it stages and
//! commits files that are already on disk, and pulls/pushes the repo.
//!
//! The program is `git` by default; a git-compatible dotfiles manager
//! (e.g. `yadm`) can be named instead.  Commands run with the repository
//! as working directory.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::errors::{LockboxError, Result};
use crate::process;

/// Default version-control program.
pub const DEFAULT_PROGRAM: &str = "git";

/// Where and how to sync.
#[derive(Debug, Clone)]
pub struct GitConfig {
    /// Working tree that contains the store directory.
    pub repo: PathBuf,
    /// `git`, `yadm`, or a path to either.
    pub program: String,
}

impl GitConfig {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

/// A resolved git-compatible tool bound to one repository.
#[derive(Debug, Clone)]
pub struct GitSync {
    program: PathBuf,
    repo: PathBuf,
}

impl GitSync {
    /// Locate the program, failing fast with `ToolNotFound`.
    pub fn new(config: &GitConfig) -> Result<Self> {
        let program = process::require_program(&config.program)?;
        Ok(Self {
            program,
            repo: config.repo.clone(),
        })
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Stage and commit one file (also works for a deleted file).
    ///
    /// "Nothing to commit" is not an error: writing identical ciphertext
    /// or re-deleting leaves the tree unchanged.
    pub fn commit_file(&self, path: &Path, message: &str) -> Result<()> {
        let rel = repo_relative(&self.repo, path)?;
        let rel = rel.as_path();

        let add: [&OsStr; 4] = ["add".as_ref(), "--all".as_ref(), "--".as_ref(), rel.as_os_str()];
        process::run_checked(&self.program, add, Some(&self.repo))?;

        let commit: [&OsStr; 6] = [
            "commit".as_ref(),
            "--quiet".as_ref(),
            "-m".as_ref(),
            message.as_ref(),
            "--".as_ref(),
            rel.as_os_str(),
        ];
        let output = process::run_capture(&self.program, commit, Some(&self.repo))?;

        if output.status.success() {
            tracing::debug!(file = %rel.display(), "committed secret file");
            return Ok(());
        }
        if is_nothing_to_commit(&output) {
            tracing::debug!(file = %rel.display(), "nothing to commit");
            return Ok(());
        }
        Err(process::failure(&self.program, &output))
    }

    /// Pull remote changes, rebasing local commits on top.
    pub fn pull(&self) -> Result<()> {
        process::run_checked(
            &self.program,
            ["pull", "--rebase", "--quiet"],
            Some(&self.repo),
        )?;
        tracing::debug!(repo = %self.repo.display(), "pulled");
        Ok(())
    }

    /// Push local commits.
    pub fn push(&self) -> Result<()> {
        process::run_checked(&self.program, ["push", "--quiet"], Some(&self.repo))?;
        tracing::debug!(repo = %self.repo.display(), "pushed");
        Ok(())
    }
}

/// `path` relative to `repo`, after resolving symlinks and `..` in both.
///
/// The file itself may already be gone (a delete), so only its parent
/// directory is resolved.
fn repo_relative(repo: &Path, path: &Path) -> Result<PathBuf> {
    let repo = repo.canonicalize().map_err(LockboxError::io(repo))?;
    let (parent, file_name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(file_name)) => (parent, file_name),
        _ => {
            return Err(LockboxError::ConfigError(format!(
                "{} is not a file path",
                path.display()
            )))
        }
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let parent = parent.canonicalize().map_err(LockboxError::io(parent))?;

    parent
        .strip_prefix(&repo)
        .map(|rel| rel.join(file_name))
        .map_err(|_| {
            LockboxError::ConfigError(format!(
                "{} is outside the git repository {}",
                path.display(),
                repo.display()
            ))
        })
}

fn is_nothing_to_commit(output: &std::process::Output) -> bool {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    [stdout, stderr].iter().any(|s| {
        s.contains("nothing to commit")
            || s.contains("nothing added to commit")
            || s.contains("no changes added to commit")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_tool_not_found() {
        let config = GitConfig {
            repo: PathBuf::from("."),
            program: "lockbox-no-such-git".into(),
        };
        assert!(matches!(
            GitSync::new(&config),
            Err(LockboxError::ToolNotFound(_))
        ));
    }

    #[test]
    fn paths_are_made_relative_to_the_resolved_repo() {
        let tmp = tempfile::TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(repo.join("secrets")).unwrap();
        std::fs::write(repo.join("secrets/token.age"), b"x").unwrap();

        let roundabout = repo.join("secrets").join("..");
        let rel = repo_relative(&roundabout, &repo.join("secrets/token.age")).unwrap();
        assert_eq!(rel, PathBuf::from("secrets/token.age"));
    }

    #[test]
    fn deleted_files_still_resolve() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("secrets")).unwrap();

        let rel = repo_relative(tmp.path(), &tmp.path().join("secrets/gone.age")).unwrap();
        assert_eq!(rel, PathBuf::from("secrets/gone.age"));
    }

    #[test]
    fn files_outside_the_repo_are_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let elsewhere = tmp.path().join("elsewhere");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::create_dir_all(&elsewhere).unwrap();

        assert!(matches!(
            repo_relative(&repo, &elsewhere.join("token.age")),
            Err(LockboxError::ConfigError(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn nothing_to_commit_is_detected() {
        use std::os::unix::process::ExitStatusExt;

        let output = std::process::Output {
            status: std::process::ExitStatus::from_raw(1 << 8),
            stdout: b"On branch main\nnothing to commit, working tree clean\n".to_vec(),
            stderr: Vec::new(),
        };
        assert!(is_nothing_to_commit(&output));

        let output = std::process::Output {
            status: std::process::ExitStatus::from_raw(128 << 8),
            stdout: Vec::new(),
            stderr: b"fatal: not a git repository".to_vec(),
        };
        assert!(!is_nothing_to_commit(&output));
    }
}
