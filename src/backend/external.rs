//! Encryption delegated to an external asymmetric tool (age or GPG).
//!
//! The payload is handed to the tool through a scratch file: created
//! owner-only in the system temp dir, overwritten with zeros and removed
//! when the `ScratchFile` guard drops, on success and failure alike.
//! The tool's stdout is the result.

use std::ffi::OsStr;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use super::ExternalKind;
use crate::errors::{LockboxError, Result};
use crate::process;

/// A resolved external encryption tool plus the identities it uses.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    kind: ExternalKind,
    program: PathBuf,
    recipient: String,
    identity: Option<PathBuf>,
}

impl ExternalTool {
    /// Locate the tool binary, failing fast with `ToolNotFound`.
    ///
    /// `program` overrides the default binary name (`age` / `gpg`).
    pub fn resolve(
        kind: ExternalKind,
        recipient: &str,
        identity: Option<&Path>,
        program: Option<&Path>,
    ) -> Result<Self> {
        if recipient.trim().is_empty() {
            return Err(LockboxError::ConfigError(format!(
                "the {} backend needs a recipient",
                kind.tool_name()
            )));
        }

        let program = match program {
            Some(p) => process::require_program(&p.to_string_lossy())?,
            None => process::require_program(kind.tool_name())?,
        };
        tracing::debug!(tool = %program.display(), "resolved external encryption tool");

        Ok(Self {
            kind,
            program,
            recipient: recipient.to_string(),
            identity: identity.map(Path::to_path_buf),
        })
    }

    pub fn kind(&self) -> ExternalKind {
        self.kind
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Encrypt `plaintext` to the configured recipient.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let scratch = ScratchFile::with_contents(plaintext)?;
        let input = scratch.path().as_os_str();
        let recipient = OsStr::new(&self.recipient);

        let args: Vec<&OsStr> = match self.kind {
            ExternalKind::Age => vec![
                "--encrypt".as_ref(),
                "--recipient".as_ref(),
                recipient,
                input,
            ],
            ExternalKind::Gpg => vec![
                "--batch".as_ref(),
                "--yes".as_ref(),
                "--quiet".as_ref(),
                "--trust-model".as_ref(),
                "always".as_ref(),
                "--encrypt".as_ref(),
                "--recipient".as_ref(),
                recipient,
                "--output".as_ref(),
                "-".as_ref(),
                input,
            ],
        };

        let output = process::run_checked(&self.program, args, None)?;
        Ok(output.stdout)
    }

    /// Decrypt bytes previously produced by `encrypt`.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let scratch = ScratchFile::with_contents(ciphertext)?;
        let input = scratch.path().as_os_str();

        let args: Vec<&OsStr> = match self.kind {
            ExternalKind::Age => {
                let identity = self.identity.as_deref().ok_or_else(|| {
                    LockboxError::ConfigError(
                        "the age backend needs an identity file to decrypt".into(),
                    )
                })?;
                vec![
                    "--decrypt".as_ref(),
                    "--identity".as_ref(),
                    identity.as_os_str(),
                    input,
                ]
            }
            ExternalKind::Gpg => vec![
                "--batch".as_ref(),
                "--quiet".as_ref(),
                "--decrypt".as_ref(),
                input,
            ],
        };

        let output = process::run_checked(&self.program, args, None)?;
        Ok(Zeroizing::new(output.stdout))
    }
}

/// A short-lived owner-only temp file, wiped and deleted on drop.
struct ScratchFile {
    file: NamedTempFile,
    len: usize,
}

impl ScratchFile {
    fn with_contents(data: &[u8]) -> Result<Self> {
        let tmp_dir = std::env::temp_dir();
        let file = tempfile::Builder::new()
            .prefix("lockbox-")
            .tempfile_in(&tmp_dir)
            .map_err(LockboxError::io(&tmp_dir))?;

        // The guard exists before the write, so a partial write is wiped too.
        let mut scratch = Self {
            file,
            len: data.len(),
        };
        let path = scratch.file.path().to_path_buf();
        scratch
            .file
            .write_all(data)
            .and_then(|()| scratch.file.flush())
            .map_err(LockboxError::io(&path))?;

        Ok(scratch)
    }

    fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // Best-effort wipe; NamedTempFile removes the file afterwards.
        if self.len > 0 {
            let file = self.file.as_file_mut();
            if file.seek(SeekFrom::Start(0)).is_ok() {
                let _ = file.write_all(&vec![0u8; self.len]);
                let _ = file.sync_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_file_is_removed_on_drop() {
        let scratch = ScratchFile::with_contents(b"top secret").unwrap();
        let path = scratch.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"top secret");

        drop(scratch);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn scratch_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = ScratchFile::with_contents(b"x").unwrap();
        let mode = std::fs::metadata(scratch.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_tool_fails_fast() {
        let result = ExternalTool::resolve(
            ExternalKind::Age,
            "age1recipient",
            None,
            Some(Path::new("/nonexistent/bin/age")),
        );
        assert!(matches!(result, Err(LockboxError::ToolNotFound(_))));
    }

    #[test]
    fn empty_recipient_is_config_error() {
        let result = ExternalTool::resolve(ExternalKind::Gpg, "  ", None, None);
        assert!(matches!(result, Err(LockboxError::ConfigError(_))));
    }
}
