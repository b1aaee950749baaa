//! One-file-per-secret layout used by the external backends.
//!
//! Each secret lives at `<dir>/<name>.<ext>` and holds the raw bytes the
//! external tool produced.  There is no index: the directory listing is
//! the list of secrets.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::atomic::{ensure_private_dir, write_atomic};
use crate::errors::{LockboxError, Result};

/// A directory of ciphertext files sharing one extension.
#[derive(Debug, Clone)]
pub struct SecretFiles {
    dir: PathBuf,
    extension: &'static str,
}

impl SecretFiles {
    pub fn new(dir: impl Into<PathBuf>, extension: &'static str) -> Self {
        Self {
            dir: dir.into(),
            extension,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        self.extension
    }

    /// Path of the file holding `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{}", self.extension))
    }

    /// Create the store directory (owner-only) if it is missing.
    pub fn create_dir(&self) -> Result<()> {
        ensure_private_dir(&self.dir)
    }

    pub fn dir_exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Replace the ciphertext for `name`.  Returns the file's path.
    pub fn write(&self, name: &str, ciphertext: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(name);
        write_atomic(&path, ciphertext)?;
        Ok(path)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name);
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LockboxError::NotFound(name.to_string()),
            _ => LockboxError::io(&path)(e),
        })
    }

    /// Remove the file for `name`.  Returns the removed path.
    pub fn remove(&self, name: &str) -> Result<PathBuf> {
        let path = self.path_for(name);
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LockboxError::NotFound(name.to_string()),
            _ => LockboxError::io(&path)(e),
        })?;
        Ok(path)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Names of all secrets in the directory, sorted.
    ///
    /// Hidden files (temp files from interrupted writes) and files with
    /// another extension are ignored.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LockboxError::io(&self.dir)(e)),
        };

        let suffix = format!(".{}", self.extension);
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(LockboxError::io(&self.dir))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(&suffix) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn list_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        let files = SecretFiles::new(dir.path(), "age");

        files.write("beta", b"b").unwrap();
        files.write("alpha", b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join(".gamma.age.tmp"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub.age")).unwrap();

        assert_eq!(files.list().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn read_and_remove_missing_are_not_found() {
        let dir = TempDir::new().unwrap();
        let files = SecretFiles::new(dir.path(), "gpg");

        assert!(matches!(files.read("nope"), Err(LockboxError::NotFound(_))));
        assert!(matches!(files.remove("nope"), Err(LockboxError::NotFound(_))));
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = SecretFiles::new(dir.path().join("missing"), "age");
        assert!(files.list().unwrap().is_empty());
    }

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let files = SecretFiles::new(dir.path(), "age");

        let path = files.write("token", &[0xff, 0x00]).unwrap();
        assert_eq!(path, dir.path().join("token.age"));
        assert!(files.exists("token"));
        assert_eq!(files.read("token").unwrap(), vec![0xff, 0x00]);

        files.remove("token").unwrap();
        assert!(!files.exists("token"));
    }
}
