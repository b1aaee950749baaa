//! External backends: each secret is a file encrypted by age or gpg.
//!
//! There is no master password and no plaintext cache; `retrieve` runs
//! the tool every time.  When git sync is configured, each write or
//! delete is committed right away.

use zeroize::Zeroizing;

use super::{StoreBackend, UnlockReport};
use crate::backend::ExternalTool;
use crate::errors::{LockboxError, Result};
use crate::git::GitSync;
use crate::vault::SecretFiles;

pub(super) struct ExternalStore {
    tool: ExternalTool,
    files: SecretFiles,
    git: Option<GitSync>,
}

impl ExternalStore {
    pub(super) fn new(tool: ExternalTool, files: SecretFiles, git: Option<GitSync>) -> Self {
        Self { tool, files, git }
    }

    fn commit(&self, path: &std::path::Path, message: &str) -> Result<()> {
        match &self.git {
            Some(git) => git.commit_file(path, message),
            None => Ok(()),
        }
    }
}

impl StoreBackend for ExternalStore {
    fn exists_on_disk(&self) -> bool {
        self.files.dir_exists()
    }

    fn initialize(&mut self, _password: &[u8]) -> Result<()> {
        self.files.create_dir()
    }

    fn unlock(&mut self, _password: &[u8]) -> Result<UnlockReport> {
        if !self.files.dir_exists() {
            return Err(LockboxError::NotInitialized(self.files.dir().to_path_buf()));
        }
        Ok(UnlockReport {
            unlocked: self.files.list()?.len(),
            skipped: Vec::new(),
        })
    }

    fn lock(&mut self) {}

    fn store(&mut self, name: &str, value: &[u8]) -> Result<()> {
        let ciphertext = self.tool.encrypt(value)?;
        let path = self.files.write(name, &ciphertext)?;
        self.commit(&path, &format!("lockbox: update {name}"))
    }

    fn retrieve(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        let ciphertext = self.files.read(name)?;
        self.tool.decrypt(&ciphertext)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let path = self.files.remove(name)?;
        self.commit(&path, &format!("lockbox: remove {name}"))
    }

    fn list(&self) -> Result<Vec<String>> {
        self.files.list()
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.files.exists(name))
    }

    fn change_password(&mut self, _old: &[u8], _new: &[u8]) -> Result<()> {
        Err(LockboxError::Unsupported(format!(
            "the {} backend has no master password; re-encrypt to a new recipient instead",
            self.tool.kind().tool_name()
        )))
    }

    fn git(&self) -> Option<&GitSync> {
        self.git.as_ref()
    }
}
