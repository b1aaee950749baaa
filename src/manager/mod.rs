//! The store manager: a locked/unlocked state machine over one backend.
//!
//! `SecretsManager` is the handle the rest of an application holds.  It is
//! `Send + Sync`; share it behind an `Arc` when several threads need it.
//!
//! ```text
//! Uninitialized --initialize--> Unlocked <--unlock / lock--> Locked
//! ```
//!
//! Every operation other than `initialize`/`unlock`/`lock` fails with
//! `Locked` unless the store is unlocked.  Reads (`retrieve`, `list`,
//! `exists`) share a read lock; everything else takes the write lock for
//! its whole duration, including the disk write and any external tool
//! invocation.

mod builtin;
mod external;

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::backend::{BackendConfig, BackendKind, ExternalTool};
use crate::crypto::Argon2Params;
use crate::errors::{LockboxError, Result};
use crate::git::{GitConfig, GitSync};
use crate::vault::SecretFiles;

use builtin::BuiltinStore;
use external::ExternalStore;

/// Maximum length of a secret name, in bytes.
const MAX_NAME_LEN: usize = 256;

/// Everything needed to open a store, already parsed.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store document (built-in) or store directory (external backends).
    pub path: PathBuf,
    pub backend: BackendConfig,
    /// Commit/pull/push the secret files; external backends only.
    pub git: Option<GitConfig>,
}

impl StoreConfig {
    /// A built-in store at `path` using the given Argon2 parameters.
    pub fn builtin(path: impl Into<PathBuf>, argon2: Argon2Params) -> Self {
        Self {
            path: path.into(),
            backend: BackendConfig::Builtin { argon2 },
            git: None,
        }
    }
}

/// Where the manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Locked,
    Unlocked,
}

/// Outcome of a successful unlock.
///
/// Entries whose ciphertext no longer decrypts are skipped rather than
/// failing the unlock; their names are listed in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    /// Number of secrets available after unlocking.
    pub unlocked: usize,
    /// Secrets that could not be decrypted.
    pub skipped: Vec<String>,
}

impl UnlockReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// The operations each backend implements.
///
/// The manager owns the state machine; a backend only needs to do the
/// work once the manager has decided an operation is allowed.
trait StoreBackend {
    /// Whether something is already persisted at the store path.
    fn exists_on_disk(&self) -> bool;
    fn initialize(&mut self, password: &[u8]) -> Result<()>;
    fn unlock(&mut self, password: &[u8]) -> Result<UnlockReport>;
    /// Drop all key material and plaintext.
    fn lock(&mut self);
    fn store(&mut self, name: &str, value: &[u8]) -> Result<()>;
    fn retrieve(&self, name: &str) -> Result<Zeroizing<Vec<u8>>>;
    fn delete(&mut self, name: &str) -> Result<()>;
    fn list(&self) -> Result<Vec<String>>;
    fn exists(&self, name: &str) -> Result<bool>;
    fn change_password(&mut self, old: &[u8], new: &[u8]) -> Result<()>;
    fn git(&self) -> Option<&GitSync>;
}

/// The backend selected at construction.
enum Backend {
    Builtin(BuiltinStore),
    External(ExternalStore),
}

impl Backend {
    fn get(&self) -> &dyn StoreBackend {
        match self {
            Self::Builtin(b) => b,
            Self::External(e) => e,
        }
    }

    fn get_mut(&mut self) -> &mut dyn StoreBackend {
        match self {
            Self::Builtin(b) => b,
            Self::External(e) => e,
        }
    }
}

struct Inner {
    state: ManagerState,
    backend: Backend,
}

impl Inner {
    fn ensure_unlocked(&self) -> Result<()> {
        match self.state {
            ManagerState::Unlocked => Ok(()),
            ManagerState::Locked | ManagerState::Uninitialized => Err(LockboxError::Locked),
        }
    }
}

/// A password-gated secrets store.
pub struct SecretsManager {
    path: PathBuf,
    kind: BackendKind,
    inner: RwLock<Inner>,
}

impl SecretsManager {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build a manager for the store described by `config`.
    ///
    /// External tools (age/gpg, and git when sync is configured) are
    /// located here, so a missing tool is reported as `ToolNotFound`
    /// before any state transition.  The manager starts `Locked` when a
    /// store already exists at the path and `Uninitialized` otherwise.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let kind = config.backend.kind();
        let backend = match config.backend {
            BackendConfig::Builtin { argon2 } => {
                if config.git.is_some() {
                    return Err(LockboxError::Unsupported(
                        "git sync is only available with the age or gpg backends".into(),
                    ));
                }
                Backend::Builtin(BuiltinStore::new(config.path.clone(), argon2))
            }
            BackendConfig::External {
                kind: external_kind,
                recipient,
                identity,
                program,
            } => {
                let tool = ExternalTool::resolve(
                    external_kind,
                    &recipient,
                    identity.as_deref(),
                    program.as_deref(),
                )?;
                let files = SecretFiles::new(config.path.clone(), external_kind.file_extension());
                let git = config.git.as_ref().map(GitSync::new).transpose()?;
                Backend::External(ExternalStore::new(tool, files, git))
            }
        };

        let state = if backend.get().exists_on_disk() {
            ManagerState::Locked
        } else {
            ManagerState::Uninitialized
        };
        tracing::debug!(path = %config.path.display(), backend = %kind, ?state, "opened store");

        Ok(Self {
            path: config.path,
            kind,
            inner: RwLock::new(Inner { state, backend }),
        })
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Create a new, empty store and leave it unlocked.
    ///
    /// Refuses to touch an existing store: `AlreadyInitialized`.
    pub fn initialize(&self, password: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.backend.get().exists_on_disk() {
            return Err(LockboxError::AlreadyInitialized(self.path.clone()));
        }

        inner.backend.get_mut().initialize(password.as_bytes())?;
        inner.state = ManagerState::Unlocked;
        tracing::info!(path = %self.path.display(), backend = %self.kind, "store initialized");
        Ok(())
    }

    /// Unlock the store with its master password.
    ///
    /// On `InvalidPassword` the candidate key is discarded and the state
    /// is left as it was.
    pub fn unlock(&self, password: &str) -> Result<UnlockReport> {
        let mut inner = self.inner.write();
        let report = inner.backend.get_mut().unlock(password.as_bytes())?;
        inner.state = ManagerState::Unlocked;

        if !report.is_clean() {
            tracing::warn!(
                skipped = report.skipped.len(),
                "unlocked with secrets that could not be decrypted"
            );
        }
        tracing::debug!(path = %self.path.display(), secrets = report.unlocked, "store unlocked");
        Ok(report)
    }

    /// Drop the key and every cached plaintext.  Safe to call repeatedly.
    pub fn lock(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.backend.get_mut().lock();
        if inner.state == ManagerState::Unlocked {
            inner.state = ManagerState::Locked;
            tracing::debug!(path = %self.path.display(), "store locked");
        }
        Ok(())
    }

    /// Re-key the store under a new password.
    ///
    /// Verifies `old` against the stored tag (working from any state but
    /// `Uninitialized`), then derives a fresh salt and key and re-encrypts
    /// every secret before writing.  Leaves the store unlocked.
    pub fn change_password(&self, old: &str, new: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .backend
            .get_mut()
            .change_password(old.as_bytes(), new.as_bytes())?;
        inner.state = ManagerState::Unlocked;
        tracing::info!(path = %self.path.display(), "master password changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Encrypt and persist `value` under `name`, replacing any previous value.
    pub fn store(&self, name: &str, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_unlocked()?;
        validate_name(name, self.kind)?;

        inner.backend.get_mut().store(name, value)?;
        tracing::debug!(secret = name, "stored secret");
        Ok(())
    }

    /// Return a fresh copy of the plaintext stored under `name`.
    ///
    /// The copy is wiped when the returned value is dropped.
    pub fn retrieve(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        let inner = self.inner.read();
        inner.ensure_unlocked()?;
        validate_name(name, self.kind)?;

        inner.backend.get().retrieve(name)
    }

    /// Remove `name` from the store.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_unlocked()?;
        validate_name(name, self.kind)?;

        inner.backend.get_mut().delete(name)?;
        tracing::debug!(secret = name, "deleted secret");
        Ok(())
    }

    /// Names of all secrets, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let inner = self.inner.read();
        inner.ensure_unlocked()?;
        inner.backend.get().list()
    }

    /// Whether `name` is present.  A locked store reports `Locked`, not
    /// "absent".
    pub fn exists(&self, name: &str) -> Result<bool> {
        let inner = self.inner.read();
        inner.ensure_unlocked()?;
        validate_name(name, self.kind)?;
        inner.backend.get().exists(name)
    }

    // ------------------------------------------------------------------
    // Git synchronization
    // ------------------------------------------------------------------

    /// Pull remote changes (rebase).  No-op without git sync.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.write();
        match inner.backend.get().git() {
            Some(git) => git.pull(),
            None => Ok(()),
        }
    }

    /// Push local commits.  No-op without git sync.
    pub fn push(&self) -> Result<()> {
        let inner = self.inner.write();
        match inner.backend.get().git() {
            Some(git) => git.push(),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> ManagerState {
        self.inner.read().state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == ManagerState::Unlocked
    }

    pub fn backend(&self) -> BackendKind {
        self.kind
    }

    /// Store document (built-in) or directory (external backends).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Validate a secret name for the given backend.
///
/// Every backend: non-empty, at most 256 bytes, no control characters.
/// The built-in store keeps names only as JSON keys, so anything else goes.
/// The age/gpg backends turn names into file names and additionally allow
/// only ASCII letters, digits, underscores, hyphens and periods, with no
/// leading period.
pub fn validate_name(name: &str, backend: BackendKind) -> Result<()> {
    if name.is_empty() {
        return Err(LockboxError::InvalidName(
            "secret name cannot be empty".into(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(LockboxError::InvalidName(format!(
            "secret name cannot exceed {MAX_NAME_LEN} bytes"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(LockboxError::InvalidName(format!(
            "secret name {name:?} contains control characters"
        )));
    }

    match backend {
        BackendKind::Builtin => Ok(()),
        BackendKind::Age | BackendKind::Gpg => validate_file_name(name),
    }
}

fn validate_file_name(name: &str) -> Result<()> {
    if name.starts_with('.') {
        return Err(LockboxError::InvalidName(format!(
            "secret name '{name}' cannot start with a period"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(LockboxError::InvalidName(format!(
            "secret name '{name}' contains invalid characters; only ASCII letters, digits, underscores, hyphens, and periods are allowed"
        )));
    }
    Ok(())
}
