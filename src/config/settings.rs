use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::{BackendConfig, BackendKind, ExternalKind};
use crate::crypto::Argon2Params;
use crate::errors::{LockboxError, Result};
use crate::git::GitConfig;
use crate::manager::StoreConfig;

/// Store configuration, loaded from `lockbox.toml`.
///
/// Every field has a sensible default so Lockbox works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Store document (builtin) or directory (age/gpg).
    /// Defaults to `~/.lockbox/secrets.json` or `~/.lockbox/secrets/`.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Which backend encrypts the secrets.
    #[serde(default)]
    pub backend: BackendKind,

    /// age recipient or GPG key ID (external backends).
    #[serde(default)]
    pub recipient: Option<String>,

    /// age identity file used for decryption.
    #[serde(default)]
    pub identity: Option<PathBuf>,

    /// Explicit path to the age/gpg binary.
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Git working tree to commit secret files into (external backends).
    #[serde(default)]
    pub git_repo: Option<PathBuf>,

    /// `git`, or a git-compatible dotfiles manager such as `yadm`.
    #[serde(default = "default_git_program")]
    pub git_program: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_git_program() -> String {
    crate::git::DEFAULT_PROGRAM.to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            backend: BackendKind::default(),
            recipient: None,
            identity: None,
            tool_path: None,
            git_repo: None,
            git_program: default_git_program(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file looked up in the config directory.
    pub const FILE_NAME: &'static str = "lockbox.toml";

    /// Load settings from `<config_dir>/lockbox.toml`.
    pub fn load(config_dir: &Path) -> Result<Self> {
        Self::load_file(&config_dir.join(Self::FILE_NAME))
    }

    /// Load settings from an explicit file.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load_file(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path).map_err(LockboxError::io(config_path))?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            LockboxError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// `~/.lockbox`, where the default config and store live.
    pub fn default_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".lockbox"))
            .ok_or_else(|| LockboxError::ConfigError("cannot determine home directory".into()))
    }

    /// The configured store path, or the backend's default location.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let dir = Self::default_dir()?;
        Ok(match self.backend {
            BackendKind::Builtin => dir.join("secrets.json"),
            BackendKind::Age | BackendKind::Gpg => dir.join("secrets"),
        })
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Build the plain configuration value the store manager consumes.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let backend = match self.backend {
            BackendKind::Builtin => BackendConfig::Builtin {
                argon2: self.argon2_params(),
            },
            BackendKind::Age => self.external(ExternalKind::Age)?,
            BackendKind::Gpg => self.external(ExternalKind::Gpg)?,
        };

        let git = self.git_repo.as_ref().map(|repo| GitConfig {
            repo: repo.clone(),
            program: self.git_program.clone(),
        });

        Ok(StoreConfig {
            path: self.store_path()?,
            backend,
            git,
        })
    }

    fn external(&self, kind: ExternalKind) -> Result<BackendConfig> {
        let recipient = self.recipient.clone().ok_or_else(|| {
            LockboxError::ConfigError(format!(
                "backend '{}' requires `recipient` to be set",
                kind.tool_name()
            ))
        })?;

        Ok(BackendConfig::External {
            kind,
            recipient,
            identity: self.identity.clone(),
            program: self.tool_path.clone(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
