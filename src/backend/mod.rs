//! Backend selection.
//!
//! A store uses exactly one backend, chosen when the manager is built:
//! - `Builtin`: Argon2id + AES-256-GCM, one JSON document per store.
//! - `Age` / `Gpg`: an external tool encrypts each secret to a recipient,
//!   one ciphertext file per secret (`external`).

pub mod external;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crypto::Argon2Params;

pub use external::ExternalTool;

/// Which backend a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Builtin,
    Age,
    Gpg,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("builtin"),
            Self::Age => f.write_str("age"),
            Self::Gpg => f.write_str("gpg"),
        }
    }
}

/// The external tools Lockbox can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalKind {
    Age,
    Gpg,
}

impl ExternalKind {
    /// Default binary name.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Gpg => "gpg",
        }
    }

    /// Extension of the per-secret ciphertext files.
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Gpg => "gpg",
        }
    }
}

impl From<ExternalKind> for BackendKind {
    fn from(kind: ExternalKind) -> Self {
        match kind {
            ExternalKind::Age => Self::Age,
            ExternalKind::Gpg => Self::Gpg,
        }
    }
}

/// Backend parameters handed to the manager.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Password-gated built-in encryption.
    Builtin { argon2: Argon2Params },

    /// Delegation to age or gpg.
    External {
        kind: ExternalKind,
        /// age recipient or GPG key ID.
        recipient: String,
        /// age identity file used for decryption (unused by gpg).
        identity: Option<PathBuf>,
        /// Explicit tool binary; defaults to `age` / `gpg` on PATH.
        program: Option<PathBuf>,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Builtin { .. } => BackendKind::Builtin,
            Self::External { kind, .. } => (*kind).into(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Builtin {
            argon2: Argon2Params::default(),
        }
    }
}
