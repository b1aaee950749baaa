use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in Lockbox.
///
/// Messages identify the secret or operation that failed, never the
/// master password, the derived key, or a plaintext value.
#[derive(Debug, Error)]
pub enum LockboxError {
    // --- Password / state errors ---
    #[error("Invalid password")]
    InvalidPassword,

    #[error("Store is locked; unlock it first")]
    Locked,

    #[error("Store already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("No store initialized at {0}")]
    NotInitialized(PathBuf),

    // --- Secret errors ---
    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("Invalid secret name: {0}")]
    InvalidName(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: ciphertext did not authenticate")]
    AuthenticationFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Persistence errors ---
    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- External tool errors ---
    #[error("Required tool '{0}' was not found on PATH")]
    ToolNotFound(String),

    #[error("{tool} exited with status {status}: {output}")]
    ExternalToolFailed {
        tool: String,
        status: i32,
        output: String,
    },

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl LockboxError {
    /// Build a closure that wraps an `io::Error` with the path it concerns.
    ///
    /// Intended for `map_err`: `fs::read(&p).map_err(LockboxError::io(&p))?`.
    pub fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Convenience type alias for Lockbox results.
pub type Result<T> = std::result::Result<T, LockboxError>;
