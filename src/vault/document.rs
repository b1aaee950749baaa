//! The built-in backend's on-disk document.
//!
//! A store file is a single JSON object:
//!
//! ```text
//! {
//!   "salt":     "<base64, 16 bytes>",
//!   "key_hash": "<base64, SHA-256 of the derived key>",
//!   "kdf":      { "memory_kib": .., "iterations": .., "parallelism": .. },
//!   "secrets":  { "<name>": "<base64 of nonce || AES-GCM output>", ... }
//! }
//! ```
//!
//! `kdf` is optional; when missing the default Argon2 parameters apply.
//! The whole document is rewritten (atomically) on every mutation.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::atomic::write_atomic;
use crate::crypto::kdf::{Argon2Params, SALT_LEN};
use crate::crypto::keys::TAG_LEN;
use crate::errors::{LockboxError, Result};

/// Salt, verification tag and ciphertexts of a built-in store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    /// The salt used for Argon2id key derivation.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// Verification tag of the derived key.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub key_hash: Vec<u8>,

    /// Argon2 params the key was derived with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<Argon2Params>,

    /// Secret name -> base64(nonce || ciphertext).
    ///
    /// Kept as strings so one malformed entry does not make the whole
    /// document unreadable; entries are decoded one by one on unlock.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

impl StoreDocument {
    /// An empty document for a freshly derived key.
    pub fn new(salt: &[u8], key_hash: &[u8], kdf: Argon2Params) -> Self {
        Self {
            salt: salt.to_vec(),
            key_hash: key_hash.to_vec(),
            kdf: Some(kdf),
            secrets: BTreeMap::new(),
        }
    }

    /// KDF parameters to use when unlocking this document.
    pub fn kdf_params(&self) -> Argon2Params {
        self.kdf.unwrap_or_default()
    }

    /// Decode one entry's ciphertext.
    pub fn ciphertext(&self, name: &str) -> Option<Result<Vec<u8>>> {
        self.secrets
            .get(name)
            .map(|encoded| decode_entry(name, encoded))
    }

    /// Every entry with its decoded ciphertext, in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Result<Vec<u8>>)> + '_ {
        self.secrets
            .iter()
            .map(|(name, encoded)| (name.as_str(), decode_entry(name, encoded)))
    }

    /// Insert or replace one entry's ciphertext.
    pub fn set_ciphertext(&mut self, name: &str, ciphertext: &[u8]) {
        self.secrets.insert(name.to_string(), BASE64.encode(ciphertext));
    }

    fn validate(&self) -> Result<()> {
        if self.salt.len() != SALT_LEN {
            return Err(LockboxError::CorruptStore(format!(
                "salt must be {SALT_LEN} bytes, got {}",
                self.salt.len()
            )));
        }
        if self.key_hash.len() != TAG_LEN {
            return Err(LockboxError::CorruptStore(format!(
                "key_hash must be {TAG_LEN} bytes, got {}",
                self.key_hash.len()
            )));
        }
        if let Some(kdf) = &self.kdf {
            kdf.validate()
                .map_err(|e| LockboxError::CorruptStore(format!("kdf parameters: {e}")))?;
        }
        Ok(())
    }
}

fn decode_entry(name: &str, encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| LockboxError::CorruptStore(format!("secret '{name}': {e}")))
}

/// Read and validate a store document.
///
/// A missing file means the store was never initialized; anything that
/// does not parse, or has a malformed salt or tag, is `CorruptStore`.
pub fn read_document(path: &Path) -> Result<StoreDocument> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LockboxError::NotInitialized(path.to_path_buf()));
        }
        Err(e) => return Err(LockboxError::io(path)(e)),
    };

    let document: StoreDocument = serde_json::from_slice(&data)
        .map_err(|e| LockboxError::CorruptStore(format!("{}: {e}", path.display())))?;
    document.validate()?;

    Ok(document)
}

/// Serialize the document and replace the file at `path` atomically.
pub fn write_document(path: &Path, document: &StoreDocument) -> Result<()> {
    let json = serde_json::to_vec_pretty(document)
        .map_err(|e| LockboxError::SerializationError(format!("store document: {e}")))?;
    write_atomic(path, &json)?;
    tracing::debug!(path = %path.display(), entries = document.secrets.len(), "wrote store document");
    Ok(())
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
