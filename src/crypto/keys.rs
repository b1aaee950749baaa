//! Master key material and the verification tag derived from it.
//!
//! The verification tag is `SHA-256(master_key)`.  It is stored next to
//! the salt so a candidate password can be checked without keeping the
//! password or the key on disk; SHA-256 being one-way, the tag does not
//! give the key back.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{LockboxError, Result};

/// Length of the derived master key (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Length of the verification tag (SHA-256 output).
pub const TAG_LEN: usize = 32;

/// A 32-byte master key that zeroes its memory when dropped.
///
/// Dropping the value is the only way to release key material, so
/// locking the store is just a matter of letting go of it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// An all-zero key, to be filled in place by the KDF.
    pub(crate) fn zeroed() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
        }
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.bytes
    }

    /// Access the raw key bytes (e.g. to pass to the cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Compute the verification tag for this key.
    pub fn verification_tag(&self) -> [u8; TAG_LEN] {
        verification_tag(&self.bytes)
    }

    /// Check this key against a stored verification tag in constant time.
    ///
    /// A tag of the wrong length can only come from a damaged document,
    /// so it is reported as corruption rather than a wrong password.
    pub fn verify(&self, stored_tag: &[u8]) -> Result<()> {
        if stored_tag.len() != TAG_LEN {
            return Err(LockboxError::CorruptStore(format!(
                "verification tag must be {TAG_LEN} bytes, got {}",
                stored_tag.len()
            )));
        }

        let mut actual = self.verification_tag();
        let matches: bool = actual[..].ct_eq(stored_tag).into();
        actual.zeroize();

        if matches {
            Ok(())
        } else {
            Err(LockboxError::InvalidPassword)
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// `SHA-256(key)`.
pub fn verification_tag(key: &[u8]) -> [u8; TAG_LEN] {
    Sha256::digest(key).into()
}
