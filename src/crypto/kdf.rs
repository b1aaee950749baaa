//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  Parameters are configurable via `Argon2Params`
//! (loaded from `lockbox.toml` or sensible defaults) and are recorded in
//! the store document so unlock always uses the ones the key was made with.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::keys::{MasterKey, KEY_LEN};
use crate::errors::{LockboxError, Result};

/// Length of the salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Largest memory cost accepted, in KiB (4 GiB).
const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;

/// Largest iteration count accepted.
const MAX_ITERATIONS: u32 = 64;

/// Largest number of lanes accepted.
const MAX_PARALLELISM: u32 = 64;

/// Configurable Argon2id parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// The cheapest parameters `derive_master_key` accepts.
    ///
    /// Meant for tests and throwaway stores only.
    pub const fn minimum() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Check the parameters are within the supported range.
    ///
    /// Store documents check their `kdf` object with this on read.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_MEMORY_KIB..=MAX_MEMORY_KIB).contains(&self.memory_kib) {
            return Err(LockboxError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be between {MIN_MEMORY_KIB} and {MAX_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if !(1..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(LockboxError::KeyDerivationFailed(format!(
                "Argon2 iterations must be between 1 and {MAX_ITERATIONS} (got {})",
                self.iterations
            )));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            return Err(LockboxError::KeyDerivationFailed(format!(
                "Argon2 parallelism must be between 1 and {MAX_PARALLELISM} (got {})",
                self.parallelism
            )));
        }
        Ok(())
    }
}

/// Derive a 32-byte master key from a password and salt using Argon2id.
///
/// The same password + salt + params always produce the same key.  The
/// key is written straight into a `MasterKey` so no unguarded copy of it
/// is left on the stack.
pub fn derive_master_key(
    password: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<MasterKey> {
    argon2_params.validate()?;

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| LockboxError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = MasterKey::zeroed();
    argon2
        .hash_password_into(password, salt, key.as_mut_bytes())
        .map_err(|e| LockboxError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_weak_memory_cost() {
        let params = Argon2Params {
            memory_kib: 1_024,
            ..Argon2Params::minimum()
        };
        let result = derive_master_key(b"pw", &generate_salt(), &params);
        assert!(matches!(
            result,
            Err(LockboxError::KeyDerivationFailed(_))
        ));
    }

    #[test]
    fn rejects_zero_iterations() {
        let params = Argon2Params {
            iterations: 0,
            ..Argon2Params::minimum()
        };
        assert!(derive_master_key(b"pw", &generate_salt(), &params).is_err());
    }

    #[test]
    fn rejects_unbounded_costs() {
        let huge_memory = Argon2Params {
            memory_kib: u32::MAX,
            ..Argon2Params::minimum()
        };
        let huge_iterations = Argon2Params {
            iterations: 1_000_000,
            ..Argon2Params::minimum()
        };
        let huge_lanes = Argon2Params {
            parallelism: 1_000,
            ..Argon2Params::minimum()
        };
        for params in [huge_memory, huge_iterations, huge_lanes] {
            assert!(matches!(
                params.validate(),
                Err(LockboxError::KeyDerivationFailed(_))
            ));
        }
        assert!(Argon2Params::default().validate().is_ok());
    }

    #[test]
    fn salts_are_fresh() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
