//! Built-in backend: Argon2id-derived key, AES-256-GCM per entry, one
//! JSON document on disk.
//!
//! While unlocked the backend holds the derived key, the document as last
//! written, and a plaintext cache of every entry that decrypted.  Locking
//! drops all three; `MasterKey` and the `Zeroizing` cache values wipe
//! themselves on drop.

use std::collections::BTreeMap;
use std::path::PathBuf;

use zeroize::Zeroizing;

use super::{StoreBackend, UnlockReport};
use crate::crypto::{decrypt, derive_master_key, encrypt, generate_salt, Argon2Params, MasterKey};
use crate::errors::{LockboxError, Result};
use crate::git::GitSync;
use crate::vault::{read_document, write_document, StoreDocument};

type PlaintextCache = BTreeMap<String, Zeroizing<Vec<u8>>>;

struct Session {
    key: MasterKey,
    document: StoreDocument,
    cache: PlaintextCache,
}

pub(super) struct BuiltinStore {
    path: PathBuf,
    /// Parameters for newly derived keys (initialize / change_password).
    argon2: Argon2Params,
    session: Option<Session>,
}

impl BuiltinStore {
    pub(super) fn new(path: PathBuf, argon2: Argon2Params) -> Self {
        Self {
            path,
            argon2,
            session: None,
        }
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(LockboxError::Locked)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(LockboxError::Locked)
    }

    /// Read the document and check `password` against its tag.
    fn open_document(&self, password: &[u8]) -> Result<(MasterKey, StoreDocument)> {
        let document = read_document(&self.path)?;
        let key = derive_master_key(password, &document.salt, &document.kdf_params())?;
        key.verify(&document.key_hash)?;
        Ok((key, document))
    }

    /// Derive a key from `password` under a brand-new salt.
    fn fresh_key(&self, password: &[u8]) -> Result<(MasterKey, StoreDocument)> {
        let salt = generate_salt();
        let key = derive_master_key(password, &salt, &self.argon2)?;
        let document = StoreDocument::new(&salt, &key.verification_tag(), self.argon2);
        Ok((key, document))
    }
}

/// Decrypt every entry of `document`, skipping the ones that fail.
fn decrypt_all(key: &MasterKey, document: &StoreDocument) -> (PlaintextCache, Vec<String>) {
    let mut cache = PlaintextCache::new();
    let mut skipped = Vec::new();

    for (name, ciphertext) in document.entries() {
        match ciphertext.and_then(|ct| decrypt(key, &ct)) {
            Ok(plaintext) => {
                cache.insert(name.to_string(), plaintext);
            }
            Err(e) => {
                tracing::warn!(secret = name, error = %e, "skipping secret that failed to decrypt");
                skipped.push(name.to_string());
            }
        }
    }

    (cache, skipped)
}

impl StoreBackend for BuiltinStore {
    fn exists_on_disk(&self) -> bool {
        self.path.exists()
    }

    fn initialize(&mut self, password: &[u8]) -> Result<()> {
        let (key, document) = self.fresh_key(password)?;
        write_document(&self.path, &document)?;

        self.session = Some(Session {
            key,
            document,
            cache: PlaintextCache::new(),
        });
        Ok(())
    }

    fn unlock(&mut self, password: &[u8]) -> Result<UnlockReport> {
        let (key, document) = self.open_document(password)?;
        let (cache, skipped) = decrypt_all(&key, &document);

        let report = UnlockReport {
            unlocked: cache.len(),
            skipped,
        };
        self.session = Some(Session {
            key,
            document,
            cache,
        });
        Ok(report)
    }

    fn lock(&mut self) {
        self.session = None;
    }

    fn store(&mut self, name: &str, value: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let session = self.session_mut()?;

        let ciphertext = encrypt(&session.key, value)?;
        let mut document = session.document.clone();
        document.set_ciphertext(name, &ciphertext);

        // Only touch memory once the new document is on disk.
        write_document(&path, &document)?;
        session.document = document;
        session
            .cache
            .insert(name.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn retrieve(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.session()?
            .cache
            .get(name)
            .map(|value| Zeroizing::new(value.to_vec()))
            .ok_or_else(|| LockboxError::NotFound(name.to_string()))
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let path = self.path.clone();
        let session = self.session_mut()?;

        // Entries that failed to decrypt are still in the document and
        // can be deleted.
        let mut document = session.document.clone();
        if document.secrets.remove(name).is_none() {
            return Err(LockboxError::NotFound(name.to_string()));
        }

        write_document(&path, &document)?;
        session.document = document;
        session.cache.remove(name);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.session()?.cache.keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.session()?.cache.contains_key(name))
    }

    fn change_password(&mut self, old: &[u8], new: &[u8]) -> Result<()> {
        let (old_key, old_document) = self.open_document(old)?;
        let (cache, skipped) = decrypt_all(&old_key, &old_document);
        drop(old_key);

        if !skipped.is_empty() {
            tracing::warn!(
                dropped = skipped.len(),
                "secrets that could not be decrypted are not carried over to the new key"
            );
        }

        let (key, mut document) = self.fresh_key(new)?;
        for (name, plaintext) in &cache {
            let ciphertext = encrypt(&key, plaintext)?;
            document.set_ciphertext(name, &ciphertext);
        }

        write_document(&self.path, &document)?;
        self.session = Some(Session {
            key,
            document,
            cache,
        });
        Ok(())
    }

    fn git(&self) -> Option<&GitSync> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> BuiltinStore {
        BuiltinStore::new(dir.path().join("secrets.json"), Argon2Params::minimum())
    }

    #[test]
    fn failed_write_leaves_cache_untouched() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.initialize(b"pw").unwrap();
        store.store("kept", b"v1").unwrap();

        // Replace the document path's parent with a file so the next
        // write cannot create its temp file.
        store.path = dir.path().join("not-a-dir").join("secrets.json");
        std::fs::write(dir.path().join("not-a-dir"), b"file").unwrap();

        assert!(store.store("new", b"v2").is_err());
        assert_eq!(store.list().unwrap(), vec!["kept"]);
    }

    #[test]
    fn lock_drops_session() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.initialize(b"pw").unwrap();
        store.store("a", b"1").unwrap();

        store.lock();
        assert!(store.session.is_none());
        assert!(matches!(store.retrieve("a"), Err(LockboxError::Locked)));
    }

    #[test]
    fn tampered_entry_is_skipped_and_still_deletable() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.initialize(b"pw").unwrap();
        store.store("good", b"fine").unwrap();
        store.store("bad", b"doomed").unwrap();
        store.lock();

        let mut document = read_document(&store.path).unwrap();
        let mut ciphertext = document.ciphertext("bad").unwrap().unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        document.set_ciphertext("bad", &ciphertext);
        write_document(&store.path, &document).unwrap();

        let report = store.unlock(b"pw").unwrap();
        assert_eq!(report.unlocked, 1);
        assert_eq!(report.skipped, vec!["bad"]);
        assert_eq!(store.list().unwrap(), vec!["good"]);

        store.delete("bad").unwrap();
        assert!(read_document(&store.path).unwrap().ciphertext("bad").is_none());
    }
}
