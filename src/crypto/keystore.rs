//! Durable ECDSA device identity.
//!
//! Keys are P-256 (ES256) pairs generated through `ring`. The PKCS#8
//! document is persisted under the key directory with owner-only
//! permissions so the identity survives process restarts; rotation (a lost
//! or deleted key file) resets the device's trust history on the server
//! side. Private key material never leaves this module and is never
//! serialized into proofs or logs; only signatures and the public key
//! cross the trust boundary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use tracing::{debug, info};

use crate::crypto::hash::sha256_hex;
use crate::error::{Result, XLensError};

/// Public half of a device identity.
#[derive(Debug, Clone)]
pub struct DeviceKey {
    /// First 16 hex chars of SHA-256 over the public key bytes. Derived
    /// deterministically so client and server agree on key identity
    /// without transmitting a separate identifier.
    pub key_id: String,

    /// Base64 of the uncompressed P-256 public point
    pub public_key: String,

    /// Creation time in unix milliseconds
    pub created_at: i64,
}

struct StoredKey {
    pair: EcdsaKeyPair,
    info: DeviceKey,
}

/// Per-user device key storage.
///
/// Idempotent per user id within the process; backed by PKCS#8 files on
/// disk for durability across restarts.
pub struct KeyStore {
    dir: PathBuf,
    keys: Mutex<HashMap<String, StoredKey>>,
    /// Signing requests serialize through this guard. A reentrant sign
    /// before the previous one resolves fails rather than interleaves.
    signing: Mutex<()>,
    rng: SystemRandom,
}

impl KeyStore {
    /// Open a key store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| XLensError::KeyGenerationFailed(format!("key dir: {}", e)))?;

        Ok(Self {
            dir,
            keys: Mutex::new(HashMap::new()),
            signing: Mutex::new(()),
            rng: SystemRandom::new(),
        })
    }

    /// Generate a fresh, non-persisted P-256 pair and return its public info.
    pub fn generate_key_pair(&self) -> Result<DeviceKey> {
        let (stored, _pkcs8) = self.generate()?;
        Ok(stored.info)
    }

    /// Get the device key for a user, generating and persisting one on
    /// first use.
    pub fn get_or_create(&self, user_id: &str) -> Result<DeviceKey> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| XLensError::KeyGenerationFailed("key store poisoned".into()))?;

        if let Some(stored) = keys.get(user_id) {
            return Ok(stored.info.clone());
        }

        let path = self.key_path(user_id);
        let stored = if path.exists() {
            self.load_key(&path)?
        } else {
            let (stored, pkcs8) = self.generate()?;
            self.persist_key(&path, user_id, &pkcs8)?;
            stored
        };

        let info = stored.info.clone();
        keys.insert(user_id.to_string(), stored);
        Ok(info)
    }

    /// Sign a message with the user's device key.
    ///
    /// Returns the raw (fixed-size) ECDSA signature bytes.
    pub fn sign(&self, user_id: &str, message: &[u8]) -> Result<Vec<u8>> {
        // Refuse a second in-flight sign instead of interleaving.
        let _guard = self
            .signing
            .try_lock()
            .map_err(|_| XLensError::SigningFailed("signing already in progress".into()))?;

        let keys = self
            .keys
            .lock()
            .map_err(|_| XLensError::SigningFailed("key store poisoned".into()))?;

        let stored = keys
            .get(user_id)
            .ok_or_else(|| XLensError::SigningFailed(format!("no key for user {}", user_id)))?;

        let sig = stored
            .pair
            .sign(&self.rng, message)
            .map_err(|_| XLensError::SigningFailed("ecdsa sign".into()))?;

        Ok(sig.as_ref().to_vec())
    }

    /// Remove a user's key from memory and disk.
    pub fn delete(&self, user_id: &str) -> Result<()> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| XLensError::KeyGenerationFailed("key store poisoned".into()))?;
        keys.remove(user_id);

        let path = self.key_path(user_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| XLensError::KeyGenerationFailed(format!("delete key: {}", e)))?;
            info!(user_id, "Device key deleted");
        }

        Ok(())
    }

    fn generate(&self) -> Result<(StoredKey, Vec<u8>)> {
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &self.rng)
            .map_err(|_| XLensError::KeyGenerationFailed("pkcs8 generation".into()))?;

        let stored = self.key_from_pkcs8(pkcs8.as_ref())?;
        Ok((stored, pkcs8.as_ref().to_vec()))
    }

    fn key_path(&self, user_id: &str) -> PathBuf {
        // File names must not depend on unsanitized user input
        let safe: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.p8", safe))
    }

    fn load_key(&self, path: &Path) -> Result<StoredKey> {
        let pkcs8 = std::fs::read(path)
            .map_err(|e| XLensError::KeyGenerationFailed(format!("read key: {}", e)))?;

        let created_at = std::fs::metadata(path)
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        let mut stored = self.key_from_pkcs8(&pkcs8)?;
        stored.info.created_at = created_at;
        debug!(key_id = %stored.info.key_id, "Loaded device key from disk");

        Ok(stored)
    }

    fn key_from_pkcs8(&self, pkcs8: &[u8]) -> Result<StoredKey> {
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &self.rng)
            .map_err(|_| XLensError::KeyGenerationFailed("pkcs8 parse".into()))?;

        let public = pair.public_key().as_ref().to_vec();
        let key_id = sha256_hex(&public)[..16].to_string();

        Ok(StoredKey {
            pair,
            info: DeviceKey {
                key_id,
                public_key: base64::encode(&public),
                created_at: Utc::now().timestamp_millis(),
            },
        })
    }

    fn persist_key(&self, path: &Path, user_id: &str, pkcs8: &[u8]) -> Result<()> {
        std::fs::write(path, pkcs8)
            .map_err(|e| XLensError::KeyGenerationFailed(format!("write key: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| XLensError::KeyGenerationFailed(format!("key perms: {}", e)))?;
        }

        info!(user_id, "Generated and persisted new device key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_or_create_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::open(temp.path()).unwrap();

        let a = store.get_or_create("athlete-1").unwrap();
        let b = store.get_or_create("athlete-1").unwrap();
        assert_eq!(a.key_id, b.key_id);
        assert_eq!(a.public_key, b.public_key);
    }

    #[test]
    fn test_key_survives_reopen() {
        let temp = TempDir::new().unwrap();

        let first = {
            let store = KeyStore::open(temp.path()).unwrap();
            store.get_or_create("athlete-1").unwrap()
        };

        let store = KeyStore::open(temp.path()).unwrap();
        let second = store.get_or_create("athlete-1").unwrap();
        assert_eq!(first.key_id, second.key_id);
    }

    #[test]
    fn test_distinct_users_distinct_keys() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::open(temp.path()).unwrap();

        let a = store.get_or_create("athlete-1").unwrap();
        let b = store.get_or_create("athlete-2").unwrap();
        assert_ne!(a.key_id, b.key_id);
    }

    #[test]
    fn test_key_id_is_hash_derived() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::open(temp.path()).unwrap();

        let key = store.get_or_create("athlete-1").unwrap();
        let public = base64::decode(&key.public_key).unwrap();
        assert_eq!(key.key_id, sha256_hex(&public)[..16]);
    }

    #[test]
    fn test_sign_produces_signature() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::open(temp.path()).unwrap();
        store.get_or_create("athlete-1").unwrap();

        let sig = store.sign("athlete-1", b"payload").unwrap();
        // Raw P-256 signature: r || s, 64 bytes
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_sign_without_key_fails() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::open(temp.path()).unwrap();

        let err = store.sign("nobody", b"payload").unwrap_err();
        assert_eq!(err.code(), "signing_failed");
    }

    #[test]
    fn test_delete_then_recreate_rotates() {
        let temp = TempDir::new().unwrap();
        let store = KeyStore::open(temp.path()).unwrap();

        let a = store.get_or_create("athlete-1").unwrap();
        store.delete("athlete-1").unwrap();
        let b = store.get_or_create("athlete-1").unwrap();
        assert_ne!(a.key_id, b.key_id);
    }
}
