//! Derived key handle and the per-session key cache.
//!
//! # Security invariants
//!
//! - A [`DerivedKey`] has no accessor for its raw bytes and no `Serialize`
//!   impl; once derived, the key material only exists inside the AES key
//!   schedule. The workspace enables `aes/zeroize`, so the schedule is wiped
//!   when the last handle is dropped.
//! - Keys are never persisted. The cache lives only as long as the owning
//!   session.

pub mod cache;

pub use cache::KeyCache;

use std::sync::Arc;

use aes_gcm::{Aes256Gcm, Key, KeyInit};

use crate::crypto::KEY_LEN;

/// Non-exportable AES-256-GCM key restricted to encrypt/decrypt.
///
/// Cloning is cheap and shares the same underlying key schedule.
#[derive(Clone)]
pub struct DerivedKey {
    cipher: Arc<Aes256Gcm>,
}

impl DerivedKey {
    /// Only the key-derivation function builds keys from raw bytes.
    pub(crate) fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(bytes);
        Self {
            cipher: Arc::new(Aes256Gcm::new(key)),
        }
    }

    pub(crate) fn cipher(&self) -> &Aes256Gcm {
        &self.cipher
    }

    /// Returns `true` if both handles refer to the same derived key instance.
    pub fn same_instance(&self, other: &DerivedKey) -> bool {
        Arc::ptr_eq(&self.cipher, &other.cipher)
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}
