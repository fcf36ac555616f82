//! PBKDF2-HMAC-SHA256 key derivation and salt handling.
//!
//! Key material is `"{user_id}:{application_secret}"`, so neither a leaked
//! salt nor a leaked application secret is enough on its own to rebuild a
//! user's key. Derivation is deterministic: a returning session re-derives
//! the same key from the stored salt.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use common::KeyDerivationError;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::encoding;
use crate::keys::DerivedKey;

/// Iteration count used by [`derive`], and the floor for
/// [`derive_with_iterations`].
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Byte length of a freshly generated salt (256 bits).
pub const SALT_LEN: usize = 32;

/// A base64-encoded derivation salt.
///
/// Salts are immutable once issued. Replacing a project's salt orphans every
/// value encrypted under the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Salt(String);

impl Salt {
    /// Generate a new random [`SALT_LEN`]-byte salt from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(encoding::encode(bytes))
    }

    /// Accept an existing salt string.
    ///
    /// # Errors
    ///
    /// [`KeyDerivationError::MissingSalt`] if empty,
    /// [`KeyDerivationError::InvalidSalt`] if not valid base64.
    pub fn parse(s: &str) -> Result<Self, KeyDerivationError> {
        if s.trim().is_empty() {
            return Err(KeyDerivationError::MissingSalt);
        }
        if !encoding::is_valid(s) {
            return Err(KeyDerivationError::InvalidSalt);
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log-safe identifier; see [`encoding::fingerprint`].
    pub fn fingerprint(&self) -> String {
        encoding::fingerprint(&self.0)
    }
}

impl std::fmt::Display for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the AES-256-GCM key for `(user_id, application_secret, salt)`
/// using [`PBKDF2_ITERATIONS`].
///
/// # Errors
///
/// Returns a [`KeyDerivationError`] if any input is empty or the salt is not
/// valid base64.
pub fn derive(
    user_id: &str,
    application_secret: &str,
    salt: &str,
) -> Result<DerivedKey, KeyDerivationError> {
    derive_with_iterations(user_id, application_secret, salt, PBKDF2_ITERATIONS)
}

/// Same as [`derive`] with an explicit iteration count, which must be at
/// least [`PBKDF2_ITERATIONS`].
pub fn derive_with_iterations(
    user_id: &str,
    application_secret: &str,
    salt: &str,
    iterations: u32,
) -> Result<DerivedKey, KeyDerivationError> {
    validate_params(user_id, application_secret, salt)?;
    if iterations < PBKDF2_ITERATIONS {
        return Err(KeyDerivationError::WeakIterations {
            got: iterations,
            min: PBKDF2_ITERATIONS,
        });
    }

    let salt_bytes =
        Zeroizing::new(encoding::decode(salt).map_err(|_| KeyDerivationError::InvalidSalt)?);
    let material = Zeroizing::new(format!("{user_id}:{application_secret}"));

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(material.as_bytes(), &salt_bytes, iterations, &mut key[..]);

    Ok(DerivedKey::from_bytes(&key))
}

/// Reject missing derivation inputs, each with its own error.
pub fn validate_params(
    user_id: &str,
    application_secret: &str,
    salt: &str,
) -> Result<(), KeyDerivationError> {
    if user_id.trim().is_empty() {
        return Err(KeyDerivationError::MissingUserId);
    }
    if application_secret.is_empty() {
        return Err(KeyDerivationError::MissingSecret);
    }
    if salt.trim().is_empty() {
        return Err(KeyDerivationError::MissingSalt);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::{decrypt, encrypt};

    #[test]
    fn generated_salt_is_32_bytes() {
        let salt = Salt::generate();
        assert_eq!(encoding::decode(salt.as_str()).unwrap().len(), SALT_LEN);
        assert_ne!(salt, Salt::generate());
    }

    #[test]
    fn salt_parse_rejects_bad_input() {
        assert_eq!(Salt::parse(""), Err(KeyDerivationError::MissingSalt));
        assert_eq!(Salt::parse("not base64!"), Err(KeyDerivationError::InvalidSalt));
        assert!(Salt::parse("c2FsdA==").is_ok());
    }

    #[test]
    fn missing_inputs_are_distinct_errors() {
        let salt = Salt::generate();
        assert_eq!(
            derive("", "secret", salt.as_str()).unwrap_err(),
            KeyDerivationError::MissingUserId
        );
        assert_eq!(
            derive("u1", "", salt.as_str()).unwrap_err(),
            KeyDerivationError::MissingSecret
        );
        assert_eq!(derive("u1", "secret", "").unwrap_err(), KeyDerivationError::MissingSalt);
        assert_eq!(
            derive("u1", "secret", "%%%").unwrap_err(),
            KeyDerivationError::InvalidSalt
        );
    }

    #[test]
    fn weak_iteration_count_rejected() {
        let salt = Salt::generate();
        let err = derive_with_iterations("u1", "secret", salt.as_str(), 1_000).unwrap_err();
        assert!(matches!(err, KeyDerivationError::WeakIterations { got: 1_000, .. }));
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = Salt::generate();
        let k1 = derive("u1", "secret", salt.as_str()).unwrap();
        let k2 = derive("u1", "secret", salt.as_str()).unwrap();
        let env = encrypt("value", &k1).unwrap();
        assert_eq!(decrypt(&env, &k2).unwrap(), "value");
    }

    #[test]
    fn user_binding_changes_key() {
        let salt = Salt::generate();
        let k1 = derive("u1", "secret", salt.as_str()).unwrap();
        let k2 = derive("u2", "secret", salt.as_str()).unwrap();
        let env = encrypt("value", &k1).unwrap();
        assert!(decrypt(&env, &k2).is_err());
    }
}
