//! AES-256-GCM encryption and decryption of individual string values.
//!
//! Every call to [`encrypt`] draws a fresh 96-bit IV from the OS CSPRNG. GCM
//! nonce reuse under one key breaks both confidentiality and authentication,
//! so there is no API that accepts a caller-chosen IV.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, OsRng},
    Nonce,
};
use common::{DecryptionError, EncryptedEnvelope, EncryptionError};

use super::{NONCE_LEN, TAG_LEN};
use crate::encoding;
use crate::envelope;
use crate::keys::DerivedKey;

/// Encrypt the UTF-8 bytes of `plaintext` under `key`.
///
/// The AEAD output is split into `ciphertext` (all but the last
/// [`TAG_LEN`] bytes) and the detached `authTag`.
///
/// # Errors
///
/// [`EncryptionError::EmptyPlaintext`] for `""`, whose envelope would carry an
/// empty `ciphertext` field. [`EncryptionError::AeadFailure`] is unreachable
/// with a valid key.
pub fn encrypt(plaintext: &str, key: &DerivedKey) -> Result<EncryptedEnvelope, EncryptionError> {
    if plaintext.is_empty() {
        return Err(EncryptionError::EmptyPlaintext);
    }

    let mut iv = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut sealed = key
        .cipher()
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| EncryptionError::AeadFailure)?;

    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(EncryptedEnvelope {
        ciphertext: encoding::encode(&sealed),
        iv: encoding::encode(iv),
        auth_tag: encoding::encode(tag),
    })
}

/// Validate and decrypt `envelope` under `key`.
///
/// # Errors
///
/// - [`DecryptionError::Malformed`] if structural validation fails; the
///   cipher is not invoked.
/// - [`DecryptionError::AuthenticationFailed`] on any tag mismatch. No
///   partial plaintext is ever returned.
/// - [`DecryptionError::InvalidUtf8`] if the authenticated bytes are not UTF-8.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &DerivedKey) -> Result<String, DecryptionError> {
    let decoded = envelope::validate(envelope)?;

    let mut sealed = decoded.ciphertext;
    sealed.extend_from_slice(&decoded.auth_tag);

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(&decoded.iv), sealed.as_slice())
        .map_err(|_| DecryptionError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| DecryptionError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;
    use common::ValidationError;

    fn random_key() -> DerivedKey {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        DerivedKey::from_bytes(&key)
    }

    fn flip_bit(b64: &str, byte: usize) -> String {
        let mut raw = encoding::decode(b64).unwrap();
        raw[byte] ^= 0x01;
        encoding::encode(raw)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = random_key();
        let env = encrypt("postgres://user:pw@db/app", &key).unwrap();
        assert_eq!(decrypt(&env, &key).unwrap(), "postgres://user:pw@db/app");
    }

    #[test]
    fn round_trip_multibyte_utf8() {
        let key = random_key();
        let env = encrypt("clé secrète 🔑", &key).unwrap();
        assert_eq!(decrypt(&env, &key).unwrap(), "clé secrète 🔑");
    }

    #[test]
    fn envelope_field_lengths() {
        let key = random_key();
        let env = encrypt("hunter2", &key).unwrap();
        assert_eq!(encoding::decode(&env.iv).unwrap().len(), NONCE_LEN);
        assert_eq!(encoding::decode(&env.auth_tag).unwrap().len(), TAG_LEN);
        assert_eq!(encoding::decode(&env.ciphertext).unwrap().len(), "hunter2".len());
    }

    #[test]
    fn fresh_iv_every_call() {
        let key = random_key();
        let a = encrypt("same", &key).unwrap();
        let b = encrypt("same", &key).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn empty_plaintext_rejected() {
        assert_eq!(encrypt("", &random_key()).unwrap_err(), EncryptionError::EmptyPlaintext);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let env = encrypt("secret", &random_key()).unwrap();
        assert_eq!(
            decrypt(&env, &random_key()).unwrap_err(),
            DecryptionError::AuthenticationFailed
        );
    }

    #[test]
    fn tampered_fields_fail_auth() {
        let key = random_key();
        let env = encrypt("tamper me", &key).unwrap();

        let mut ct = env.clone();
        ct.ciphertext = flip_bit(&env.ciphertext, 0);
        let mut iv = env.clone();
        iv.iv = flip_bit(&env.iv, 11);
        let mut tag = env.clone();
        tag.auth_tag = flip_bit(&env.auth_tag, 15);

        for bad in [ct, iv, tag] {
            assert_eq!(decrypt(&bad, &key).unwrap_err(), DecryptionError::AuthenticationFailed);
        }
    }

    #[test]
    fn malformed_envelope_rejected_before_cipher() {
        let key = random_key();
        let mut env = encrypt("x", &key).unwrap();
        env.iv = encoding::encode([0u8; 8]);
        assert_eq!(
            decrypt(&env, &key).unwrap_err(),
            DecryptionError::Malformed(ValidationError::InvalidIvLength(8))
        );
    }
}
