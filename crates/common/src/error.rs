//! Error taxonomy shared by every envcrypt component.
//!
//! Errors fall into two user-facing groups:
//! - "please sign in again": [`CryptoError::KeyDerivation`], [`CryptoError::NotReady`]
//! - "this data appears corrupted or you lack the right key":
//!   [`CryptoError::Decryption`], [`CryptoError::Validation`]
//!
//! None of the variants ever carry key material or plaintext.

use thiserror::Error;

/// Why a key could not be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyDerivationError {
    #[error("user id is required for key derivation")]
    MissingUserId,

    #[error("application secret is required for key derivation")]
    MissingSecret,

    #[error("salt is required for key derivation")]
    MissingSalt,

    #[error("salt is not valid base64")]
    InvalidSalt,

    /// The derivation task was cancelled or panicked before finishing.
    #[error("key derivation did not complete")]
    Interrupted,

    /// The iteration count is below the enforced floor.
    #[error("iteration count {got} is below the minimum of {min}")]
    WeakIterations { got: u32, min: u32 },
}

/// Structural defect in an encrypted envelope, detected before any cipher call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope field `{0}` is missing or empty")]
    MissingField(&'static str),

    #[error("envelope field `{0}` is not valid base64")]
    InvalidBase64(&'static str),

    #[error("invalid iv length: expected 12 bytes, got {0}")]
    InvalidIvLength(usize),

    #[error("invalid auth tag length: expected 16 bytes, got {0}")]
    InvalidTagLength(usize),
}

/// Encryption could not produce an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    /// An empty plaintext would produce an empty `ciphertext` field, which is
    /// not a valid envelope.
    #[error("refusing to encrypt an empty value")]
    EmptyPlaintext,

    #[error("aead encryption failed")]
    AeadFailure,
}

/// Decryption refused to return plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptionError {
    /// The envelope failed structural validation; the cipher was never invoked.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] ValidationError),

    /// GCM tag check failed: tampered data, wrong key, or wrong iv.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Umbrella error returned by the encryption session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[from] KeyDerivationError),

    #[error("invalid envelope: {0}")]
    Validation(#[from] ValidationError),

    #[error("encryption failed: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("decryption failed: {0}")]
    Decryption(DecryptionError),

    /// No key is active: the session is uninitialised, initialising, or failed.
    #[error("encryption session is not ready")]
    NotReady,

    /// Another `initialize_*` call is still running.
    #[error("encryption session is already initialising")]
    InitializationInProgress,

    /// The session was torn down while this initialisation was in flight.
    #[error("encryption session was torn down during initialisation")]
    Superseded,
}

impl From<DecryptionError> for CryptoError {
    fn from(e: DecryptionError) -> Self {
        match e {
            DecryptionError::Malformed(v) => CryptoError::Validation(v),
            other => CryptoError::Decryption(other),
        }
    }
}

impl CryptoError {
    /// Whether the user should be asked to sign in again rather than told the
    /// data is corrupted.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            CryptoError::KeyDerivation(_)
                | CryptoError::NotReady
                | CryptoError::InitializationInProgress
                | CryptoError::Superseded
        )
    }

    /// Message safe to show to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            CryptoError::KeyDerivation(_) => {
                "Unable to generate encryption key. Please try signing in again."
            }
            CryptoError::Encryption(_) => "Failed to encrypt data. Please try again.",
            CryptoError::Decryption(_) | CryptoError::Validation(_) => {
                "Unable to decrypt data. This may indicate corrupted data or an authentication issue."
            }
            CryptoError::NotReady | CryptoError::Superseded => {
                "Encryption key not available. Please sign in again."
            }
            CryptoError::InitializationInProgress => {
                "Encryption system not ready. Please wait and try again."
            }
        }
    }
}
