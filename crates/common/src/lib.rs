//! Common types, envelope definitions, and errors shared across `envcrypt` crates.

pub mod error;
pub mod protocol;

pub use error::{
    CryptoError, DecryptionError, EncryptionError, KeyDerivationError, ValidationError,
};
pub use protocol::{is_envelope, EncryptedEnvelope, EnvVariable, ProjectRecord, VariableValue};
