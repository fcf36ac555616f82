//! Key derivation and AES-256-GCM value encryption.
//!
//! This module has no knowledge of sessions or caching. It provides the
//! primitives the session layer composes.
//!
//! # Envelope format
//!
//! ```text
//! { "ciphertext": <base64>, "iv": <base64, 12 bytes>, "authTag": <base64, 16 bytes> }
//! ```
//!
//! The GCM tag is stored detached from the ciphertext.

pub mod cipher;
pub mod kdf;

pub use kdf::{Salt, PBKDF2_ITERATIONS, SALT_LEN};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of an AES-GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;
