//! Client-side end-to-end encryption for project environment variables.
//!
//! Values are encrypted with AES-256-GCM under a key derived with
//! PBKDF2-HMAC-SHA256 from `(user id, application secret, salt)`. The storage
//! layer only ever sees [`common::EncryptedEnvelope`]s and never holds a key.
//!
//! Entry point for callers is [`EncryptionSession`]; the lower layers are
//! public for tooling and tests.

pub mod config;
pub mod crypto;
pub mod dotenv;
pub mod encoding;
pub mod envelope;
pub mod keys;
pub mod project;
pub mod session;
pub mod telemetry;

pub use config::Config;
pub use crypto::Salt;
pub use keys::{DerivedKey, KeyCache};
pub use session::{EncryptionSession, KeyScope, SessionStatus};
