//! Structured logging setup.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, key material, or application secret** may appear in any
//!   log field. Salts are logged only as fingerprints.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`), overridden
//!   by `RUST_LOG` when set.

pub mod init;

pub use init::init_telemetry;
