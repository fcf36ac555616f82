//! Configuration loading and validation.
//!
//! All values are read from environment variables at startup. The process
//! exits with a clear error message if any required variable is missing or
//! invalid.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::crypto::PBKDF2_ITERATIONS;

/// Validated envcrypt configuration.
#[derive(Debug)]
pub struct Config {
    /// Application secret bound into every derived key. **Required.**
    pub app_secret: SecretString,

    /// PBKDF2 iteration count; never below [`PBKDF2_ITERATIONS`].
    pub pbkdf2_iterations: u32,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    pub log_level: String,
}

/// Shape of the environment before the secret is wrapped.
#[derive(Deserialize)]
struct RawConfig {
    app_secret: String,

    #[serde(default = "default_pbkdf2_iterations")]
    pbkdf2_iterations: u32,

    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_pbkdf2_iterations() -> u32 {
    PBKDF2_ITERATIONS
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("failed to build configuration from environment")?;

        let raw: RawConfig = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        let c = Config {
            app_secret: SecretString::from(raw.app_secret),
            pbkdf2_iterations: raw.pbkdf2_iterations,
            log_level: raw.log_level,
        };
        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.app_secret.expose_secret().trim().is_empty() {
            anyhow::bail!("APP_SECRET is required and must not be empty");
        }
        if self.pbkdf2_iterations < PBKDF2_ITERATIONS {
            anyhow::bail!("PBKDF2_ITERATIONS must be >= {PBKDF2_ITERATIONS}");
        }
        Ok(())
    }
}
