//! [`EncryptionSession`]: owns the active key and exposes encrypt/decrypt.
//!
//! # Lifecycle
//!
//! 1. [`EncryptionSession::initialize_for_user`] or
//!    [`EncryptionSession::initialize_for_project`] derives a key on a blocking
//!    thread, probes it with an encrypt/decrypt round trip, and activates it.
//! 2. [`EncryptionSession::encrypt`] and [`EncryptionSession::decrypt`] borrow
//!    the active key under a short read lock. Each call is independent, so
//!    many can run concurrently.
//! 3. [`EncryptionSession::teardown`] drops the active key and empties the
//!    key cache. It must run on sign-out and on session end.
//!
//! # Concurrency invariants
//!
//! - At most one initialisation runs at a time. A second call while
//!   `Initializing` is rejected with [`CryptoError::InitializationInProgress`].
//! - Encrypt/decrypt are rejected with [`CryptoError::NotReady`] unless a key
//!   is active. Calls are never queued behind an initialisation.
//! - A teardown during an in-flight initialisation wins: the derived key is
//!   discarded and the initialiser receives [`CryptoError::Superseded`].

pub mod state;

pub use state::{KeyScope, SessionStatus};

use std::sync::Arc;

use common::{CryptoError, EncryptedEnvelope, KeyDerivationError};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crypto::{cipher, kdf, Salt, PBKDF2_ITERATIONS};
use crate::keys::{DerivedKey, KeyCache};
use state::{ActiveKey, SessionState};

/// Value round-tripped through every freshly derived key before activation.
const SELF_TEST_PROBE: &str = "envcrypt-self-test";

/// Per-tab encryption session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EncryptionSession {
    inner: Arc<Inner>,
}

struct Inner {
    application_secret: SecretString,
    iterations: u32,
    cache: KeyCache,
    state: RwLock<SessionState>,
    status_tx: watch::Sender<SessionStatus>,
}

impl EncryptionSession {
    /// Create an uninitialised session using [`PBKDF2_ITERATIONS`].
    pub fn new(application_secret: SecretString) -> Self {
        Self::with_iterations(application_secret, PBKDF2_ITERATIONS)
    }

    /// Create an uninitialised session with an explicit derivation cost.
    ///
    /// Counts below [`PBKDF2_ITERATIONS`] make every initialisation fail with
    /// [`KeyDerivationError::WeakIterations`].
    pub fn with_iterations(application_secret: SecretString, iterations: u32) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                application_secret,
                iterations,
                cache: KeyCache::new(),
                state: RwLock::new(SessionState::new()),
                status_tx,
            }),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let secret = SecretString::from(cfg.app_secret.expose_secret().to_owned());
        Self::with_iterations(secret, cfg.pbkdf2_iterations)
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub async fn status(&self) -> SessionStatus {
        self.inner.state.read().await.status.clone()
    }

    /// Receive every status transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Salt of the active key, if any.
    pub async fn active_salt(&self) -> Option<Salt> {
        self.inner.state.read().await.active.as_ref().map(|a| a.salt.clone())
    }

    pub async fn active_scope(&self) -> Option<KeyScope> {
        self.inner.state.read().await.active.as_ref().map(|a| a.scope)
    }

    /// Number of key activations so far. Unchanged by no-op re-initialisation.
    pub async fn generation(&self) -> u64 {
        self.inner.state.read().await.generation
    }

    pub fn cached_keys(&self) -> usize {
        self.inner.cache.len()
    }

    // -----------------------------------------------------------------------
    // Initialisation
    // -----------------------------------------------------------------------

    /// Activate a user-level key, generating a new salt if none is given.
    ///
    /// Any prior session is torn down first. Returns the salt in use; the
    /// caller is responsible for persisting a newly generated one.
    ///
    /// # Errors
    ///
    /// [`CryptoError::InitializationInProgress`] if another initialisation is
    /// running, [`CryptoError::KeyDerivation`] for bad inputs, or
    /// [`CryptoError::Superseded`] if torn down mid-flight.
    pub async fn initialize_for_user(
        &self,
        user_id: &str,
        existing_salt: Option<&str>,
    ) -> Result<Salt, CryptoError> {
        let epoch = {
            let mut state = self.inner.state.write().await;
            if state.status == SessionStatus::Initializing {
                return Err(CryptoError::InitializationInProgress);
            }
            state.active = None;
            self.inner.cache.clear();
            state.owner = Some(user_id.to_owned());
            self.begin(&mut state)
        };

        let salt = match existing_salt {
            Some(s) => Salt::parse(s),
            None => Ok(Salt::generate()),
        };
        match salt {
            Ok(salt) => self
                .activate(epoch, user_id, salt.clone(), KeyScope::User)
                .await
                .map(|()| salt),
            Err(e) => Err(self.fail(epoch, e.into()).await),
        }
    }

    /// Activate the key for a project's salt.
    ///
    /// A call with the `(user_id, salt)` pair that is already active is a
    /// no-op. A different salt or user supersedes the active key and empties
    /// the cache.
    ///
    /// # Errors
    ///
    /// Same as [`EncryptionSession::initialize_for_user`].
    pub async fn initialize_for_project(
        &self,
        user_id: &str,
        project_salt: &str,
    ) -> Result<(), CryptoError> {
        let epoch = {
            let mut state = self.inner.state.write().await;
            if state.status == SessionStatus::Initializing {
                return Err(CryptoError::InitializationInProgress);
            }
            if let Some(active) = &state.active {
                if state.status.is_ready() && active.matches(user_id, project_salt) {
                    debug!(salt = %active.salt.fingerprint(), "project key already active");
                    return Ok(());
                }
                if active.salt.as_str() != project_salt {
                    self.inner.cache.clear();
                }
            }
            if state.owner.as_deref() != Some(user_id) {
                self.inner.cache.clear();
            }
            state.active = None;
            state.owner = Some(user_id.to_owned());
            self.begin(&mut state)
        };

        match Salt::parse(project_salt) {
            Ok(salt) => self.activate(epoch, user_id, salt, KeyScope::Project).await,
            Err(e) => Err(self.fail(epoch, e.into()).await),
        }
    }

    /// React to the authenticated user changing.
    ///
    /// `None` (signed out) tears the session down. A user who already owns
    /// the session is left alone. Any other user ends the previous session
    /// and gets a fresh user-level key; the generated salt is returned so the
    /// caller can persist it.
    pub async fn on_auth_change(&self, user_id: Option<&str>) -> Result<Option<Salt>, CryptoError> {
        let Some(user_id) = user_id else {
            self.teardown().await;
            return Ok(None);
        };
        let status = {
            let state = self.inner.state.read().await;
            let owned = state.owner.as_deref() == Some(user_id);
            if owned && !matches!(state.status, SessionStatus::Error(_)) {
                return Ok(None);
            }
            state.status.clone()
        };
        if status != SessionStatus::Uninitialized {
            debug!("authenticated user changed; ending previous session");
            self.teardown().await;
        }
        self.initialize_for_user(user_id, None).await.map(Some)
    }

    /// Drop the active key and every cached key. Idempotent.
    pub async fn teardown(&self) {
        let mut state = self.inner.state.write().await;
        state.epoch += 1;
        state.active = None;
        state.owner = None;
        self.inner.cache.clear();
        if state.status != SessionStatus::Uninitialized {
            info!(from = state.status.as_str(), "encryption session torn down");
        }
        self.publish(&mut state, SessionStatus::Uninitialized);
    }

    // -----------------------------------------------------------------------
    // Encrypt / decrypt
    // -----------------------------------------------------------------------

    /// Encrypt `plaintext` under the active key.
    pub async fn encrypt(&self, plaintext: &str) -> Result<EncryptedEnvelope, CryptoError> {
        let key = self.active_key().await?;
        Ok(cipher::encrypt(plaintext, &key)?)
    }

    /// Decrypt `envelope` under the active key.
    ///
    /// Structural defects surface as [`CryptoError::Validation`]; tag
    /// failures as [`CryptoError::Decryption`]. Neither is retried with
    /// another key.
    pub async fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<String, CryptoError> {
        let key = self.active_key().await?;
        cipher::decrypt(envelope, &key).map_err(|e| {
            warn!(error = %e, "decryption refused");
            CryptoError::from(e)
        })
    }

    async fn active_key(&self) -> Result<DerivedKey, CryptoError> {
        let state = self.inner.state.read().await;
        match (&state.status, &state.active) {
            (SessionStatus::Ready, Some(active)) => Ok(active.key.clone()),
            _ => Err(CryptoError::NotReady),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn begin(&self, state: &mut SessionState) -> u64 {
        state.epoch += 1;
        self.publish(state, SessionStatus::Initializing);
        state.epoch
    }

    async fn activate(
        &self,
        epoch: u64,
        user_id: &str,
        salt: Salt,
        scope: KeyScope,
    ) -> Result<(), CryptoError> {
        let key = match self.derive_cached(user_id, &salt).await {
            Ok(key) => key,
            Err(e) => return Err(self.fail(epoch, e).await),
        };

        let mut state = self.inner.state.write().await;
        if state.epoch != epoch {
            debug!(salt = %salt.fingerprint(), "initialisation superseded; discarding key");
            return Err(CryptoError::Superseded);
        }
        self.inner.cache.put(user_id, salt.as_str(), key.clone());
        info!(scope = scope.as_str(), salt = %salt.fingerprint(), "encryption session ready");
        state.active = Some(ActiveKey {
            user_id: user_id.to_owned(),
            salt,
            scope,
            key,
        });
        state.generation += 1;
        self.publish(&mut state, SessionStatus::Ready);
        Ok(())
    }

    /// Fetch from the cache or derive on a blocking thread, then self-test.
    async fn derive_cached(&self, user_id: &str, salt: &Salt) -> Result<DerivedKey, CryptoError> {
        if let Some(key) = self.inner.cache.get(user_id, salt.as_str()) {
            debug!(salt = %salt.fingerprint(), "derived key cache hit");
            return Ok(key);
        }
        debug!(salt = %salt.fingerprint(), "derived key cache miss");

        let inner = Arc::clone(&self.inner);
        let user = user_id.to_owned();
        let salt_str = salt.as_str().to_owned();
        let key = tokio::task::spawn_blocking(move || {
            kdf::derive_with_iterations(
                &user,
                inner.application_secret.expose_secret(),
                &salt_str,
                inner.iterations,
            )
        })
        .await
        .map_err(|_| KeyDerivationError::Interrupted)??;

        self_test(&key)?;
        Ok(key)
    }

    async fn fail(&self, epoch: u64, err: CryptoError) -> CryptoError {
        let mut state = self.inner.state.write().await;
        if state.epoch == epoch {
            warn!(error = %err, "encryption session initialisation failed");
            state.active = None;
            self.publish(&mut state, SessionStatus::Error(err.to_string()));
            err
        } else {
            CryptoError::Superseded
        }
    }

    fn publish(&self, state: &mut SessionState, status: SessionStatus) {
        state.status = status.clone();
        self.inner.status_tx.send_replace(status);
    }
}

impl std::fmt::Debug for EncryptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionSession")
            .field("iterations", &self.inner.iterations)
            .field("cached_keys", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

fn self_test(key: &DerivedKey) -> Result<(), CryptoError> {
    let envelope = cipher::encrypt(SELF_TEST_PROBE, key)?;
    if cipher::decrypt(&envelope, key)? != SELF_TEST_PROBE {
        return Err(common::DecryptionError::AuthenticationFailed.into());
    }
    Ok(())
}
