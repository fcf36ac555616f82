//! Session status and the mutable state behind it.

use crate::crypto::Salt;
use crate::keys::DerivedKey;

/// Observable lifecycle of an [`EncryptionSession`](super::EncryptionSession).
///
/// ```text
/// Uninitialized ──initialize_*──▶ Initializing ──ok──▶ Ready
///       ▲                              │
///       │                              └──err──▶ Error
///       └──────────── teardown ◀───────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Initializing,
    Ready,
    /// Last initialisation failed. The message never contains key material.
    Error(String),
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionStatus::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Initializing => "initializing",
            SessionStatus::Ready => "ready",
            SessionStatus::Error(_) => "error",
        }
    }
}

/// Which salt lifecycle the active key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    User,
    Project,
}

impl KeyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyScope::User => "user",
            KeyScope::Project => "project",
        }
    }
}

#[derive(Debug)]
pub(crate) struct ActiveKey {
    pub user_id: String,
    pub salt: Salt,
    pub scope: KeyScope,
    pub key: DerivedKey,
}

impl ActiveKey {
    pub fn matches(&self, user_id: &str, salt: &str) -> bool {
        self.user_id == user_id && self.salt.as_str() == salt
    }
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub status: SessionStatus,
    pub active: Option<ActiveKey>,
    /// User the current or in-flight key belongs to. Cleared by teardown.
    pub owner: Option<String>,
    /// Bumped by every teardown and every `initialize_*` start; an
    /// initialisation may only commit if the epoch is unchanged.
    pub epoch: u64,
    /// Number of keys activated so far.
    pub generation: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            active: None,
            owner: None,
            epoch: 0,
            generation: 0,
        }
    }
}
