//! [`KeyCache`]: in-memory map from `(user_id, salt)` to its [`DerivedKey`].

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;

use super::DerivedKey;

/// Cache of derived keys, keyed by `"{user_id}:{salt}"`.
///
/// Backed by [`ArcSwap`] so lookups never block. Writers copy the map and
/// swap it in. Nothing is persisted; the owner must call [`KeyCache::clear`]
/// on sign-out, when no user is authenticated, and when a new salt supersedes
/// the active one.
#[derive(Clone, Debug)]
pub struct KeyCache {
    inner: Arc<ArcSwap<HashMap<String, DerivedKey>>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(HashMap::new()))),
        }
    }

    /// Composite cache identity for a user and salt.
    pub fn key_id(user_id: &str, salt: &str) -> String {
        format!("{user_id}:{salt}")
    }

    pub fn get(&self, user_id: &str, salt: &str) -> Option<DerivedKey> {
        self.inner.load().get(&Self::key_id(user_id, salt)).cloned()
    }

    /// Insert or replace the key for `(user_id, salt)`.
    pub fn put(&self, user_id: &str, salt: &str, key: DerivedKey) {
        let id = Self::key_id(user_id, salt);
        self.inner.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(id.clone(), key.clone());
            next
        });
    }

    /// Drop every cached key.
    pub fn clear(&self) {
        self.inner.store(Arc::new(HashMap::new()));
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
