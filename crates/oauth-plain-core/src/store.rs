//! Shared credential store
//!
//! Maps the connection identity (the submitted username) to the principal
//! bound during authentication. The authorization layer reads it later.
//!
//! The store is injected into the binder rather than looked up globally; its
//! lifetime belongs to the host process.

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;
use tracing::debug;

use crate::types::Principal;

/// Storage backend trait for bound principals
///
/// Implementations must be thread-safe and support concurrent access.
/// Writes to the same key are last-write-wins.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Store a principal under `key`, replacing any previous entry
    async fn put(&self, key: &str, principal: Principal);

    /// Look up the principal bound to `key`
    async fn get(&self, key: &str) -> Option<Principal>;

    /// Number of bound principals
    async fn len(&self) -> usize;
}

/// In-memory credential store
///
/// Entries live for the lifetime of the process and are never evicted here.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    principals: DashMap<String, Principal>,
}

impl MemoryCredentialStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn put(&self, key: &str, principal: Principal) {
        let replaced = self.principals.insert(key.to_string(), principal).is_some();
        debug!(key = %key, replaced, "Stored credentials");
    }

    async fn get(&self, key: &str) -> Option<Principal> {
        self.principals.get(key).map(|entry| entry.value().clone())
    }

    async fn len(&self) -> usize {
        self.principals.len()
    }
}
