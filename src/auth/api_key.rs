//! API key store.
//!
//! Keys are provisioned from configuration at startup and can be revoked at
//! runtime. Lookups and revocations go through a concurrent map so request
//! handling never waits on a global lock.

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::auth::identity::{AuthScheme, Identity};
use crate::config::ApiKeyConfig;
use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Inactive,
    Revoked,
}

/// Identity an API key maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub subject: String,
    pub capabilities: BTreeSet<String>,
    pub status: KeyStatus,
}

#[derive(Default)]
pub struct ApiKeyStore {
    keys: DashMap<String, ApiKeyRecord>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(keys: &[ApiKeyConfig]) -> Self {
        let store = Self::new();
        for key in keys {
            let status = if key.revoked {
                KeyStatus::Revoked
            } else if !key.active {
                KeyStatus::Inactive
            } else {
                KeyStatus::Active
            };
            store.insert(
                key.key.clone(),
                ApiKeyRecord {
                    subject: key.subject.clone(),
                    capabilities: key
                        .capabilities
                        .iter()
                        .map(|c| c.trim())
                        .filter(|c| !c.is_empty())
                        .map(String::from)
                        .collect(),
                    status,
                },
            );
        }
        tracing::info!(keys = store.len(), "API key store loaded");
        store
    }

    pub fn insert(&self, key: impl Into<String>, record: ApiKeyRecord) {
        self.keys.insert(key.into(), record);
    }

    /// Permanently revoke a key. Returns false if the key is unknown.
    pub fn revoke(&self, key: &str) -> bool {
        match self.keys.get_mut(key) {
            Some(mut record) => {
                record.status = KeyStatus::Revoked;
                tracing::info!(subject = %record.subject, "API key revoked");
                true
            }
            None => false,
        }
    }

    /// Resolve a presented key to an identity.
    pub fn authenticate(&self, key: &str) -> Result<Identity, GatewayError> {
        let record = self
            .keys
            .get(key)
            .ok_or_else(|| GatewayError::AuthenticationFailed("API key is not recognised".to_string()))?;

        match record.status {
            KeyStatus::Active => Ok(Identity::new(
                record.subject.clone(),
                AuthScheme::ApiKey,
                record.capabilities.iter().cloned(),
            )),
            KeyStatus::Inactive => Err(GatewayError::AuthenticationFailed(
                "API key is not active".to_string(),
            )),
            KeyStatus::Revoked => Err(GatewayError::AuthenticationFailed(
                "API key has been revoked".to_string(),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStore")
            .field("keys", &self.keys.len())
            .finish()
    }
}
