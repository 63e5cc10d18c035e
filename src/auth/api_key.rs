//! API key resolution.
//!
//! Keys have the shape `<identifier>:<verifier>`. Stores look the key up by
//! its identifier and only ever keep a SHA-256 hash of the verifier.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::credential::Credential;
use crate::auth::Identity;
use crate::error::AuthResult;

/// Record store that turns an API key into the identity that owns it.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// `Ok(None)` for unknown, malformed or revoked keys. `Err` only when the
    /// store itself cannot answer.
    async fn authenticate(&self, key: &str) -> AuthResult<Option<Identity>>;
}

/// A presented API key split into its lookup and secret halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitKey<'a> {
    pub identifier: &'a str,
    pub verifier: &'a str,
}

impl<'a> SplitKey<'a> {
    /// Parse `<identifier>:<verifier>`. Both halves must be non-empty.
    pub fn parse(key: &'a str) -> Option<Self> {
        let (identifier, verifier) = key.split_once(':')?;
        if identifier.is_empty() || verifier.is_empty() {
            return None;
        }
        Some(Self {
            identifier,
            verifier,
        })
    }

    /// Compare this key's verifier against a stored hash in constant time.
    pub fn matches_hash(&self, stored_hash: &str) -> bool {
        let computed = hash_verifier(self.verifier);
        computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
    }
}

/// Hash an API key verifier for storage/comparison.
pub fn hash_verifier(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    hex::encode(hasher.finalize())
}

/// Attempts a candidate credential against the key store.
#[derive(Clone)]
pub struct ApiKeyResolver {
    store: Arc<dyn KeyStore>,
}

impl ApiKeyResolver {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Resolve a candidate credential. Empty values are never sent to the store.
    pub async fn resolve(&self, credential: &Credential) -> AuthResult<Option<Identity>> {
        if credential.value.is_empty() {
            return Ok(None);
        }

        let identity = self.store.authenticate(&credential.value).await?;
        if identity.is_none() {
            tracing::debug!(
                source = ?credential.source,
                key_prefix = %credential.prefix(),
                "API key did not match"
            );
        }

        Ok(identity)
    }
}
