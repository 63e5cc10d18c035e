//! Fake collaborators for authentication tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::api_key::{hash_verifier, KeyStore, SplitKey};
use crate::auth::csrf::{CsrfVerification, CsrfVerifier, Environment};
use crate::auth::session::Session;
use crate::auth::Identity;
use crate::error::{AuthError, AuthResult};

/// Environment with a fixed test-mode answer.
pub struct FixedEnvironment(pub bool);

impl Environment for FixedEnvironment {
    fn is_test_mode(&self) -> bool {
        self.0
    }
}

#[derive(Default)]
pub struct FakeCsrf {
    tokens: HashMap<String, String>,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl CsrfVerifier for FakeCsrf {
    async fn verify(&self, supplied: &str, namespace: &str) -> AuthResult<CsrfVerification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::Store("csrf storage offline".to_string()));
        }
        Ok(match self.tokens.get(namespace) {
            None => CsrfVerification::NoToken,
            Some(stored) if stored == supplied => CsrfVerification::Valid,
            Some(_) => CsrfVerification::Mismatch,
        })
    }
}

/// In-memory session with scripted answers.
pub struct FakeSession {
    identity: Option<Identity>,
    unavailable: bool,
    csrf: Option<FakeCsrf>,
}

impl FakeSession {
    pub fn logged_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            unavailable: false,
            csrf: Some(FakeCsrf::default()),
        }
    }

    pub fn logged_out() -> Self {
        Self {
            identity: None,
            unavailable: false,
            csrf: Some(FakeCsrf::default()),
        }
    }

    /// Session whose backing store errors on every read.
    pub fn unavailable() -> Self {
        Self {
            identity: None,
            unavailable: true,
            csrf: None,
        }
    }

    pub fn with_csrf_token(mut self, namespace: &str, token: &str) -> Self {
        self.csrf
            .get_or_insert_with(FakeCsrf::default)
            .tokens
            .insert(namespace.to_string(), token.to_string());
        self
    }

    pub fn with_failing_csrf(mut self) -> Self {
        self.csrf.get_or_insert_with(FakeCsrf::default).fail = true;
        self
    }

    pub fn without_csrf(mut self) -> Self {
        self.csrf = None;
        self
    }

    /// Number of times the CSRF store was consulted.
    pub fn verify_calls(&self) -> usize {
        self.csrf
            .as_ref()
            .map_or(0, |csrf| csrf.calls.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn is_logged_in(&self) -> AuthResult<bool> {
        if self.unavailable {
            return Err(AuthError::Store("session store offline".to_string()));
        }
        Ok(self.identity.is_some())
    }

    async fn logged_in_identity(&self) -> AuthResult<Option<Identity>> {
        if self.unavailable {
            return Err(AuthError::Store("session store offline".to_string()));
        }
        Ok(self.identity.clone())
    }

    fn csrf(&self) -> Option<&dyn CsrfVerifier> {
        self.csrf.as_ref().map(|csrf| csrf as &dyn CsrfVerifier)
    }
}

#[derive(Debug, Clone)]
struct InMemoryKey {
    verifier_hash: String,
    user_id: Uuid,
    email: String,
    active: bool,
}

/// Key store held entirely in memory, with revocation.
#[derive(Clone, Default)]
pub struct InMemoryKeyStore {
    /// Keys indexed by identifier.
    keys: Arc<RwLock<HashMap<String, InMemoryKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a full `<identifier>:<verifier>` key for a user.
    ///
    /// Returns `false` if the key is not in the split format.
    pub async fn add_key(&self, key: &str, user_id: Uuid, email: &str) -> bool {
        let Some(split) = SplitKey::parse(key) else {
            return false;
        };
        let mut keys = self.keys.write().await;
        keys.insert(
            split.identifier.to_string(),
            InMemoryKey {
                verifier_hash: hash_verifier(split.verifier),
                user_id,
                email: email.to_string(),
                active: true,
            },
        );
        true
    }

    /// Revoke an API key by its identifier.
    pub async fn revoke_key(&self, identifier: &str) {
        let mut keys = self.keys.write().await;
        if let Some(key) = keys.get_mut(identifier) {
            key.active = false;
        }
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn authenticate(&self, key: &str) -> AuthResult<Option<Identity>> {
        let Some(split) = SplitKey::parse(key) else {
            return Ok(None);
        };
        let keys = self.keys.read().await;

        Ok(keys
            .get(split.identifier)
            .filter(|stored| stored.active && split.matches_hash(&stored.verifier_hash))
            .map(|stored| Identity::api_key(stored.user_id, stored.email.clone(), split.identifier)))
    }
}
