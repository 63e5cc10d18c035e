//! Database-backed API key store.

use async_trait::async_trait;

use crate::auth::{Identity, KeyStore, SplitKey};
use crate::error::AuthResult;
use crate::storage::{store_error, GatekeeperRepository};

#[async_trait]
impl KeyStore for GatekeeperRepository {
    async fn authenticate(&self, key: &str) -> AuthResult<Option<Identity>> {
        let Some(split) = SplitKey::parse(key) else {
            return Ok(None);
        };

        let Some(record) = self
            .find_api_key(split.identifier)
            .await
            .map_err(store_error)?
        else {
            return Ok(None);
        };

        if !record.is_active() || !split.matches_hash(&record.verifier_hash) {
            return Ok(None);
        }

        let owner = self.get_user(record.user_id).await.map_err(store_error)?;
        if owner.is_none() {
            tracing::warn!(key_id = %record.identifier, "API key owner no longer exists");
        }

        Ok(owner.map(|user| Identity::api_key(user.id, user.email, record.identifier)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_verifier;
    use crate::domain::ApiKeyRecord;
    use crate::storage::repository::tests::{create_test_user, setup_test_db};
    use chrono::Utc;

    async fn repo_with_key() -> (GatekeeperRepository, uuid::Uuid) {
        let repo = setup_test_db().await;
        let user = create_test_user(&repo, "ci@example.com").await;
        repo.create_api_key(&ApiKeyRecord {
            identifier: "ci".to_string(),
            verifier_hash: hash_verifier("s3cr3t"),
            user_id: user.id,
            name: "CI".to_string(),
            created_at: Utc::now(),
            revoked_at: None,
        })
        .await
        .unwrap();
        (repo, user.id)
    }

    #[tokio::test]
    async fn test_valid_key_resolves_to_owner() {
        let (repo, owner) = repo_with_key().await;
        let identity = repo.authenticate("ci:s3cr3t").await.unwrap().unwrap();
        assert_eq!(identity, Identity::api_key(owner, "ci@example.com", "ci"));
    }

    #[tokio::test]
    async fn test_bad_keys_do_not_resolve() {
        let (repo, _) = repo_with_key().await;
        assert!(repo.authenticate("ci:wrong").await.unwrap().is_none());
        assert!(repo.authenticate("cd:s3cr3t").await.unwrap().is_none());
        assert!(repo.authenticate("s3cr3t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoked_key_does_not_resolve() {
        let (repo, _) = repo_with_key().await;
        repo.revoke_api_key("ci").await.unwrap();
        assert!(repo.authenticate("ci:s3cr3t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_pool_is_an_error() {
        let (repo, _) = repo_with_key().await;
        repo.pool().close().await;
        assert!(repo.authenticate("ci:s3cr3t").await.is_err());
    }
}
