//! Provider integration (credential) storage
//!
//! One `integrations` row per (user, provider), created when the user
//! connects the provider. The engine reads and decrypts it once per pass
//! and never mutates it.

use async_trait::async_trait;
use bridge_traits::crypto::{EncryptedSecret, TokenCipher};
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

use crate::error::{Result, SyncError};
use crate::state::ProviderKind;

/// Stored provider credential for one (user, provider)
#[derive(Debug, Clone)]
pub struct Integration {
    pub user_id: String,
    pub provider: ProviderKind,
    pub secret: EncryptedSecret,
    pub created_at: i64,
}

impl Integration {
    /// Create a new integration from an already-encrypted token
    pub fn new(user_id: impl Into<String>, provider: ProviderKind, secret: EncryptedSecret) -> Self {
        Self {
            user_id: user_id.into(),
            provider,
            secret,
            created_at: Utc::now().timestamp(),
        }
    }

    /// Decrypt the stored access token
    pub async fn access_token(&self, cipher: &dyn TokenCipher) -> Result<String> {
        Ok(cipher.decrypt(&self.secret).await?)
    }
}

#[derive(Debug, FromRow)]
struct IntegrationRow {
    user_id: String,
    provider: String,
    ciphertext: String,
    iv: String,
    tag: String,
    key_id: String,
    created_at: i64,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = SyncError;

    fn try_from(row: IntegrationRow) -> Result<Self> {
        Ok(Integration {
            user_id: row.user_id,
            provider: row.provider.parse()?,
            secret: EncryptedSecret {
                ciphertext: row.ciphertext,
                iv: row.iv,
                tag: row.tag,
                key_id: row.key_id,
            },
            created_at: row.created_at,
        })
    }
}

/// Repository for integration persistence
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Find the integration for a (user, provider)
    async fn find(&self, user_id: &str, provider: ProviderKind) -> Result<Option<Integration>>;

    /// Insert or replace an integration (called on connect, not by the engine)
    async fn upsert(&self, integration: &Integration) -> Result<()>;
}

/// SQLite implementation of IntegrationRepository
pub struct SqliteIntegrationRepository {
    pool: SqlitePool,
}

impl SqliteIntegrationRepository {
    /// Create a new SQLite integration repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationRepository for SqliteIntegrationRepository {
    async fn find(&self, user_id: &str, provider: ProviderKind) -> Result<Option<Integration>> {
        let row = sqlx::query_as::<_, IntegrationRow>(
            "SELECT user_id, provider, ciphertext, iv, tag, key_id, created_at
             FROM integrations WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Integration::try_from).transpose()
    }

    async fn upsert(&self, integration: &Integration) -> Result<()> {
        sqlx::query(
            "INSERT INTO integrations (user_id, provider, ciphertext, iv, tag, key_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id, provider) DO UPDATE SET
                 ciphertext = excluded.ciphertext,
                 iv = excluded.iv,
                 tag = excluded.tag,
                 key_id = excluded.key_id",
        )
        .bind(&integration.user_id)
        .bind(integration.provider.as_str())
        .bind(&integration.secret.ciphertext)
        .bind(&integration.secret.iv)
        .bind(&integration.secret.tag)
        .bind(&integration.secret.key_id)
        .bind(integration.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_tasks::create_test_pool;

    fn secret(ciphertext: &str) -> EncryptedSecret {
        EncryptedSecret {
            ciphertext: ciphertext.to_string(),
            iv: "iv".to_string(),
            tag: "tag".to_string(),
            key_id: "k1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteIntegrationRepository::new(pool);

        let integration = Integration::new("u1", ProviderKind::Todoist, secret("cipher-a"));
        repo.upsert(&integration).await.unwrap();

        let found = repo.find("u1", ProviderKind::Todoist).await.unwrap().unwrap();
        assert_eq!(found.secret.ciphertext, "cipher-a");

        let replaced = Integration::new("u1", ProviderKind::Todoist, secret("cipher-b"));
        repo.upsert(&replaced).await.unwrap();

        let found = repo.find("u1", ProviderKind::Todoist).await.unwrap().unwrap();
        assert_eq!(found.secret.ciphertext, "cipher-b");
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteIntegrationRepository::new(pool);

        assert!(repo
            .find("u1", ProviderKind::Todoist)
            .await
            .unwrap()
            .is_none());
    }
}
