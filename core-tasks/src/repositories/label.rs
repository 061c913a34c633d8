//! Label repository trait and implementation

use crate::error::Result;
use crate::models::Label;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Label repository interface
#[async_trait]
pub trait LabelRepository: Send + Sync {
    /// Find a label by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Label>>;

    /// Get all labels for a user
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Label>>;

    /// Find a label by name, matching case-insensitively
    async fn find_by_name_ci(&self, user_id: &str, name: &str) -> Result<Option<Label>>;

    /// Insert a new label
    async fn insert(&self, label: &Label) -> Result<()>;

    /// Count labels for a user
    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
}

/// SQLite implementation of LabelRepository
pub struct SqliteLabelRepository {
    pool: SqlitePool,
}

impl SqliteLabelRepository {
    /// Create a new SQLite label repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LabelRepository for SqliteLabelRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Label>> {
        let label = query_as::<_, Label>(
            "SELECT id, user_id, name, color, created_at, updated_at FROM labels WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(label)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Label>> {
        let labels = query_as::<_, Label>(
            r#"
            SELECT id, user_id, name, color, created_at, updated_at
            FROM labels
            WHERE user_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(labels)
    }

    async fn find_by_name_ci(&self, user_id: &str, name: &str) -> Result<Option<Label>> {
        let label = query_as::<_, Label>(
            r#"
            SELECT id, user_id, name, color, created_at, updated_at
            FROM labels
            WHERE user_id = ? AND LOWER(TRIM(name)) = LOWER(TRIM(?))
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(label)
    }

    async fn insert(&self, label: &Label) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO labels (id, user_id, name, color, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&label.id)
        .bind(&label.user_id)
        .bind(&label.name)
        .bind(&label.color)
        .bind(label.created_at)
        .bind(label.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM labels WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
