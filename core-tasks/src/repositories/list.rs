//! Task list repository trait and implementation

use crate::error::Result;
use crate::models::TaskList;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Task list repository interface
#[async_trait]
pub trait ListRepository: Send + Sync {
    /// Find a list by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<TaskList>>;

    /// Get all lists for a user
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<TaskList>>;

    /// Find a list by name, matching case-insensitively
    async fn find_by_name_ci(&self, user_id: &str, name: &str) -> Result<Option<TaskList>>;

    /// Insert a new list
    async fn insert(&self, list: &TaskList) -> Result<()>;

    /// Count lists for a user
    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
}

/// SQLite implementation of ListRepository
pub struct SqliteListRepository {
    pool: SqlitePool,
}

impl SqliteListRepository {
    /// Create a new SQLite list repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListRepository for SqliteListRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<TaskList>> {
        let list = query_as::<_, TaskList>(
            "SELECT id, user_id, name, created_at, updated_at FROM task_lists WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(list)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<TaskList>> {
        let lists = query_as::<_, TaskList>(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM task_lists
            WHERE user_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lists)
    }

    async fn find_by_name_ci(&self, user_id: &str, name: &str) -> Result<Option<TaskList>> {
        let list = query_as::<_, TaskList>(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM task_lists
            WHERE user_id = ? AND LOWER(TRIM(name)) = LOWER(TRIM(?))
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(list)
    }

    async fn insert(&self, list: &TaskList) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO task_lists (id, user_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&list.id)
        .bind(&list.user_id)
        .bind(&list.name)
        .bind(list.created_at)
        .bind(list.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM task_lists WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_insert_and_find() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteListRepository::new(pool);

        let list = TaskList::new("u1", "Groceries");
        repo.insert(&list).await.unwrap();

        let found = repo.find_by_id(&list.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Groceries");
        assert_eq!(repo.count_by_user("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_name_case_insensitive() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteListRepository::new(pool);

        let list = TaskList::new("u1", "Groceries");
        repo.insert(&list).await.unwrap();

        let found = repo.find_by_name_ci("u1", "  gRoCeRiEs ").await.unwrap();
        assert_eq!(found.map(|l| l.id), Some(list.id.clone()));

        // Other users never match
        assert!(repo
            .find_by_name_ci("u2", "groceries")
            .await
            .unwrap()
            .is_none());
    }
}
