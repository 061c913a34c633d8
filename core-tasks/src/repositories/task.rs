//! Task repository trait and implementation

use crate::error::{Result, TaskStoreError};
use crate::models::{DuePrecision, Priority, Task};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{FromRow, SqlitePool};

/// Task repository interface for data access operations
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Find a task by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Task>>;

    /// Get all tasks for a user
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Insert a new task
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the row already exists
    async fn insert(&self, task: &Task) -> Result<()>;

    /// Update an existing task (full row)
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist
    async fn update(&self, task: &Task) -> Result<()>;

    /// Delete a task by ID
    ///
    /// # Returns
    /// - `Ok(true)` if the task was deleted
    /// - `Ok(false)` if the task was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Label ids attached to a task
    async fn labels_for(&self, task_id: &str) -> Result<Vec<String>>;

    /// Replace the label set attached to a task
    async fn set_labels(&self, task_id: &str, label_ids: &[String]) -> Result<()>;

    /// Count tasks for a user
    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
}

/// SQLite implementation of TaskRepository
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Create a new SQLite task repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a task
#[derive(Debug, FromRow)]
struct TaskRow {
    id: String,
    user_id: String,
    list_id: String,
    parent_id: Option<String>,
    title: String,
    description: Option<String>,
    completed: i64,
    completed_at: Option<i64>,
    priority: String,
    due_at: Option<i64>,
    due_precision: Option<String>,
    recurrence: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<TaskRow> for Task {
    type Error = TaskStoreError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let priority: Priority = row.priority.parse()?;
        let due_precision = row
            .due_precision
            .as_deref()
            .map(str::parse::<DuePrecision>)
            .transpose()?;

        let due_at = row
            .due_at
            .map(|ts| {
                Utc.timestamp_opt(ts, 0)
                    .single()
                    .ok_or_else(|| TaskStoreError::InvalidInput {
                        field: "due_at".to_string(),
                        message: format!("Invalid timestamp: {}", ts),
                    })
            })
            .transpose()?;

        Ok(Task {
            id: row.id,
            user_id: row.user_id,
            list_id: row.list_id,
            parent_id: row.parent_id,
            title: row.title,
            description: row.description,
            completed: row.completed != 0,
            completed_at: row.completed_at,
            priority,
            due_at,
            due_precision,
            recurrence: row.recurrence,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TASK_COLUMNS: &str = "id, user_id, list_id, parent_id, title, description, \
     completed, completed_at, priority, due_at, due_precision, recurrence, \
     created_at, updated_at";

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE id = ?",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Task::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE user_id = ? ORDER BY created_at",
            TASK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn insert(&self, task: &Task) -> Result<()> {
        task.validate().map_err(|msg| TaskStoreError::InvalidInput {
            field: "task".to_string(),
            message: msg,
        })?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, user_id, list_id, parent_id, title, description,
                completed, completed_at, priority, due_at, due_precision,
                recurrence, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.user_id)
        .bind(&task.list_id)
        .bind(&task.parent_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed as i64)
        .bind(task.completed_at)
        .bind(task.priority.as_str())
        .bind(task.due_at.map(|dt| dt.timestamp()))
        .bind(task.due_precision.map(|p| p.as_str()))
        .bind(&task.recurrence)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, task: &Task) -> Result<()> {
        task.validate().map_err(|msg| TaskStoreError::InvalidInput {
            field: "task".to_string(),
            message: msg,
        })?;

        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                list_id = ?,
                parent_id = ?,
                title = ?,
                description = ?,
                completed = ?,
                completed_at = ?,
                priority = ?,
                due_at = ?,
                due_precision = ?,
                recurrence = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.list_id)
        .bind(&task.parent_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed as i64)
        .bind(task.completed_at)
        .bind(task.priority.as_str())
        .bind(task.due_at.map(|dt| dt.timestamp()))
        .bind(task.due_precision.map(|p| p.as_str()))
        .bind(&task.recurrence)
        .bind(task.updated_at)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskStoreError::NotFound {
                entity_type: "task".to_string(),
                id: task.id.clone(),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn labels_for(&self, task_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT label_id FROM task_labels WHERE task_id = ? ORDER BY label_id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn set_labels(&self, task_id: &str, label_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM task_labels WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        for label_id in label_ids {
            sqlx::query("INSERT OR IGNORE INTO task_labels (task_id, label_id) VALUES (?, ?)")
                .bind(task_id)
                .bind(label_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE user_id = ?")
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
    use crate::models::{Label, TaskList};
    use crate::repositories::{
        LabelRepository, ListRepository, SqliteLabelRepository, SqliteListRepository,
    };

    async fn setup() -> (SqlitePool, TaskList) {
        let pool = create_test_pool().await.unwrap();
        let list = TaskList::new("u1", "Inbox");
        SqliteListRepository::new(pool.clone())
            .insert(&list)
            .await
            .unwrap();
        (pool, list)
    }

    #[tokio::test]
    async fn test_insert_and_round_trip() {
        let (pool, list) = setup().await;
        let repo = SqliteTaskRepository::new(pool);

        let mut task = Task::new("u1", &list.id, "Buy milk");
        task.priority = Priority::High;
        task.due_at = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        task.due_precision = Some(DuePrecision::Day);
        repo.insert(&task).await.unwrap();

        let found = repo.find_by_id(&task.id).await.unwrap().unwrap();
        assert_eq!(found, task);
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let (pool, list) = setup().await;
        let repo = SqliteTaskRepository::new(pool);

        let task = Task::new("u1", &list.id, "Ghost");
        let result = repo.update(&task).await;
        assert!(matches!(result, Err(TaskStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let (pool, list) = setup().await;
        let repo = SqliteTaskRepository::new(pool);

        let task = Task::new("u1", &list.id, "Temp");
        repo.insert(&task).await.unwrap();

        assert!(repo.delete(&task.id).await.unwrap());
        assert!(!repo.delete(&task.id).await.unwrap());
        assert!(repo.find_by_id(&task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_label_attachment() {
        let (pool, list) = setup().await;
        let labels = SqliteLabelRepository::new(pool.clone());
        let repo = SqliteTaskRepository::new(pool);

        let label_a = Label::new("u1", "errand");
        let label_b = Label::new("u1", "urgent");
        labels.insert(&label_a).await.unwrap();
        labels.insert(&label_b).await.unwrap();

        let task = Task::new("u1", &list.id, "Buy milk");
        repo.insert(&task).await.unwrap();

        repo.set_labels(&task.id, &[label_a.id.clone(), label_b.id.clone()])
            .await
            .unwrap();
        let mut expected = vec![label_a.id.clone(), label_b.id.clone()];
        expected.sort();
        assert_eq!(repo.labels_for(&task.id).await.unwrap(), expected);

        // Replacing the set drops stale attachments
        repo.set_labels(&task.id, &[label_b.id.clone()]).await.unwrap();
        assert_eq!(repo.labels_for(&task.id).await.unwrap(), vec![label_b.id]);
    }
}
