//! Conflict detection and persistence
//!
//! Compares canonical projections of a mapped task pair and records a
//! `sync_conflicts` row the first time they diverge. Conflicts are not
//! errors: a conflicted pair is simply excluded from further automated
//! reconciliation until a human resolves it.

use async_trait::async_trait;
use chrono::Utc;
use core_tasks::Task;
use provider_todoist::types::TodoistTask;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::mapping::{EntityKind, MappingState};
use crate::state::ProviderKind;

/// Conflict type recorded for diverged task pairs
pub const TASK_MISMATCH: &str = "task_mismatch";

// ============================================================================
// Fingerprint
// ============================================================================

/// Canonical comparable projection of a task.
///
/// Only fields both sides represent: title, description (`None` ≡ empty),
/// completion flag, due date truncated to day, parent-present flag, and
/// the sorted external label-name set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFingerprint {
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub due_day: Option<String>,
    pub has_parent: bool,
    pub labels: Vec<String>,
}

impl TaskFingerprint {
    /// Project a local task; `label_names` are its labels already resolved
    /// to external names
    pub fn of_local(task: &Task, label_names: &[String]) -> Self {
        let mut labels: Vec<String> = label_names.to_vec();
        labels.sort();

        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            completed: task.completed,
            due_day: task.due_at.map(|d| d.format("%Y-%m-%d").to_string()),
            has_parent: task.parent_id.is_some(),
            labels,
        }
    }

    /// Project a remote task, excluding labels that encode a list
    /// assignment rather than a plain label
    pub fn of_remote(remote: &TodoistTask, state: &MappingState) -> Self {
        let mut labels: Vec<String> = remote
            .labels
            .iter()
            .filter(|name| state.list_for_label_name(name).is_none())
            .cloned()
            .collect();
        labels.sort();

        Self {
            title: remote.content.clone(),
            description: remote.description.clone(),
            completed: remote.is_completed,
            due_day: remote.due.as_ref().map(|d| day_of(&d.date)),
            has_parent: remote.parent_id.is_some(),
            labels,
        }
    }
}

fn day_of(date: &str) -> String {
    date.chars().take(10).collect()
}

// ============================================================================
// Conflict row
// ============================================================================

/// Resolution status of a recorded conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStatus {
    Pending,
    Resolved,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Pending => "pending",
            ConflictStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ConflictStatus::Pending),
            "resolved" => Ok(ConflictStatus::Resolved),
            _ => Err(SyncError::InvalidInput {
                field: "status".to_string(),
                message: format!("Unknown conflict status: {}", s),
            }),
        }
    }
}

/// A detected, unresolved divergence between a mapped pair
#[derive(Debug, Clone)]
pub struct SyncConflict {
    pub id: String,
    pub user_id: String,
    pub provider: ProviderKind,
    pub kind: EntityKind,
    pub local_id: String,
    pub external_id: String,
    pub conflict_type: String,
    pub local_payload: String,
    pub external_payload: String,
    pub status: ConflictStatus,
    pub created_at: i64,
}

#[derive(Debug, FromRow)]
struct SyncConflictRow {
    id: String,
    user_id: String,
    provider: String,
    entity_kind: String,
    local_id: String,
    external_id: String,
    conflict_type: String,
    local_payload: String,
    external_payload: String,
    status: String,
    created_at: i64,
}

impl TryFrom<SyncConflictRow> for SyncConflict {
    type Error = SyncError;

    fn try_from(row: SyncConflictRow) -> Result<Self> {
        Ok(SyncConflict {
            id: row.id,
            user_id: row.user_id,
            provider: row.provider.parse()?,
            kind: row.entity_kind.parse()?,
            local_id: row.local_id,
            external_id: row.external_id,
            conflict_type: row.conflict_type,
            local_payload: row.local_payload,
            external_payload: row.external_payload,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Repository for conflict persistence
#[async_trait]
pub trait ConflictRepository: Send + Sync {
    /// Insert a new conflict row
    async fn insert(&self, conflict: &SyncConflict) -> Result<()>;

    /// Find a pending conflict for a mapped pair, if one exists
    async fn find_pending(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        local_id: &str,
        external_id: &str,
    ) -> Result<Option<SyncConflict>>;

    /// All pending conflicts for a (user, provider)
    async fn list_pending(
        &self,
        user_id: &str,
        provider: ProviderKind,
    ) -> Result<Vec<SyncConflict>>;

    /// Count pending conflicts for a (user, provider)
    async fn count_pending(&self, user_id: &str, provider: ProviderKind) -> Result<i64>;
}

/// SQLite implementation of ConflictRepository
pub struct SqliteConflictRepository {
    pool: SqlitePool,
}

impl SqliteConflictRepository {
    /// Create a new SQLite conflict repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConflictRepository for SqliteConflictRepository {
    async fn insert(&self, conflict: &SyncConflict) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_conflicts
                 (id, user_id, provider, entity_kind, local_id, external_id,
                  conflict_type, local_payload, external_payload, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conflict.id)
        .bind(&conflict.user_id)
        .bind(conflict.provider.as_str())
        .bind(conflict.kind.as_str())
        .bind(&conflict.local_id)
        .bind(&conflict.external_id)
        .bind(&conflict.conflict_type)
        .bind(&conflict.local_payload)
        .bind(&conflict.external_payload)
        .bind(conflict.status.as_str())
        .bind(conflict.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_pending(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        local_id: &str,
        external_id: &str,
    ) -> Result<Option<SyncConflict>> {
        let row = sqlx::query_as::<_, SyncConflictRow>(
            "SELECT id, user_id, provider, entity_kind, local_id, external_id,
                    conflict_type, local_payload, external_payload, status, created_at
             FROM sync_conflicts
             WHERE user_id = ? AND provider = ? AND entity_kind = ?
               AND local_id = ? AND external_id = ? AND status = 'pending'",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .bind(kind.as_str())
        .bind(local_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncConflict::try_from).transpose()
    }

    async fn list_pending(
        &self,
        user_id: &str,
        provider: ProviderKind,
    ) -> Result<Vec<SyncConflict>> {
        let rows = sqlx::query_as::<_, SyncConflictRow>(
            "SELECT id, user_id, provider, entity_kind, local_id, external_id,
                    conflict_type, local_payload, external_payload, status, created_at
             FROM sync_conflicts
             WHERE user_id = ? AND provider = ? AND status = 'pending'
             ORDER BY created_at",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SyncConflict::try_from).collect()
    }

    async fn count_pending(&self, user_id: &str, provider: ProviderKind) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sync_conflicts
             WHERE user_id = ? AND provider = ? AND status = 'pending'",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Detects divergence between mapped task pairs and records it
pub struct ConflictDetector {
    repository: Arc<dyn ConflictRepository>,
}

impl ConflictDetector {
    /// Create a new detector over a conflict repository
    pub fn new(repository: Arc<dyn ConflictRepository>) -> Self {
        Self { repository }
    }

    /// Compare a mapped pair and record a conflict if they diverge.
    ///
    /// Returns `true` when the pair is conflicted (newly recorded or
    /// already pending) and must be excluded from reconciliation.
    /// Re-detection while a pending conflict exists is a no-op; the same
    /// pair never gets a second pending row.
    pub async fn detect(
        &self,
        user_id: &str,
        provider: ProviderKind,
        task: &Task,
        label_names: &[String],
        remote: &TodoistTask,
        state: &MappingState,
    ) -> Result<bool> {
        if self
            .repository
            .find_pending(user_id, provider, EntityKind::Task, &task.id, &remote.id)
            .await?
            .is_some()
        {
            return Ok(true);
        }

        let local = TaskFingerprint::of_local(task, label_names);
        let external = TaskFingerprint::of_remote(remote, state);
        if local == external {
            return Ok(false);
        }

        let conflict = SyncConflict {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            provider,
            kind: EntityKind::Task,
            local_id: task.id.clone(),
            external_id: remote.id.clone(),
            conflict_type: TASK_MISMATCH.to_string(),
            local_payload: serde_json::to_string(task)?,
            external_payload: serde_json::to_string(remote)?,
            status: ConflictStatus::Pending,
            created_at: Utc::now().timestamp(),
        };
        self.repository.insert(&conflict).await?;

        info!(
            user_id = %user_id,
            local_id = %task.id,
            external_id = %remote.id,
            "Recorded task conflict"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_tasks::create_test_pool;

    fn remote_task(id: &str, content: &str) -> TodoistTask {
        TodoistTask {
            id: id.to_string(),
            project_id: None,
            parent_id: None,
            content: content.to_string(),
            description: String::new(),
            is_completed: false,
            labels: vec![],
            priority: 1,
            due: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_fingerprint_treats_missing_description_as_empty() {
        let task = Task::new("u1", "l1", "A");
        let local = TaskFingerprint::of_local(&task, &[]);
        let external = TaskFingerprint::of_remote(&remote_task("e1", "A"), &MappingState::new());

        assert_eq!(local, external);
    }

    #[test]
    fn test_fingerprint_sorts_labels() {
        let task = Task::new("u1", "l1", "A");
        let local =
            TaskFingerprint::of_local(&task, &["work".to_string(), "errands".to_string()]);

        let mut remote = remote_task("e1", "A");
        remote.labels = vec!["errands".to_string(), "work".to_string()];
        let external = TaskFingerprint::of_remote(&remote, &MappingState::new());

        assert_eq!(local, external);
    }

    #[tokio::test]
    async fn test_mismatch_recorded_once() {
        let pool = create_test_pool().await.unwrap();
        let repo = Arc::new(SqliteConflictRepository::new(pool));
        let detector = ConflictDetector::new(repo.clone());

        let task = Task::new("u1", "l1", "A");
        let remote = remote_task("ext_1", "B");
        let state = MappingState::new();

        assert!(detector
            .detect("u1", ProviderKind::Todoist, &task, &[], &remote, &state)
            .await
            .unwrap());
        // Second detection with the same divergence is a no-op
        assert!(detector
            .detect("u1", ProviderKind::Todoist, &task, &[], &remote, &state)
            .await
            .unwrap());

        assert_eq!(
            repo.count_pending("u1", ProviderKind::Todoist).await.unwrap(),
            1
        );

        let conflict = repo
            .find_pending("u1", ProviderKind::Todoist, EntityKind::Task, &task.id, "ext_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conflict.conflict_type, TASK_MISMATCH);
        assert_eq!(conflict.status, ConflictStatus::Pending);
    }

    #[tokio::test]
    async fn test_equal_pair_is_not_a_conflict() {
        let pool = create_test_pool().await.unwrap();
        let repo = Arc::new(SqliteConflictRepository::new(pool));
        let detector = ConflictDetector::new(repo.clone());

        let task = Task::new("u1", "l1", "Same");
        let remote = remote_task("ext_1", "Same");

        assert!(!detector
            .detect(
                "u1",
                ProviderKind::Todoist,
                &task,
                &[],
                &remote,
                &MappingState::new()
            )
            .await
            .unwrap());
        assert_eq!(
            repo.count_pending("u1", ProviderKind::Todoist).await.unwrap(),
            0
        );
    }
}
