//! Entity identity mapping
//!
//! Durable local↔external id associations, the idempotency anchor of the
//! engine: a pass never re-creates a local or remote entity whose mapping
//! row already exists. `link` is idempotent in both key directions.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::state::ProviderKind;

// ============================================================================
// Entity kinds
// ============================================================================

/// Kind of entity a mapping row associates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Remote project ↔ local list
    List,
    /// Remote label acting as a list assignment
    ListLabel,
    /// Remote label ↔ local label
    Label,
    /// Remote task ↔ local task
    Task,
}

impl EntityKind {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::List => "list",
            EntityKind::ListLabel => "list_label",
            EntityKind::Label => "label",
            EntityKind::Task => "task",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "list" => Ok(EntityKind::List),
            "list_label" => Ok(EntityKind::ListLabel),
            "label" => Ok(EntityKind::Label),
            "task" => Ok(EntityKind::Task),
            _ => Err(SyncError::InvalidInput {
                field: "entity_kind".to_string(),
                message: format!("Unknown entity kind: {}", s),
            }),
        }
    }
}

// ============================================================================
// Mapping row
// ============================================================================

/// One local↔external association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    pub user_id: String,
    pub provider: ProviderKind,
    pub kind: EntityKind,
    pub external_id: String,
    pub local_id: String,
    /// External parent id, stored redundantly on task mappings so a child
    /// can discover its mapped parent without another remote fetch
    pub external_parent_id: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, FromRow)]
struct EntityMappingRow {
    user_id: String,
    provider: String,
    entity_kind: String,
    external_id: String,
    local_id: String,
    external_parent_id: Option<String>,
    created_at: i64,
}

impl TryFrom<EntityMappingRow> for EntityMapping {
    type Error = SyncError;

    fn try_from(row: EntityMappingRow) -> Result<Self> {
        Ok(EntityMapping {
            user_id: row.user_id,
            provider: row.provider.parse()?,
            kind: row.entity_kind.parse()?,
            external_id: row.external_id,
            local_id: row.local_id,
            external_parent_id: row.external_parent_id,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Mapper
// ============================================================================

/// Persistent entity mapper
#[async_trait]
pub trait EntityMapper: Send + Sync {
    /// Resolve an external id to its mapped local id
    async fn find_local(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<Option<String>>;

    /// Resolve a local id to its mapped external id
    async fn find_external(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        local_id: &str,
    ) -> Result<Option<String>>;

    /// Associate a local and external id.
    ///
    /// Idempotent: linking a pair where either side is already mapped for
    /// this kind is a no-op, never a duplicate row.
    async fn link(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        external_id: &str,
        local_id: &str,
        external_parent_id: Option<&str>,
    ) -> Result<()>;

    /// Remove the mapping for an external id, if present
    async fn unlink(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<()>;

    /// All mappings of one kind for a (user, provider)
    async fn list(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
    ) -> Result<Vec<EntityMapping>>;
}

/// SQLite implementation of EntityMapper
pub struct SqliteEntityMapper {
    pool: SqlitePool,
}

impl SqliteEntityMapper {
    /// Create a new SQLite entity mapper
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityMapper for SqliteEntityMapper {
    async fn find_local(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<Option<String>> {
        let local_id: Option<(String,)> = sqlx::query_as(
            "SELECT local_id FROM entity_mappings
             WHERE user_id = ? AND provider = ? AND entity_kind = ? AND external_id = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .bind(kind.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(local_id.map(|(id,)| id))
    }

    async fn find_external(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        local_id: &str,
    ) -> Result<Option<String>> {
        let external_id: Option<(String,)> = sqlx::query_as(
            "SELECT external_id FROM entity_mappings
             WHERE user_id = ? AND provider = ? AND entity_kind = ? AND local_id = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .bind(kind.as_str())
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(external_id.map(|(id,)| id))
    }

    async fn link(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        external_id: &str,
        local_id: &str,
        external_parent_id: Option<&str>,
    ) -> Result<()> {
        // The local side is not part of the primary key, so a duplicate
        // link for an already-mapped local entity has to be checked here.
        if self
            .find_external(user_id, provider, kind, local_id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let result = sqlx::query(
            "INSERT INTO entity_mappings
                 (user_id, provider, entity_kind, external_id, local_id,
                  external_parent_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id, provider, entity_kind, external_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .bind(kind.as_str())
        .bind(external_id)
        .bind(local_id)
        .bind(external_parent_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(
                user_id = %user_id,
                kind = %kind,
                external_id = %external_id,
                local_id = %local_id,
                "Linked entities"
            );
        }

        Ok(())
    }

    async fn unlink(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
        external_id: &str,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM entity_mappings
             WHERE user_id = ? AND provider = ? AND entity_kind = ? AND external_id = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .bind(kind.as_str())
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        user_id: &str,
        provider: ProviderKind,
        kind: EntityKind,
    ) -> Result<Vec<EntityMapping>> {
        let rows = sqlx::query_as::<_, EntityMappingRow>(
            "SELECT user_id, provider, entity_kind, external_id, local_id,
                    external_parent_id, created_at
             FROM entity_mappings
             WHERE user_id = ? AND provider = ? AND entity_kind = ?
             ORDER BY created_at, external_id",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EntityMapping::try_from).collect()
    }
}

// ============================================================================
// Per-pass in-memory state
// ============================================================================

/// Transient translation state for one sync pass.
///
/// Rebuilt from `entity_mappings` (plus the remote snapshot, for label
/// names) at the start of every pass; entity_mappings stays the single
/// source of truth.
#[derive(Debug, Default)]
pub struct MappingState {
    /// External project id → local list id
    list_by_project: HashMap<String, String>,
    /// Local list id → external project id
    project_by_list: HashMap<String, String>,
    /// External label id → local list id (label-as-list assignments)
    list_by_label: HashMap<String, String>,
    /// External label name → local list id
    list_by_label_name: HashMap<String, String>,
    /// Local list id → external label name
    label_name_by_list: HashMap<String, String>,
    /// Local label id → external label name
    label_name_by_local: HashMap<String, String>,
    /// External label name → local label id
    local_label_by_name: HashMap<String, String>,
}

impl MappingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a project↔list assignment
    pub fn assign_project(&mut self, external_project_id: impl Into<String>, list_id: impl Into<String>) {
        let external_project_id = external_project_id.into();
        let list_id = list_id.into();
        self.project_by_list
            .insert(list_id.clone(), external_project_id.clone());
        self.list_by_project.insert(external_project_id, list_id);
    }

    /// Record a label-as-list assignment
    pub fn assign_label_list(
        &mut self,
        external_label_id: impl Into<String>,
        label_name: impl Into<String>,
        list_id: impl Into<String>,
    ) {
        let label_name = label_name.into();
        let list_id = list_id.into();
        self.list_by_label
            .insert(external_label_id.into(), list_id.clone());
        self.list_by_label_name
            .insert(label_name.clone(), list_id.clone());
        self.label_name_by_list.insert(list_id, label_name);
    }

    /// Record a label↔label association by external name
    pub fn assign_label(&mut self, local_label_id: impl Into<String>, external_name: impl Into<String>) {
        let local_label_id = local_label_id.into();
        let external_name = external_name.into();
        self.local_label_by_name
            .insert(external_name.clone(), local_label_id.clone());
        self.label_name_by_local.insert(local_label_id, external_name);
    }

    pub fn list_for_project(&self, external_project_id: &str) -> Option<&str> {
        self.list_by_project.get(external_project_id).map(String::as_str)
    }

    pub fn project_for_list(&self, list_id: &str) -> Option<&str> {
        self.project_by_list.get(list_id).map(String::as_str)
    }

    pub fn list_for_label(&self, external_label_id: &str) -> Option<&str> {
        self.list_by_label.get(external_label_id).map(String::as_str)
    }

    pub fn list_for_label_name(&self, label_name: &str) -> Option<&str> {
        self.list_by_label_name.get(label_name).map(String::as_str)
    }

    pub fn label_name_for_list(&self, list_id: &str) -> Option<&str> {
        self.label_name_by_list.get(list_id).map(String::as_str)
    }

    pub fn external_label_name(&self, local_label_id: &str) -> Option<&str> {
        self.label_name_by_local.get(local_label_id).map(String::as_str)
    }

    pub fn local_label_for_name(&self, external_name: &str) -> Option<&str> {
        self.local_label_by_name.get(external_name).map(String::as_str)
    }
}
