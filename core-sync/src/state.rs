//! Per-user sync state machine and its persistence
//!
//! One `sync_states` row per (user, provider), overwritten at the start
//! and end of every pass. A pass always terminates in `idle` or `error`,
//! never leaves `syncing` behind on a handled path.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SyncError};

// ============================================================================
// Provider
// ============================================================================

/// External task service being synchronized against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Todoist,
}

impl ProviderKind {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Todoist => "todoist",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "todoist" => Ok(ProviderKind::Todoist),
            _ => Err(SyncError::InvalidInput {
                field: "provider".to_string(),
                message: format!("Unknown provider: {}", s),
            }),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Sync pass status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
}

impl SyncStatus {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Error => "error",
        }
    }

    /// Whether a transition to `next` is valid.
    ///
    /// A pass moves idle/error → syncing → {idle, error}; everything else
    /// is a programming error.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        matches!(
            (self, next),
            (SyncStatus::Idle, SyncStatus::Syncing)
                | (SyncStatus::Error, SyncStatus::Syncing)
                | (SyncStatus::Syncing, SyncStatus::Idle)
                | (SyncStatus::Syncing, SyncStatus::Error)
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(SyncStatus::Idle),
            "syncing" => Ok(SyncStatus::Syncing),
            "error" => Ok(SyncStatus::Error),
            _ => Err(SyncError::InvalidInput {
                field: "status".to_string(),
                message: format!("Unknown sync status: {}", s),
            }),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Persisted sync state for one (user, provider)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub user_id: String,
    pub provider: ProviderKind,
    pub status: SyncStatus,
    pub last_synced_at: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Debug, FromRow)]
struct SyncStateRow {
    user_id: String,
    provider: String,
    status: String,
    last_synced_at: Option<i64>,
    error_message: Option<String>,
}

impl TryFrom<SyncStateRow> for SyncState {
    type Error = SyncError;

    fn try_from(row: SyncStateRow) -> Result<Self> {
        Ok(SyncState {
            user_id: row.user_id,
            provider: row.provider.parse()?,
            status: row.status.parse()?,
            last_synced_at: row.last_synced_at,
            error_message: row.error_message,
        })
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Repository for sync state persistence
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Find the state row for a (user, provider)
    async fn find(&self, user_id: &str, provider: ProviderKind) -> Result<Option<SyncState>>;

    /// Insert or overwrite the state row for a (user, provider)
    async fn upsert(&self, state: &SyncState) -> Result<()>;
}

/// SQLite implementation of SyncStateRepository
pub struct SqliteSyncStateRepository {
    pool: SqlitePool,
}

impl SqliteSyncStateRepository {
    /// Create a new SQLite sync state repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStateRepository for SqliteSyncStateRepository {
    async fn find(&self, user_id: &str, provider: ProviderKind) -> Result<Option<SyncState>> {
        let row = sqlx::query_as::<_, SyncStateRow>(
            "SELECT user_id, provider, status, last_synced_at, error_message
             FROM sync_states WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncState::try_from).transpose()
    }

    async fn upsert(&self, state: &SyncState) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_states (user_id, provider, status, last_synced_at, error_message)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (user_id, provider) DO UPDATE SET
                 status = excluded.status,
                 last_synced_at = excluded.last_synced_at,
                 error_message = excluded.error_message",
        )
        .bind(&state.user_id)
        .bind(state.provider.as_str())
        .bind(state.status.as_str())
        .bind(state.last_synced_at)
        .bind(&state.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
