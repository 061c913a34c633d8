//! Domain models for the local task store
//!
//! Rich domain types with validation; database row mapping lives in the
//! repository layer.

use crate::error::TaskStoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Enumerations
// =============================================================================

/// Task priority on the local four-level scale.
///
/// `None` is a real level locally; the remote provider has no equivalent and
/// the translator maps it to the lowest remote integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = TaskStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Priority::None),
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(TaskStoreError::InvalidInput {
                field: "priority".to_string(),
                message: format!("Unknown priority: {}", s),
            }),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Precision of a stored due timestamp.
///
/// `Day` marks a date-only due value; absence means the full timestamp is
/// meaningful to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuePrecision {
    Day,
}

impl DuePrecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuePrecision::Day => "day",
        }
    }
}

impl FromStr for DuePrecision {
    type Err = TaskStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(DuePrecision::Day),
            _ => Err(TaskStoreError::InvalidInput {
                field: "due_precision".to_string(),
                message: format!("Unknown due precision: {}", s),
            }),
        }
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TaskList {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Timestamps
    pub created_at: i64,
    pub updated_at: i64,
}

impl TaskList {
    /// Create a new list
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize a name for case-insensitive matching
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

/// A label attachable to tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Label {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Optional display color
    pub color: Option<String>,
    /// Timestamps
    pub created_at: i64,
    pub updated_at: i64,
}

impl Label {
    /// Create a new label
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            color: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A task with scheduling metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// List this task belongs to
    pub list_id: String,
    /// Parent task for subtasks
    pub parent_id: Option<String>,
    /// Task title
    pub title: String,
    /// Longer free-form description
    pub description: Option<String>,
    /// Completion flag
    pub completed: bool,
    /// When the task was completed
    pub completed_at: Option<i64>,
    /// Priority level
    pub priority: Priority,
    /// Due timestamp (UTC)
    pub due_at: Option<DateTime<Utc>>,
    /// Precision of the due timestamp (`Day` for date-only values)
    pub due_precision: Option<DuePrecision>,
    /// Recurrence rule in provider natural-language form
    pub recurrence: Option<String>,
    /// Timestamps
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Create a new task in the given list
    pub fn new(
        user_id: impl Into<String>,
        list_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            list_id: list_id.into(),
            parent_id: None,
            title: title.into(),
            description: None,
            completed: false,
            completed_at: None,
            priority: Priority::None,
            due_at: None,
            due_precision: None,
            recurrence: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate task data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Task title cannot be empty".to_string());
        }

        if self.completed && self.completed_at.is_none() {
            return Err("Completed task must carry a completion timestamp".to_string());
        }

        if self.due_precision.is_some() && self.due_at.is_none() {
            return Err("Due precision requires a due timestamp".to_string());
        }

        Ok(())
    }

    /// Whether the due value is date-only
    pub fn is_due_day_precision(&self) -> bool {
        matches!(self.due_precision, Some(DuePrecision::Day))
    }
}
