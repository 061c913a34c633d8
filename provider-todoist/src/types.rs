//! Todoist API payload types
//!
//! Data structures for the Todoist REST API (unified v1). Field names
//! follow the wire format (snake_case); optional request fields are
//! omitted from the serialized body when unset, never sent as null or
//! empty placeholders.

use serde::{Deserialize, Serialize};

/// Todoist project resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoistProject {
    /// Project ID
    pub id: String,

    /// Project name
    pub name: String,

    /// Whether this is the user's Inbox project
    #[serde(default)]
    pub is_inbox_project: bool,
}

/// Todoist label resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoistLabel {
    /// Label ID
    pub id: String,

    /// Label name (labels attach to tasks by name, not id)
    pub name: String,
}

/// Due date information attached to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoistDue {
    /// Date in YYYY-MM-DD format (always present on a due object)
    pub date: String,

    /// Full RFC 3339 timestamp, present only when the due date carries a
    /// time of day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Human-readable due string ("every monday", "tomorrow")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,

    /// Whether the due date recurs
    #[serde(default)]
    pub is_recurring: bool,
}

/// Todoist task resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoistTask {
    /// Task ID
    pub id: String,

    /// Owning project ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Parent task ID for subtasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Task content (title)
    pub content: String,

    /// Task description
    #[serde(default)]
    pub description: String,

    /// Completion flag
    #[serde(default)]
    pub is_completed: bool,

    /// Attached label names
    #[serde(default)]
    pub labels: Vec<String>,

    /// Priority 1 (normal) through 4 (urgent)
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Due date, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<TodoistDue>,

    /// Completion timestamp (RFC 3339), set on completed-task listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

fn default_priority() -> u8 {
    1
}

/// A single page of a cursor-paginated listing
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub results: Vec<T>,

    /// Cursor for the next page; `None` on the last page
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Arguments for creating a task
///
/// Unset fields are omitted from the request body. `labels` in particular
/// must stay absent rather than serialize as `[]`, since an empty list
/// erases labels on the remote side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateTaskArgs {
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
}

/// Arguments for updating a task (project/parent moves use [`MoveTaskArgs`])
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTaskArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
}

/// Arguments for moving a task to another project or parent
///
/// Exactly one of the fields should be set per call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MoveTaskArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Arguments for creating or renaming a label
#[derive(Debug, Clone, Serialize)]
pub struct LabelArgs {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_task() {
        let json = r#"{
            "id": "7890",
            "project_id": "2203",
            "content": "Buy milk",
            "description": "",
            "is_completed": false,
            "labels": ["errands"],
            "priority": 3,
            "due": {
                "date": "2026-09-01",
                "string": "Sep 1",
                "is_recurring": false
            }
        }"#;

        let task: TodoistTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "7890");
        assert_eq!(task.project_id, Some("2203".to_string()));
        assert_eq!(task.content, "Buy milk");
        assert_eq!(task.priority, 3);
        assert_eq!(task.labels, vec!["errands".to_string()]);
        let due = task.due.unwrap();
        assert_eq!(due.date, "2026-09-01");
        assert!(due.datetime.is_none());
        assert!(!due.is_recurring);
    }

    #[test]
    fn test_deserialize_task_defaults() {
        let json = r#"{"id": "1", "content": "Minimal"}"#;
        let task: TodoistTask = serde_json::from_str(json).unwrap();

        assert_eq!(task.priority, 1);
        assert!(!task.is_completed);
        assert!(task.labels.is_empty());
        assert!(task.due.is_none());
    }

    #[test]
    fn test_deserialize_page() {
        let json = r#"{
            "results": [
                {"id": "p1", "name": "Inbox", "is_inbox_project": true},
                {"id": "p2", "name": "Work"}
            ],
            "next_cursor": "abc"
        }"#;

        let page: Page<TodoistProject> = serde_json::from_str(json).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.next_cursor, Some("abc".to_string()));

        let last = r#"{"results": [], "next_cursor": null}"#;
        let page: Page<TodoistProject> = serde_json::from_str(last).unwrap();
        assert!(page.results.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_create_args_omit_unset_fields() {
        let args = CreateTaskArgs {
            content: "Buy milk".to_string(),
            project_id: Some("p1".to_string()),
            ..Default::default()
        };

        let value = serde_json::to_value(&args).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get("content").unwrap(), "Buy milk");
        assert_eq!(obj.get("project_id").unwrap(), "p1");
        assert!(!obj.contains_key("labels"));
        assert!(!obj.contains_key("due_date"));
        assert!(!obj.contains_key("description"));
    }
}
