//! Field translation between local and remote task representations
//!
//! Pure functions, no I/O. Both directions are round-trip stable for the
//! fields both sides represent: title, description, completion, and
//! day-granularity due dates.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use core_tasks::{DuePrecision, Priority, Task};
use provider_todoist::types::{CreateTaskArgs, TodoistTask, UpdateTaskArgs};

use crate::mapping::MappingState;

/// Local fields derived from a remote task, ready to apply to a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTaskFields {
    /// Resolved local list, when the remote project or a label-as-list
    /// assignment maps to one
    pub list_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_at: Option<DateTime<Utc>>,
    pub due_precision: Option<DuePrecision>,
    pub recurrence: Option<String>,
    /// Resolved local label ids (list-assignment labels excluded)
    pub label_ids: Vec<String>,
}

// ============================================================================
// Priority scale
// ============================================================================

/// Map local priority to the remote 1..=4 scale.
///
/// The remote side has no "none" level, so local `None` maps to the lowest
/// remote integer.
pub fn priority_to_remote(priority: Priority) -> u8 {
    match priority {
        Priority::None => 1,
        Priority::Low => 2,
        Priority::Medium => 3,
        Priority::High => 4,
    }
}

/// Map a remote 1..=4 priority to the local scale
pub fn priority_to_local(value: u8) -> Priority {
    match value {
        2 => Priority::Low,
        3 => Priority::Medium,
        4 => Priority::High,
        _ => Priority::None,
    }
}

// ============================================================================
// Due dates
// ============================================================================

#[derive(Debug, Default)]
struct RemoteDueFields {
    due_date: Option<String>,
    due_datetime: Option<String>,
    due_string: Option<String>,
}

/// A recurring task emits its rule as a natural-language due string; a
/// day-precision timestamp emits a date-only field; anything else emits a
/// full datetime.
fn due_to_remote(task: &Task) -> RemoteDueFields {
    if let Some(rule) = &task.recurrence {
        return RemoteDueFields {
            due_string: Some(rule.clone()),
            ..Default::default()
        };
    }

    match task.due_at {
        Some(due_at) if task.is_due_day_precision() => RemoteDueFields {
            due_date: Some(due_at.format("%Y-%m-%d").to_string()),
            ..Default::default()
        },
        Some(due_at) => RemoteDueFields {
            due_datetime: Some(due_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ..Default::default()
        },
        None => RemoteDueFields::default(),
    }
}

fn parse_due_date(date: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(DateTime::from_naive_utc_and_offset(
        naive.and_hms_opt(0, 0, 0)?,
        Utc,
    ))
}

// ============================================================================
// Labels
// ============================================================================

/// Resolve the label names to emit on a remote payload.
///
/// Per-task label ids resolve through the mapping state; when the task's
/// list is mapped through a label rather than a project, that list label
/// is merged in. Returns `None` when nothing resolves so the field is
/// omitted entirely: an empty set on update would erase remote-only
/// labels.
fn labels_to_remote(task: &Task, label_ids: &[String], state: &MappingState) -> Option<Vec<String>> {
    let mut names: Vec<String> = label_ids
        .iter()
        .filter_map(|id| state.external_label_name(id))
        .map(str::to_string)
        .collect();

    if state.project_for_list(&task.list_id).is_none() {
        if let Some(list_label) = state.label_name_for_list(&task.list_id) {
            if !names.iter().any(|n| n == list_label) {
                names.push(list_label.to_string());
            }
        }
    }

    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

// ============================================================================
// Task translation
// ============================================================================

/// Build a remote create payload from a local task
pub fn task_to_remote(task: &Task, label_ids: &[String], state: &MappingState) -> CreateTaskArgs {
    let due = due_to_remote(task);

    CreateTaskArgs {
        content: task.title.clone(),
        description: task.description.clone(),
        project_id: state.project_for_list(&task.list_id).map(str::to_string),
        parent_id: None,
        priority: Some(priority_to_remote(task.priority)),
        labels: labels_to_remote(task, label_ids, state),
        due_date: due.due_date,
        due_datetime: due.due_datetime,
        due_string: due.due_string,
    }
}

/// Build a remote update payload from a local task
pub fn task_to_remote_update(
    task: &Task,
    label_ids: &[String],
    state: &MappingState,
) -> UpdateTaskArgs {
    let due = due_to_remote(task);

    UpdateTaskArgs {
        content: Some(task.title.clone()),
        description: Some(task.description.clone().unwrap_or_default()),
        priority: Some(priority_to_remote(task.priority)),
        labels: labels_to_remote(task, label_ids, state),
        due_date: due.due_date,
        due_datetime: due.due_datetime,
        due_string: due.due_string,
    }
}

/// Derive local task fields from a remote task.
///
/// Due precision is `Day` when the remote due carries no time component.
/// The list id resolves by project first, falling back to the first label
/// with a list assignment.
pub fn task_to_local(remote: &TodoistTask, state: &MappingState) -> LocalTaskFields {
    let list_id = remote
        .project_id
        .as_deref()
        .and_then(|p| state.list_for_project(p))
        .or_else(|| {
            remote
                .labels
                .iter()
                .find_map(|name| state.list_for_label_name(name))
        })
        .map(str::to_string);

    let mut due_at = None;
    let mut due_precision = None;
    let mut recurrence = None;
    if let Some(due) = &remote.due {
        if due.is_recurring {
            recurrence = due.string.clone();
        }
        if let Some(datetime) = &due.datetime {
            due_at = DateTime::parse_from_rfc3339(datetime)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        } else if let Some(parsed) = parse_due_date(&due.date) {
            due_at = Some(parsed);
            due_precision = Some(DuePrecision::Day);
        }
    }

    let label_ids = remote
        .labels
        .iter()
        .filter(|name| state.list_for_label_name(name).is_none())
        .filter_map(|name| state.local_label_for_name(name))
        .map(str::to_string)
        .collect();

    LocalTaskFields {
        list_id,
        title: remote.content.clone(),
        description: if remote.description.is_empty() {
            None
        } else {
            Some(remote.description.clone())
        },
        completed: remote.is_completed,
        priority: priority_to_local(remote.priority),
        due_at,
        due_precision,
        recurrence,
        label_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use provider_todoist::types::TodoistDue;

    fn state_with_project() -> MappingState {
        let mut state = MappingState::new();
        state.assign_project("p1", "l1");
        state
    }

    fn day_due(date: &str) -> Option<TodoistDue> {
        Some(TodoistDue {
            date: date.to_string(),
            datetime: None,
            string: None,
            is_recurring: false,
        })
    }

    #[test]
    fn test_priority_bijection() {
        for p in [
            Priority::None,
            Priority::Low,
            Priority::Medium,
            Priority::High,
        ] {
            assert_eq!(priority_to_local(priority_to_remote(p)), p);
        }
        assert_eq!(priority_to_remote(Priority::None), 1);
        assert_eq!(priority_to_local(0), Priority::None);
        assert_eq!(priority_to_local(9), Priority::None);
    }

    #[test]
    fn test_day_precision_emits_date_only() {
        let mut task = Task::new("u1", "l1", "Water plants");
        task.due_at = Some(Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
        task.due_precision = Some(DuePrecision::Day);

        let args = task_to_remote(&task, &[], &state_with_project());
        assert_eq!(args.due_date, Some("2026-09-01".to_string()));
        assert!(args.due_datetime.is_none());
        assert!(args.due_string.is_none());
    }

    #[test]
    fn test_timestamp_emits_datetime() {
        let mut task = Task::new("u1", "l1", "Call dentist");
        task.due_at = Some(Utc.with_ymd_and_hms(2026, 9, 1, 14, 30, 0).unwrap());

        let args = task_to_remote(&task, &[], &state_with_project());
        assert!(args.due_date.is_none());
        assert_eq!(args.due_datetime, Some("2026-09-01T14:30:00Z".to_string()));
    }

    #[test]
    fn test_recurring_rule_emits_due_string() {
        let mut task = Task::new("u1", "l1", "Take out trash");
        task.recurrence = Some("every monday".to_string());
        task.due_at = Some(Utc.with_ymd_and_hms(2026, 9, 7, 0, 0, 0).unwrap());
        task.due_precision = Some(DuePrecision::Day);

        let args = task_to_remote(&task, &[], &state_with_project());
        assert_eq!(args.due_string, Some("every monday".to_string()));
        assert!(args.due_date.is_none());
        assert!(args.due_datetime.is_none());
    }

    #[test]
    fn test_unresolved_labels_are_omitted_not_empty() {
        let task = Task::new("u1", "l1", "Buy milk");
        let label_ids = vec!["unknown-label".to_string()];

        let args = task_to_remote(&task, &label_ids, &state_with_project());
        assert!(args.labels.is_none());

        let update = task_to_remote_update(&task, &label_ids, &state_with_project());
        assert!(update.labels.is_none());
    }

    #[test]
    fn test_resolved_labels_merge_with_list_label() {
        let mut state = MappingState::new();
        state.assign_label_list("lab_1", "work", "l1");
        state.assign_label("local_lab", "errands");

        let task = Task::new("u1", "l1", "Buy milk");
        let args = task_to_remote(&task, &["local_lab".to_string()], &state);

        assert!(args.project_id.is_none());
        let labels = args.labels.unwrap();
        assert!(labels.contains(&"errands".to_string()));
        assert!(labels.contains(&"work".to_string()));
    }

    #[test]
    fn test_to_local_resolves_list_by_project_then_label() {
        let mut state = MappingState::new();
        state.assign_project("p1", "l1");
        state.assign_label_list("lab_1", "work", "l2");

        let mut remote = TodoistTask {
            id: "ext_1".to_string(),
            project_id: Some("p1".to_string()),
            parent_id: None,
            content: "Buy milk".to_string(),
            description: String::new(),
            is_completed: false,
            labels: vec!["work".to_string()],
            priority: 1,
            due: None,
            completed_at: None,
        };

        let fields = task_to_local(&remote, &state);
        assert_eq!(fields.list_id, Some("l1".to_string()));
        // The list-assignment label is not a plain task label
        assert!(fields.label_ids.is_empty());

        remote.project_id = Some("unmapped".to_string());
        let fields = task_to_local(&remote, &state);
        assert_eq!(fields.list_id, Some("l2".to_string()));
    }

    #[test]
    fn test_to_local_day_precision() {
        let remote = TodoistTask {
            id: "ext_1".to_string(),
            project_id: None,
            parent_id: None,
            content: "Water plants".to_string(),
            description: String::new(),
            is_completed: false,
            labels: vec![],
            priority: 1,
            due: day_due("2026-09-01"),
            completed_at: None,
        };

        let fields = task_to_local(&remote, &MappingState::new());
        assert_eq!(fields.due_precision, Some(DuePrecision::Day));
        assert_eq!(
            fields.due_at,
            Some(Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_round_trip_preserves_shared_fields() {
        let state = state_with_project();

        let mut task = Task::new("u1", "l1", "Buy milk");
        task.description = Some("2 liters".to_string());
        task.due_at = Some(Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
        task.due_precision = Some(DuePrecision::Day);

        let args = task_to_remote(&task, &[], &state);
        let remote = TodoistTask {
            id: "ext_1".to_string(),
            project_id: args.project_id.clone(),
            parent_id: None,
            content: args.content.clone(),
            description: args.description.clone().unwrap_or_default(),
            is_completed: false,
            labels: args.labels.clone().unwrap_or_default(),
            priority: args.priority.unwrap_or(1),
            due: args.due_date.as_deref().and_then(|d| day_due(d)),
            completed_at: None,
        };

        let fields = task_to_local(&remote, &state);
        assert_eq!(fields.title, task.title);
        assert_eq!(fields.description, task.description);
        assert_eq!(fields.completed, task.completed);
        assert_eq!(fields.due_at, task.due_at);
        assert_eq!(fields.due_precision, task.due_precision);
        assert_eq!(fields.list_id, Some(task.list_id));
    }
}
