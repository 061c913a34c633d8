//! Repository traits and SQLite implementations for the local task store

mod label;
mod list;
mod task;

pub use label::{LabelRepository, SqliteLabelRepository};
pub use list::{ListRepository, SqliteListRepository};
pub use task::{SqliteTaskRepository, TaskRepository};
