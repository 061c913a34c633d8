//! # Local Task Store
//!
//! Owns the local task database schema and provides repository patterns for
//! data access.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and migrations for lists, labels, and tasks (plus the
//!   sync-engine tables layered on the same database)
//! - Repository traits and SQLite implementations for the entities the sync
//!   engine reads and writes
//! - Connection-pool helpers, including an in-memory pool for tests

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{Result, TaskStoreError};
pub use models::{DuePrecision, Label, Priority, Task, TaskList};
pub use repositories::{
    LabelRepository, ListRepository, SqliteLabelRepository, SqliteListRepository,
    SqliteTaskRepository, TaskRepository,
};
