//! # Todoist Provider
//!
//! Client for the Todoist REST API (unified v1).
//!
//! ## Overview
//!
//! This module provides:
//! - Cursor-paginated listing of projects, labels, and tasks
//! - Completed-task listing since a timestamp
//! - Task create/update/move/close/reopen/delete and label create/update
//! - Automatic retry with `Retry-After` support for rate limits and
//!   transient server errors

pub mod client;
pub mod error;
pub mod types;

pub use client::TodoistClient;
pub use error::{Result, TodoistError};
