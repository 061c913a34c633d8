//! # Sync Engine
//!
//! Reconciles the local task store with the Todoist provider: durable
//! identity mappings, conflict detection and quarantine, field
//! translation, and the per-user sync orchestration pipeline.
//!
//! ## Architecture
//!
//! - [`state`] — per-user sync state machine (`idle → syncing → {idle, error}`)
//! - [`integration`] — stored, encrypted provider credentials
//! - [`mapping`] — persistent local↔external entity mapper and the
//!   per-pass [`mapping::MappingState`]
//! - [`translate`] — pure field translation between representations
//! - [`conflict`] — fingerprint comparison and conflict persistence
//! - [`orchestrator`] — drives one full pass per user

pub mod conflict;
pub mod error;
pub mod integration;
pub mod mapping;
pub mod orchestrator;
pub mod state;
pub mod translate;

pub use conflict::{
    ConflictDetector, ConflictRepository, ConflictStatus, SqliteConflictRepository, SyncConflict,
    TaskFingerprint,
};
pub use error::{Result, SyncError};
pub use integration::{Integration, IntegrationRepository, SqliteIntegrationRepository};
pub use mapping::{EntityKind, EntityMapper, EntityMapping, MappingState, SqliteEntityMapper};
pub use orchestrator::{SyncConfig, SyncOrchestrator, SyncOutcome};
pub use state::{ProviderKind, SqliteSyncStateRepository, SyncState, SyncStateRepository, SyncStatus};
