//! Error types for the sync engine

use thiserror::Error;

/// Sync engine errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// No provider integration is connected for the user
    #[error("No {provider} integration connected for user {user_id}")]
    NoIntegration { user_id: String, provider: String },

    /// A sync pass is already running for the user
    #[error("Sync already in progress for user {user_id}")]
    SyncInProgress { user_id: String },

    /// Remote provider operation failed
    #[error("Provider error: {0}")]
    Provider(#[from] provider_todoist::TodoistError),

    /// Bridge/transport or crypto error
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),

    /// Local task store error
    #[error("Task store error: {0}")]
    TaskStore(#[from] core_tasks::TaskStoreError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload snapshot serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or stored value
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
