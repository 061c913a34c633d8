//! Error types for the Todoist provider

use thiserror::Error;

/// Todoist provider errors
#[derive(Error, Debug)]
pub enum TodoistError {
    /// API request returned a non-success status
    #[error("Todoist API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge/transport error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

impl TodoistError {
    /// Whether the error is worth retrying.
    ///
    /// 429 (rate limited) and 5xx are transient; every other client error
    /// is permanent and must surface after a single attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TodoistError::ApiError { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            TodoistError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for Todoist operations
pub type Result<T> = std::result::Result<T, TodoistError>;

impl From<TodoistError> for bridge_traits::error::BridgeError {
    fn from(error: TodoistError) -> Self {
        match error {
            TodoistError::ApiError { status, message } => {
                bridge_traits::error::BridgeError::OperationFailed(format!(
                    "API error (status {}): {}",
                    status, message
                ))
            }
            TodoistError::ParseError(msg) => {
                bridge_traits::error::BridgeError::OperationFailed(format!(
                    "Parse error: {}",
                    msg
                ))
            }
            TodoistError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TodoistError::ApiError {
            status: 404,
            message: "Task not found".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Todoist API error (status 404): Task not found"
        );
    }

    #[test]
    fn test_retryable_classification() {
        let rate_limited = TodoistError::ApiError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        let server = TodoistError::ApiError {
            status: 503,
            message: "Service unavailable".to_string(),
        };
        let bad_request = TodoistError::ApiError {
            status: 400,
            message: "Invalid content".to_string(),
        };

        assert!(rate_limited.is_retryable());
        assert!(server.is_retryable());
        assert!(!bad_request.is_retryable());
    }
}
