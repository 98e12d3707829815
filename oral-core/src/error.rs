//! Error types for canvas data-model operations.

use thiserror::Error;

/// Result type for canvas data-model operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors that can occur in canvas data-model operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The element type name is not one of `freedraw`, `stamp`, `text`.
    #[error("Unknown element type: {0}")]
    UnknownElementType(String),

    /// Element not found in its type bucket.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Invalid element operation (empty stroke, empty label, mismatched patch).
    #[error("Invalid operation on element: {0}")]
    InvalidOperation(String),

    /// The active license tier does not allow the requested background.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Snapshot input could not be parsed.
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Advisory persistence failed. Only ever logged by the store observers.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
