//! Renderer error types.

use oral_canvas_core::CanvasError;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while painting, loading, or exporting.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The license tier does not allow the requested background.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An image could not be fetched or decoded.
    #[error("Failed to load resource: {0}")]
    ResourceLoad(String),

    /// No layer has the given name.
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// A pixel buffer could not be allocated.
    #[error("Surface error: {0}")]
    Surface(String),

    /// Flattening or encoding the export image failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Data-model error.
    #[error(transparent)]
    Core(CanvasError),
}

impl From<CanvasError> for RenderError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_lifted() {
        let err: RenderError = CanvasError::PermissionDenied("premium".into()).into();
        assert!(matches!(err, RenderError::PermissionDenied(_)));
        let err: RenderError = CanvasError::MalformedSnapshot("x".into()).into();
        assert!(matches!(err, RenderError::Core(CanvasError::MalformedSnapshot(_))));
    }
}
