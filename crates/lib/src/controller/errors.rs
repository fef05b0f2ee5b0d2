//! Controller error types.

use thiserror::Error;

/// Errors that can occur during controller orchestration.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A cascading update visited more nodes than the configured bound.
    ///
    /// Children committed before the bound was hit stay committed; the
    /// remainder of the payload is not applied.
    #[error("cascade limit of {limit} nodes exceeded below {path}")]
    CascadeLimitExceeded {
        /// The configured node bound
        limit: usize,
        /// Path of the node whose payload exceeded the bound
        path: String,
    },

    /// The controller backing a loader handle has been dropped.
    #[error("controller is gone; skeleton nodes can no longer be resolved")]
    ControllerGone,
}

impl ControllerError {
    /// Check if this error indicates the cascade bound was hit.
    pub fn is_cascade_limit(&self) -> bool {
        matches!(self, ControllerError::CascadeLimitExceeded { .. })
    }

    /// Check if this error indicates a dangling loader handle.
    pub fn is_controller_gone(&self) -> bool {
        matches!(self, ControllerError::ControllerGone)
    }
}

// Conversion from ControllerError to the main Error type
impl From<ControllerError> for crate::Error {
    fn from(err: ControllerError) -> Self {
        crate::Error::Controller(err)
    }
}
