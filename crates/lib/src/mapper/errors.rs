//! Storage mapper error types.
//!
//! This module defines structured error types for persistence operations,
//! providing better error context and type safety compared to
//! string-based errors. Backend-specific failures are wrapped, never
//! swallowed.

use thiserror::Error;

/// Errors that can occur during storage mapper operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MapperError {
    /// The path does not conform to the path syntax.
    #[error("invalid path: {path:?}")]
    InvalidPath {
        /// The offending path
        path: String,
    },

    /// No node is stored under the path.
    #[error("node not found: {path}")]
    NotFound {
        /// The path that was not found
        path: String,
    },

    /// A live node is already stored under the path.
    #[error("node already exists: {path}")]
    AlreadyExists {
        /// The conflicting path
        path: String,
    },

    /// The parent of the path does not exist.
    #[error("parent node \"{parent}\" does not exist")]
    ParentMissing {
        /// The missing parent path
        parent: String,
    },

    /// The node still has live children and cannot be removed.
    #[error("node has children, cannot remove: {path}")]
    HasChildren {
        /// The path of the non-leaf node
        path: String,
    },

    /// Skeleton nodes carry no content and cannot be stored.
    #[error("skeleton nodes cannot be stored: {path}")]
    SkeletonWrite {
        /// The path of the skeleton node
        path: String,
    },

    /// Failure in the underlying storage backend.
    #[error("storage backend failure: {message}")]
    Backend {
        /// Description of the failure
        message: String,
        /// The underlying driver/I/O error, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl MapperError {
    /// Backend failure wrapping an underlying error.
    pub fn backend(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MapperError::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if this error indicates a missing node.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MapperError::NotFound { .. })
    }

    /// Check if this error indicates a conflicting node.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, MapperError::AlreadyExists { .. })
    }

    /// Check if this error indicates a missing parent.
    pub fn is_parent_missing(&self) -> bool {
        matches!(self, MapperError::ParentMissing { .. })
    }

    /// Check if this error indicates a refused non-leaf delete.
    pub fn is_has_children(&self) -> bool {
        matches!(self, MapperError::HasChildren { .. })
    }

    /// Check if this error indicates a malformed path.
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, MapperError::InvalidPath { .. })
    }

    /// Check if this error wraps a backend failure.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, MapperError::Backend { .. })
    }
}

// Conversion from MapperError to the main Error type
impl From<MapperError> for crate::Error {
    fn from(err: MapperError) -> Self {
        crate::Error::Mapper(err)
    }
}
