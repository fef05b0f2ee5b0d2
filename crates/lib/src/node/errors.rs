//! Node error types for the Trellis data model.
//!
//! This module defines structured error types for node and value
//! operations, providing better error context and type safety compared to
//! string-based errors.

use thiserror::Error;

/// Errors that can occur while manipulating nodes and node values.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodeError {
    /// A value with this key is already present on the node.
    #[error("value \"{key}\" already exists on {path}")]
    ValueAlreadyExists {
        /// Key of the conflicting value
        key: String,
        /// Path of the owning node
        path: String,
    },

    /// No value with this key is present on the node.
    #[error("value \"{key}\" does not exist on {path}")]
    ValueNotFound {
        /// Key of the missing value
        key: String,
        /// Path of the owning node
        path: String,
    },

    /// A localized string was set before its default-locale base entry.
    #[error("no \"{default}\" translation present; set the default locale before \"{locale}\"")]
    MissingDefaultTranslation {
        /// The locale tag that was being set
        locale: String,
        /// The required default locale tag
        default: String,
    },

    /// The loader capability backing a skeleton node is gone.
    #[error("no loader available to materialize skeleton node {path}")]
    LoaderUnavailable {
        /// Path of the skeleton node
        path: String,
    },

    /// A loader handed back something other than a materialized node.
    #[error("materialization of {path} produced another skeleton")]
    MaterializeFailed {
        /// Path of the skeleton node
        path: String,
    },
}

impl NodeError {
    /// Check if this error is a value-level precondition failure.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(
            self,
            NodeError::ValueAlreadyExists { .. }
                | NodeError::ValueNotFound { .. }
                | NodeError::MissingDefaultTranslation { .. }
        )
    }

    /// Check if this error indicates a missing value.
    pub fn is_value_not_found(&self) -> bool {
        matches!(self, NodeError::ValueNotFound { .. })
    }

    /// Check if this error indicates a conflicting value key.
    pub fn is_value_already_exists(&self) -> bool {
        matches!(self, NodeError::ValueAlreadyExists { .. })
    }

    /// Check if this error is a materialization failure.
    pub fn is_materialization_error(&self) -> bool {
        matches!(
            self,
            NodeError::LoaderUnavailable { .. } | NodeError::MaterializeFailed { .. }
        )
    }
}

// Conversion from NodeError to the main Error type
impl From<NodeError> for crate::Error {
    fn from(err: NodeError) -> Self {
        crate::Error::Node(err)
    }
}
