//! Search error types.

use thiserror::Error;

/// Errors that can occur while evaluating search criteria.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SearchError {
    /// A criteria field holds a malformed regular expression.
    #[error("invalid pattern for {field}: {pattern:?}")]
    InvalidPattern {
        /// The field the pattern was set for
        field: String,
        /// The offending pattern
        pattern: String,
        /// The underlying regex error
        #[source]
        source: regex::Error,
    },
}

impl SearchError {
    /// Check if this error is a pattern syntax failure.
    pub fn is_invalid_pattern(&self) -> bool {
        matches!(self, SearchError::InvalidPattern { .. })
    }
}

// Conversion from SearchError to the main Error type
impl From<SearchError> for crate::Error {
    fn from(err: SearchError) -> Self {
        crate::Error::Search(err)
    }
}
