//! Codec error types for the Trellis wire format.
//!
//! A decode aborts the entire record on the first failure; there is no
//! partial or best-effort decoding.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire records.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O failure (including truncated streams).
    #[error("I/O failure during encode/decode")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// A primitive carried an unexpected type tag.
    #[error("type tag mismatch: expected {expected:#x}, found {found:#x}")]
    BadTypeTag {
        /// The expected tag value
        expected: i64,
        /// The tag value found in the stream
        found: i64,
    },

    /// A record did not start with its format tag.
    #[error("bad {record} record tag: {found:#x}")]
    BadRecordTag {
        /// The record type being decoded
        record: &'static str,
        /// The tag value found in the stream
        found: i64,
    },

    /// A record did not end with its format tag.
    #[error("bad {record} record end tag: {found:#x}")]
    BadRecordEnd {
        /// The record type being decoded
        record: &'static str,
        /// The tag value found in the stream
        found: i64,
    },

    /// A length prefix was negative (other than the `-1` absent marker)
    /// or otherwise unusable.
    #[error("invalid length prefix: {length}")]
    InvalidLength {
        /// The offending length
        length: i32,
    },

    /// An absent string where the format requires one.
    #[error("unexpected absent string for {what}")]
    UnexpectedNull {
        /// What was being decoded
        what: &'static str,
    },

    /// String payload was not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8 {
        /// The underlying conversion error
        #[from]
        source: std::string::FromUtf8Error,
    },

    /// An ordinal tag named a field this format does not carry.
    #[error("unknown field in record: {name:?}")]
    UnknownField {
        /// The unrecognized field name
        name: String,
    },

    /// An ordinal value failed to parse for its field.
    #[error("invalid {field} ordinal: {value:?}")]
    InvalidOrdinal {
        /// The field being decoded
        field: &'static str,
        /// The unparsable value
        value: String,
    },
}

impl CodecError {
    /// Check if this error indicates a corrupt or truncated stream.
    ///
    /// Everything except a genuine (non-EOF) I/O failure counts as stream
    /// corruption.
    pub fn is_corrupt_stream(&self) -> bool {
        match self {
            CodecError::Io { source } => source.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => true,
        }
    }

    /// Check if this error is an underlying I/O failure.
    pub fn is_io_error(&self) -> bool {
        matches!(self, CodecError::Io { .. })
    }
}

// Conversion from CodecError to the main Error type
impl From<CodecError> for crate::Error {
    fn from(err: CodecError) -> Self {
        crate::Error::Codec(err)
    }
}
