//!
//! Trellis: an embeddable, hierarchically-addressed key/value storage
//! engine built for partial replication between devices.
//!
//! ## Core Concepts
//!
//! * **Nodes (`node::Node`)**: the tree entity, addressed by `:`-delimited
//!   paths, holding ordinal fields, localized key/value pairs
//!   (`node::NodeValue`), and child references.
//! * **Skeletons and tombstones**: nodes can exist as lightweight
//!   references that lazily materialize through a `node::NodeLoader`
//!   capability, and deletions leave tombstones so deletion state itself
//!   can propagate between partially replicated stores.
//! * **Mappers (`mapper::StorageMapper`)**: a pluggable persistence layer.
//!   This crate ships the in-memory reference implementation; SQL-backed
//!   mappers implement the same trait externally.
//! * **Controller (`controller::Controller`)**: the interaction API. It
//!   orchestrates all mutation, enforces owner defaulting and the
//!   clone-then-mutate discipline, bootstraps the base tree, and drives
//!   change notification.
//! * **Search (`search::SearchCriteria`)**: a sparse regex field matcher
//!   serving both ad-hoc queries and change-listener filters
//!   (`events::ChangeListener`).
//! * **Wire codec (`codec`)**: a length-prefixed, type-tagged binary
//!   format for nodes, values, and criteria, with integrity-checked
//!   record framing.

pub mod clock;
pub mod codec;
pub mod constants;
pub mod controller;
pub mod events;
pub mod mapper;
pub mod node;
pub mod path;
pub mod search;

pub use clock::{Clock, SystemClock};
pub use controller::Controller;
pub use events::{ChangeListener, EventType};
pub use mapper::{InMemoryMapper, StorageMapper};
pub use node::{Field, Node, NodeLoader, NodeValue, Visibility};
pub use search::SearchCriteria;

#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;

/// Result type used throughout the Trellis library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Trellis library.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured node/value errors from the node module
    #[error(transparent)]
    Node(node::NodeError),

    /// Structured persistence errors from the mapper module
    #[error(transparent)]
    Mapper(mapper::MapperError),

    /// Structured wire-format errors from the codec module
    #[error(transparent)]
    Codec(codec::CodecError),

    /// Structured orchestration errors from the controller module
    #[error(transparent)]
    Controller(controller::ControllerError),

    /// Structured criteria errors from the search module
    #[error(transparent)]
    Search(search::SearchError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Node(_) => "node",
            Error::Mapper(_) => "mapper",
            Error::Codec(_) => "codec",
            Error::Controller(_) => "controller",
            Error::Search(_) => "search",
        }
    }

    /// Check if this error indicates a node was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Mapper(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflicting node.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Error::Mapper(e) => e.is_already_exists(),
            _ => false,
        }
    }

    /// Check if this error indicates a missing parent node.
    pub fn is_parent_missing(&self) -> bool {
        match self {
            Error::Mapper(e) => e.is_parent_missing(),
            _ => false,
        }
    }

    /// Check if this error indicates a refused non-leaf delete.
    pub fn is_has_children(&self) -> bool {
        match self {
            Error::Mapper(e) => e.is_has_children(),
            _ => false,
        }
    }

    /// Check if this error indicates a malformed path.
    pub fn is_invalid_path(&self) -> bool {
        match self {
            Error::Mapper(e) => e.is_invalid_path(),
            _ => false,
        }
    }

    /// Check if this error indicates a corrupt or truncated wire stream.
    pub fn is_corrupt_stream(&self) -> bool {
        match self {
            Error::Codec(e) => e.is_corrupt_stream(),
            _ => false,
        }
    }

    /// Check if this error is a value-level precondition failure.
    pub fn is_precondition_failed(&self) -> bool {
        match self {
            Error::Node(e) => e.is_precondition_failed(),
            _ => false,
        }
    }

    /// Check if this error wraps a storage backend failure.
    pub fn is_backend_error(&self) -> bool {
        match self {
            Error::Mapper(e) => e.is_backend_error(),
            _ => false,
        }
    }

    /// Check if this error indicates the cascade bound was hit.
    pub fn is_cascade_limit(&self) -> bool {
        match self {
            Error::Controller(e) => e.is_cascade_limit(),
            _ => false,
        }
    }
}
