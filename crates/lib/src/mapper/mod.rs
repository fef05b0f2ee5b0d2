//! Storage mapper implementations for Trellis persistence.
//!
//! This module provides the core [`StorageMapper`] trait and the
//! in-memory implementation. The trait defines the interface for
//! persisting and querying [`Node`] trees, keeping the controller
//! independent of the specific storage mechanism (SQL-backed mappers live
//! outside this crate and implement the same trait).
//!
//! Parent/child consistency is the mapper's responsibility: a node can
//! only be added below an existing parent, and only leaf nodes can be
//! deleted. Deletion replaces the record with a tombstone so deletion
//! state can propagate during partial replication.

pub mod errors;
pub mod in_memory;

use std::any::Any;
use std::sync::Arc;

use crate::node::{Node, NodeLoader, NodeValue};
use crate::search::SearchCriteria;

pub use errors::MapperError;
pub use in_memory::InMemoryMapper;

/// Interface between the controller and a persistence backend.
///
/// All methods take `&self`; implementations synchronize internally (the
/// reference mappers serialize access with a single coarse lock). Every
/// returned [`Node`] is an independent copy — callers never observe live
/// backend state.
pub trait StorageMapper: Send + Sync + Any {
    /// Binds the loader capability used for the skeleton children this
    /// mapper hands out. Called once by the owning controller.
    fn set_loader(&self, loader: Arc<dyn NodeLoader>);

    /// Fetch the node stored under `path`; a deleted node is returned as
    /// its tombstone.
    fn get(&self, path: &str) -> crate::Result<Node>;

    /// Store a new node. Fails with `AlreadyExists` if a live node holds
    /// the path and `ParentMissing` if the parent path is absent.
    fn add(&self, node: &Node) -> crate::Result<()>;

    /// Replace the content of an existing live node.
    fn update(&self, node: &Node) -> crate::Result<()>;

    /// Remove the leaf node under `path`, leaving a tombstone. Returns
    /// the removed node; fails with `HasChildren` for non-leaf nodes.
    fn delete(&self, path: &str) -> crate::Result<Node>;

    /// Fetch a single value from the node under `path`.
    fn get_value(&self, path: &str, key: &str) -> crate::Result<Option<NodeValue>>;

    /// Move the subtree rooted at `old_path` to `new_path`, including all
    /// descendants. The old records become tombstones.
    fn rename(&self, old_path: &str, new_path: &str) -> crate::Result<()>;

    /// All stored nodes matching the criteria.
    fn search(&self, criteria: &SearchCriteria) -> crate::Result<Vec<Node>>;

    /// Flush buffered state to durable storage.
    fn flush(&self) -> crate::Result<()>;

    /// Close the backend, flushing all data.
    fn close(&self) -> crate::Result<()>;

    /// Truncate all stored state.
    fn zap(&self) -> crate::Result<()>;

    /// Dynamic access to the concrete mapper type.
    fn as_any(&self) -> &dyn Any;
}
