//!
//! Defines the tree entity ([`Node`]) and related types.
//!
//! A `Node` is one element of the hierarchically addressed tree. It holds
//! ordinal fields (owner, visibility, last-modified), a map of localized
//! key/value pairs, and a map of child nodes. A node may exist as a
//! *skeleton* — only its path (and possibly visibility) is known and every
//! other access materializes it through a [`NodeLoader`] capability — or
//! as a *tombstone*, the retained marker of a deleted node that lets
//! deletion state propagate between partially replicated stores.
//!
//! All accessors return owned, independent copies; a fetched node is never
//! a window into engine-internal state.

pub mod errors;
pub mod value;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::path;

pub use errors::NodeError;
pub use value::NodeValue;

/// Capability used by skeleton nodes to fetch their full content.
///
/// A controller hands out loader handles; decoding a wire record takes one
/// explicitly via [`crate::codec::DecodeContext`]. Loader identity (by
/// `Arc` pointer) is part of skeleton equality.
pub trait NodeLoader: Send + Sync + std::fmt::Debug {
    /// Fetch the node (or its tombstone) stored under `path`.
    fn load(&self, path: &str) -> crate::Result<Node>;
}

#[derive(Debug)]
struct DetachedLoader;

impl NodeLoader for DetachedLoader {
    fn load(&self, path: &str) -> crate::Result<Node> {
        Err(NodeError::LoaderUnavailable {
            path: path.to_string(),
        }
        .into())
    }
}

static DETACHED: LazyLock<Arc<dyn NodeLoader>> = LazyLock::new(|| Arc::new(DetachedLoader));

/// A loader that fails every materialization attempt.
///
/// Used for skeletons handed out before any controller is attached; all
/// instances share one identity.
pub fn detached_loader() -> Arc<dyn NodeLoader> {
    Arc::clone(&DETACHED)
}

/// Visibility of a node under the traffic-light protocol.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Private to the owner.
    #[default]
    Red,
    /// Limited sharing.
    Amber,
    /// Community sharing.
    Green,
    /// Unlimited sharing.
    White,
}

impl Visibility {
    /// Canonical lowercase rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Red => "red",
            Visibility::Amber => "amber",
            Visibility::Green => "green",
            Visibility::White => "white",
        }
    }

    /// Parses a case-insensitive visibility name.
    pub fn parse(s: &str) -> Option<Visibility> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Some(Visibility::Red),
            "amber" => Some(Visibility::Amber),
            "green" => Some(Visibility::Green),
            "white" => Some(Visibility::White),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The searchable fields of a node and its values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Node owner identifier.
    Owner,
    /// Node name (last path segment).
    Name,
    /// Fully qualified node path.
    Path,
    /// Value key.
    Key,
    /// Default-locale value string.
    Value,
    /// Value type tag.
    Type,
    /// Node visibility.
    Visibility,
    /// Node modification stamp.
    LastModified,
}

impl Field {
    /// All fields, in declaration order.
    pub const ALL: [Field; 8] = [
        Field::Owner,
        Field::Name,
        Field::Path,
        Field::Key,
        Field::Value,
        Field::Type,
        Field::Visibility,
        Field::LastModified,
    ];

    /// Canonical field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Owner => "owner",
            Field::Name => "name",
            Field::Path => "path",
            Field::Key => "key",
            Field::Value => "value",
            Field::Type => "type",
            Field::Visibility => "visibility",
            Field::LastModified => "last_modified",
        }
    }

    /// Parses a canonical field name.
    pub fn parse(s: &str) -> Option<Field> {
        match s {
            "owner" => Some(Field::Owner),
            "name" => Some(Field::Name),
            "path" => Some(Field::Path),
            "key" => Some(Field::Key),
            "value" => Some(Field::Value),
            "type" => Some(Field::Type),
            "visibility" => Some(Field::Visibility),
            "last_modified" => Some(Field::LastModified),
            _ => None,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Materialized node content.
#[derive(Debug, Clone)]
pub(crate) struct NodeContent {
    pub(crate) owner: Option<String>,
    pub(crate) visibility: Visibility,
    pub(crate) last_modified: i64,
    pub(crate) tombstone: bool,
    pub(crate) values: BTreeMap<String, NodeValue>,
    pub(crate) children: BTreeMap<String, Node>,
}

/// Internal node state: reference-only skeleton or full content.
#[derive(Debug, Clone)]
pub(crate) enum NodeState {
    Skeleton {
        loader: Arc<dyn NodeLoader>,
        tombstone: bool,
        visibility: Option<Visibility>,
    },
    Materialized(NodeContent),
}

/// One node of the storage tree.
///
/// The path is immutable after construction; the name is always derivable
/// from it. All other state sits behind an internal lock so a node can be
/// shared across threads, and every read hands out an owned copy.
///
/// Equality: two skeletons are equal when their paths and loader handles
/// match; otherwise both sides are materialized and ordinals, values, and
/// the child *name* set are compared (full subtree comparison would be
/// unbounded). The last-modified stamp is excluded, as with
/// [`NodeValue`].
#[derive(Debug)]
pub struct Node {
    path: String,
    state: RwLock<NodeState>,
}

impl Node {
    /// Create an empty materialized node for the given path.
    pub fn new(path: impl Into<String>) -> Node {
        Node::with_visibility(path, Visibility::default())
    }

    /// Create an empty materialized node with an explicit visibility.
    pub fn with_visibility(path: impl Into<String>, visibility: Visibility) -> Node {
        Node {
            path: path.into(),
            state: RwLock::new(NodeState::Materialized(NodeContent {
                owner: None,
                visibility,
                last_modified: clock::now_millis(),
                tombstone: false,
                values: BTreeMap::new(),
                children: BTreeMap::new(),
            })),
        }
    }

    /// Create an empty materialized node from a name and a parent path
    /// (the empty string denotes the root).
    pub fn with_parent(name: &str, parent: &str) -> Node {
        Node::new(path::join(parent, name))
    }

    /// Create a skeleton node bound to a loader capability.
    pub fn skeleton(path: impl Into<String>, loader: Arc<dyn NodeLoader>) -> Node {
        Node::skeleton_with(path, loader, false, None)
    }

    /// Create a skeleton marked as a tombstone, optionally carrying the
    /// visibility the deleted node had.
    pub fn skeleton_tombstone(
        path: impl Into<String>,
        loader: Arc<dyn NodeLoader>,
        visibility: Option<Visibility>,
    ) -> Node {
        Node::skeleton_with(path, loader, true, visibility)
    }

    pub(crate) fn skeleton_with(
        path: impl Into<String>,
        loader: Arc<dyn NodeLoader>,
        tombstone: bool,
        visibility: Option<Visibility>,
    ) -> Node {
        Node {
            path: path.into(),
            state: RwLock::new(NodeState::Skeleton {
                loader,
                tombstone,
                visibility,
            }),
        }
    }

    /// Create a materialized tombstone: no owner, no values, no children,
    /// the original visibility preserved.
    pub fn tombstone(path: impl Into<String>, visibility: Visibility) -> Node {
        Node {
            path: path.into(),
            state: RwLock::new(NodeState::Materialized(NodeContent {
                owner: None,
                visibility,
                last_modified: clock::now_millis(),
                tombstone: true,
                values: BTreeMap::new(),
                children: BTreeMap::new(),
            })),
        }
    }

    pub(crate) fn from_parts(path: impl Into<String>, content: NodeContent) -> Node {
        Node {
            path: path.into(),
            state: RwLock::new(NodeState::Materialized(content)),
        }
    }

    /// The fully qualified path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The node name (last path segment).
    pub fn name(&self) -> &str {
        path::name_of(&self.path)
    }

    /// The parent path (empty string for top-level nodes).
    pub fn parent_path(&self) -> &str {
        path::parent_of(&self.path)
    }

    /// Whether this node is still an unmaterialized reference.
    pub fn is_skeleton(&self) -> bool {
        matches!(&*self.state.read().unwrap(), NodeState::Skeleton { .. })
    }

    /// Whether this node is the retained marker of a deleted node.
    ///
    /// Answerable without materialization: skeleton children carry the
    /// flag so deleted entries can be pruned cheaply.
    pub fn is_tombstone(&self) -> bool {
        match &*self.state.read().unwrap() {
            NodeState::Skeleton { tombstone, .. } => *tombstone,
            NodeState::Materialized(c) => c.tombstone,
        }
    }

    /// Materialize a skeleton in place through its loader.
    ///
    /// Idempotent; a no-op on already materialized nodes. The state lock
    /// is held across the load, so under concurrent calls exactly one
    /// caller fetches and the rest observe the result.
    pub fn materialize(&self) -> crate::Result<()> {
        {
            let state = self.state.read().unwrap();
            if matches!(&*state, NodeState::Materialized(_)) {
                return Ok(());
            }
        }
        let mut state = self.state.write().unwrap();
        if let NodeState::Skeleton { loader, .. } = &*state {
            let loader = Arc::clone(loader);
            let loaded = loader.load(&self.path)?;
            *state = NodeState::Materialized(loaded.into_content()?);
        }
        Ok(())
    }

    fn into_content(self) -> crate::Result<NodeContent> {
        match self.state.into_inner().unwrap() {
            NodeState::Materialized(content) => Ok(content),
            NodeState::Skeleton { .. } => Err(NodeError::MaterializeFailed {
                path: self.path,
            }
            .into()),
        }
    }

    fn with_content<R>(&self, f: impl FnOnce(&NodeContent) -> R) -> crate::Result<R> {
        self.materialize()?;
        match &*self.state.read().unwrap() {
            NodeState::Materialized(content) => Ok(f(content)),
            NodeState::Skeleton { .. } => Err(NodeError::MaterializeFailed {
                path: self.path.clone(),
            }
            .into()),
        }
    }

    fn with_content_mut<R>(&self, f: impl FnOnce(&mut NodeContent) -> R) -> crate::Result<R> {
        self.materialize()?;
        match &mut *self.state.write().unwrap() {
            NodeState::Materialized(content) => Ok(f(content)),
            NodeState::Skeleton { .. } => Err(NodeError::MaterializeFailed {
                path: self.path.clone(),
            }
            .into()),
        }
    }

    /// The owner identifier, if set.
    pub fn owner(&self) -> crate::Result<Option<String>> {
        self.with_content(|c| c.owner.clone())
    }

    /// Sets the owner, returning the previous one.
    pub fn set_owner(&self, owner: impl Into<String>) -> crate::Result<Option<String>> {
        let owner = owner.into();
        self.with_content_mut(|c| {
            let prev = c.owner.replace(owner);
            if prev != c.owner {
                c.last_modified = clock::now_millis();
            }
            prev
        })
    }

    /// The node's visibility.
    pub fn visibility(&self) -> crate::Result<Visibility> {
        self.with_content(|c| c.visibility)
    }

    /// Sets the visibility, returning the previous one.
    pub fn set_visibility(&self, visibility: Visibility) -> crate::Result<Visibility> {
        self.with_content_mut(|c| {
            let prev = std::mem::replace(&mut c.visibility, visibility);
            if prev != visibility {
                c.last_modified = clock::now_millis();
            }
            prev
        })
    }

    /// Milliseconds since epoch of the last ordinal or value change.
    pub fn last_modified(&self) -> crate::Result<i64> {
        self.with_content(|c| c.last_modified)
    }

    /// Overrides the modification stamp (used when restoring a node from
    /// a wire record or a replica).
    pub fn set_last_modified(&self, millis: i64) -> crate::Result<()> {
        self.with_content_mut(|c| c.last_modified = millis)
    }

    /// A copy of the value stored under `key`, if any.
    pub fn value(&self, key: &str) -> crate::Result<Option<NodeValue>> {
        self.with_content(|c| c.values.get(key).cloned())
    }

    /// A copy of all values, keyed by value key.
    pub fn values(&self) -> crate::Result<BTreeMap<String, NodeValue>> {
        self.with_content(|c| c.values.clone())
    }

    /// Adds a key/value pair; the key must not exist yet.
    pub fn add_value(&self, value: NodeValue) -> crate::Result<()> {
        let path = self.path.clone();
        let result = self.with_content_mut(|c| {
            if c.values.contains_key(value.key()) {
                return Err(NodeError::ValueAlreadyExists {
                    key: value.key().to_string(),
                    path,
                });
            }
            c.values.insert(value.key().to_string(), value);
            c.last_modified = clock::now_millis();
            Ok(())
        })?;
        result.map_err(Into::into)
    }

    /// Replaces an existing key/value pair, returning the previous one.
    pub fn update_value(&self, value: NodeValue) -> crate::Result<NodeValue> {
        let path = self.path.clone();
        let result = self.with_content_mut(|c| {
            if !c.values.contains_key(value.key()) {
                return Err(NodeError::ValueNotFound {
                    key: value.key().to_string(),
                    path,
                });
            }
            c.last_modified = clock::now_millis();
            match c.values.insert(value.key().to_string(), value) {
                Some(prev) => Ok(prev),
                None => unreachable!("presence checked above"),
            }
        })?;
        result.map_err(Into::into)
    }

    /// Removes a value, returning it if it was present.
    pub fn remove_value(&self, key: &str) -> crate::Result<Option<NodeValue>> {
        self.with_content_mut(|c| {
            let removed = c.values.remove(key);
            if removed.is_some() {
                c.last_modified = clock::now_millis();
            }
            removed
        })
    }

    /// Adds a child node. A no-op if a child with that name already
    /// exists (the mapper enforces global uniqueness).
    pub fn add_child(&self, child: Node) -> crate::Result<()> {
        self.with_content_mut(|c| {
            let name = child.name().to_string();
            c.children.entry(name).or_insert(child);
        })
    }

    /// Removes a child entry by name.
    pub fn remove_child(&self, name: &str) -> crate::Result<Option<Node>> {
        self.with_content_mut(|c| c.children.remove(name))
    }

    /// A copy of the child with the given name, if any.
    pub fn child(&self, name: &str) -> crate::Result<Option<Node>> {
        self.with_content(|c| c.children.get(name).cloned())
    }

    /// Copies of all children, keyed by name. Children are typically
    /// skeleton references.
    pub fn children(&self) -> crate::Result<BTreeMap<String, Node>> {
        self.with_content(|c| c.children.clone())
    }

    /// The sorted child names.
    pub fn child_names(&self) -> crate::Result<Vec<String>> {
        self.with_content(|c| c.children.keys().cloned().collect())
    }

    /// The child names as a comma-separated list.
    pub fn child_names_csv(&self) -> crate::Result<String> {
        self.with_content(|c| {
            c.children
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",")
        })
    }

    /// Replace this node's content from `other`.
    ///
    /// If `other` is a skeleton nothing but the (already identical) name
    /// would be copied, so the call is a no-op and existing content is
    /// retained. Otherwise all ordinals, values, and children are taken
    /// from `other`, including its modification stamp.
    pub fn update_from(&self, other: &Node) -> crate::Result<()> {
        let content = {
            let state = other.state.read().unwrap();
            match &*state {
                NodeState::Skeleton { .. } => return Ok(()),
                NodeState::Materialized(c) => c.clone(),
            }
        };
        let mut state = self.state.write().unwrap();
        *state = NodeState::Materialized(content);
        Ok(())
    }

    /// Full independent copy, including all descendants and values.
    pub fn deep_clone(&self) -> Node {
        self.clone()
    }

    pub(crate) fn state_clone(&self) -> NodeState {
        self.state.read().unwrap().clone()
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Node {
            path: self.path.clone(),
            state: RwLock::new(self.state_clone()),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.path != other.path {
            return false;
        }
        {
            let a = self.state.read().unwrap();
            let b = other.state.read().unwrap();
            if let (
                NodeState::Skeleton {
                    loader: la,
                    tombstone: ta,
                    ..
                },
                NodeState::Skeleton {
                    loader: lb,
                    tombstone: tb,
                    ..
                },
            ) = (&*a, &*b)
            {
                return Arc::ptr_eq(la, lb) && ta == tb;
            }
        }
        // One side is materialized, so both are compared materialized. A
        // failed materialization compares as not-equal.
        if self.materialize().is_err() || other.materialize().is_err() {
            return false;
        }
        let a = self.state.read().unwrap();
        let b = other.state.read().unwrap();
        match (&*a, &*b) {
            (NodeState::Materialized(ca), NodeState::Materialized(cb)) => {
                ca.owner == cb.owner
                    && ca.visibility == cb.visibility
                    && ca.tombstone == cb.tombstone
                    && ca.values == cb.values
                    && ca.children.keys().eq(cb.children.keys())
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().unwrap();
        match &*state {
            NodeState::Skeleton { tombstone, .. } => {
                write!(
                    f,
                    "{}[{}]",
                    self.path,
                    if *tombstone { "tombstone" } else { "skeleton" }
                )
            }
            NodeState::Materialized(c) => {
                write!(
                    f,
                    "{}[owner={};vis={}]{{",
                    self.path,
                    c.owner.as_deref().unwrap_or(""),
                    c.visibility
                )?;
                let mut first = true;
                for value in c.values.values() {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                    first = false;
                }
                write!(f, "}}")
            }
        }
    }
}
