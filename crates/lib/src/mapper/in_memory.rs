//! A non-durable mapper keeping the whole tree in memory.
//!
//! Suitable for tests, development, and embedders that handle persistence
//! externally: the full state can be snapshotted to and restored from a
//! JSON file via [`InMemoryMapper::save_to_file`] and
//! [`InMemoryMapper::load_from_file`].

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::Path as FsPath;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::mapper::{MapperError, StorageMapper};
use crate::node::{self, Node, NodeContent, NodeLoader, NodeValue, Visibility};
use crate::path;
use crate::search::SearchCriteria;

/// Flat per-path record. Child relationships are kept as name sets and
/// resolved to skeleton nodes when a node is fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    owner: Option<String>,
    visibility: Visibility,
    last_modified: i64,
    tombstone: bool,
    values: BTreeMap<String, NodeValue>,
    children: BTreeSet<String>,
}

impl StoredNode {
    fn root() -> Self {
        StoredNode {
            owner: None,
            visibility: Visibility::default(),
            last_modified: 0,
            tombstone: false,
            values: BTreeMap::new(),
            children: BTreeSet::new(),
        }
    }
}

/// A simple in-memory mapper implementation using a `HashMap` for
/// storage, serialized behind a single read-write lock.
///
/// The root path `""` is a real stored record so the parent-existence
/// rule needs no special cases; `zap` reseeds it.
#[derive(Debug)]
pub struct InMemoryMapper {
    nodes: RwLock<HashMap<String, StoredNode>>,
    loader: RwLock<Option<Arc<dyn NodeLoader>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMapper {
    /// Creates a new, empty `InMemoryMapper`.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a mapper stamping tombstones with the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), StoredNode::root());
        Self {
            nodes: RwLock::new(nodes),
            loader: RwLock::new(None),
            clock,
        }
    }

    /// Saves the entire mapper state to a file as JSON.
    pub fn save_to_file<P: AsRef<FsPath>>(&self, file: P) -> crate::Result<()> {
        let nodes = self.nodes.read().unwrap();
        let json = serde_json::to_string_pretty(&*nodes)
            .map_err(|e| MapperError::backend("failed to serialize snapshot", e))?;
        fs::write(&file, json).map_err(|e| MapperError::backend("failed to write snapshot", e))?;
        tracing::debug!(file = %file.as_ref().display(), records = nodes.len(), "saved snapshot");
        Ok(())
    }

    /// Loads mapper state from a JSON snapshot file.
    ///
    /// A missing file yields a new, empty mapper.
    pub fn load_from_file<P: AsRef<FsPath>>(file: P) -> crate::Result<Self> {
        if !file.as_ref().exists() {
            return Ok(Self::new());
        }
        let json = fs::read_to_string(&file)
            .map_err(|e| MapperError::backend("failed to read snapshot", e))?;
        let mut nodes: HashMap<String, StoredNode> = serde_json::from_str(&json)
            .map_err(|e| MapperError::backend("failed to parse snapshot", e))?;
        nodes.entry(String::new()).or_insert_with(StoredNode::root);
        tracing::debug!(file = %file.as_ref().display(), records = nodes.len(), "loaded snapshot");
        Ok(Self {
            nodes: RwLock::new(nodes),
            loader: RwLock::new(None),
            clock: Arc::new(SystemClock),
        })
    }

    /// Number of stored records, tombstones included, the root excluded.
    pub fn len(&self) -> usize {
        self.nodes.read().unwrap().len().saturating_sub(1)
    }

    /// Whether nothing but the root record is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current_loader(&self) -> Arc<dyn NodeLoader> {
        self.loader
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(node::detached_loader)
    }

    fn check_path(path: &str) -> Result<(), MapperError> {
        if path::is_valid(path) {
            Ok(())
        } else {
            Err(MapperError::InvalidPath {
                path: path.to_string(),
            })
        }
    }

    /// Materializes a stored record, resolving children to skeletons so
    /// the caller can prune or lazily fetch them.
    fn build_node(
        nodes: &HashMap<String, StoredNode>,
        node_path: &str,
        stored: &StoredNode,
        loader: &Arc<dyn NodeLoader>,
    ) -> Node {
        if stored.tombstone {
            return Node::from_parts(
                node_path,
                NodeContent {
                    owner: None,
                    visibility: stored.visibility,
                    last_modified: stored.last_modified,
                    tombstone: true,
                    values: BTreeMap::new(),
                    children: BTreeMap::new(),
                },
            );
        }
        let mut children = BTreeMap::new();
        for name in &stored.children {
            let child_path = path::join(node_path, name);
            if let Some(child) = nodes.get(&child_path) {
                children.insert(
                    name.clone(),
                    Node::skeleton_with(
                        child_path,
                        Arc::clone(loader),
                        child.tombstone,
                        Some(child.visibility),
                    ),
                );
            }
        }
        Node::from_parts(
            node_path,
            NodeContent {
                owner: stored.owner.clone(),
                visibility: stored.visibility,
                last_modified: stored.last_modified,
                tombstone: false,
                values: stored.values.clone(),
                children,
            },
        )
    }

    /// Live (non-tombstone) child names of a record.
    fn live_children(
        nodes: &HashMap<String, StoredNode>,
        node_path: &str,
        stored: &StoredNode,
    ) -> Vec<String> {
        stored
            .children
            .iter()
            .filter(|name| {
                nodes
                    .get(&path::join(node_path, name))
                    .is_some_and(|c| !c.tombstone)
            })
            .cloned()
            .collect()
    }
}

impl StorageMapper for InMemoryMapper {
    fn set_loader(&self, loader: Arc<dyn NodeLoader>) {
        *self.loader.write().unwrap() = Some(loader);
    }

    fn get(&self, node_path: &str) -> crate::Result<Node> {
        Self::check_path(node_path)?;
        let nodes = self.nodes.read().unwrap();
        let stored = nodes.get(node_path).ok_or_else(|| MapperError::NotFound {
            path: node_path.to_string(),
        })?;
        Ok(Self::build_node(
            &nodes,
            node_path,
            stored,
            &self.current_loader(),
        ))
    }

    fn add(&self, node: &Node) -> crate::Result<()> {
        let node_path = node.path().to_string();
        Self::check_path(&node_path)?;
        if node.is_skeleton() {
            return Err(MapperError::SkeletonWrite { path: node_path }.into());
        }
        let owner = node.owner()?;
        let visibility = node.visibility()?;
        let last_modified = node.last_modified()?;
        let values = node.values()?;

        let mut nodes = self.nodes.write().unwrap();
        if nodes.get(&node_path).is_some_and(|n| !n.tombstone) {
            return Err(MapperError::AlreadyExists { path: node_path }.into());
        }
        let parent = path::parent_of(&node_path).to_string();
        if !node_path.is_empty() && !nodes.get(&parent).is_some_and(|p| !p.tombstone) {
            return Err(MapperError::ParentMissing { parent }.into());
        }
        // payload children are not registered here; the controller
        // cascades them as separate adds
        nodes.insert(
            node_path.clone(),
            StoredNode {
                owner,
                visibility,
                last_modified,
                tombstone: false,
                values,
                children: BTreeSet::new(),
            },
        );
        if !node_path.is_empty()
            && let Some(parent_record) = nodes.get_mut(&parent)
        {
            parent_record.children.insert(path::name_of(&node_path).to_string());
        }
        Ok(())
    }

    fn update(&self, node: &Node) -> crate::Result<()> {
        let node_path = node.path().to_string();
        Self::check_path(&node_path)?;
        if node.is_skeleton() {
            return Err(MapperError::SkeletonWrite { path: node_path }.into());
        }
        let owner = node.owner()?;
        let visibility = node.visibility()?;
        let last_modified = node.last_modified()?;
        let values = node.values()?;

        let mut nodes = self.nodes.write().unwrap();
        let stored = nodes
            .get_mut(&node_path)
            .filter(|n| !n.tombstone)
            .ok_or(MapperError::NotFound { path: node_path })?;
        stored.owner = owner;
        stored.visibility = visibility;
        stored.last_modified = last_modified;
        stored.values = values;
        Ok(())
    }

    fn delete(&self, node_path: &str) -> crate::Result<Node> {
        Self::check_path(node_path)?;
        let mut nodes = self.nodes.write().unwrap();
        let stored = nodes
            .get(node_path)
            .filter(|n| !n.tombstone)
            .ok_or_else(|| MapperError::NotFound {
                path: node_path.to_string(),
            })?;
        if !Self::live_children(&nodes, node_path, stored).is_empty() {
            return Err(MapperError::HasChildren {
                path: node_path.to_string(),
            }
            .into());
        }
        let removed = Self::build_node(&nodes, node_path, stored, &self.current_loader());
        let visibility = stored.visibility;
        nodes.insert(
            node_path.to_string(),
            StoredNode {
                owner: None,
                visibility,
                last_modified: self.clock.now_millis(),
                tombstone: true,
                values: BTreeMap::new(),
                children: BTreeSet::new(),
            },
        );
        // the tombstone stays listed under its parent; readers prune it
        Ok(removed)
    }

    fn get_value(&self, node_path: &str, key: &str) -> crate::Result<Option<NodeValue>> {
        Self::check_path(node_path)?;
        let nodes = self.nodes.read().unwrap();
        let stored = nodes
            .get(node_path)
            .filter(|n| !n.tombstone)
            .ok_or_else(|| MapperError::NotFound {
                path: node_path.to_string(),
            })?;
        Ok(stored.values.get(key).cloned())
    }

    fn rename(&self, old_path: &str, new_path: &str) -> crate::Result<()> {
        Self::check_path(old_path)?;
        Self::check_path(new_path)?;
        if old_path.is_empty()
            || new_path.is_empty()
            || new_path == old_path
            || new_path.starts_with(&format!("{old_path}:"))
        {
            return Err(MapperError::InvalidPath {
                path: new_path.to_string(),
            }
            .into());
        }

        let mut nodes = self.nodes.write().unwrap();
        if !nodes.get(old_path).is_some_and(|n| !n.tombstone) {
            return Err(MapperError::NotFound {
                path: old_path.to_string(),
            }
            .into());
        }
        if nodes.get(new_path).is_some_and(|n| !n.tombstone) {
            return Err(MapperError::AlreadyExists {
                path: new_path.to_string(),
            }
            .into());
        }
        let new_parent = path::parent_of(new_path).to_string();
        if !nodes.get(&new_parent).is_some_and(|p| !p.tombstone) {
            return Err(MapperError::ParentMissing { parent: new_parent }.into());
        }

        // collect the live subtree, parents before children
        let mut subtree = Vec::new();
        let mut queue = VecDeque::from([old_path.to_string()]);
        while let Some(current) = queue.pop_front() {
            if let Some(stored) = nodes.get(&current) {
                for name in Self::live_children(&nodes, &current, stored) {
                    queue.push_back(path::join(&current, &name));
                }
                subtree.push(current);
            }
        }

        // copy records to the new location first, then tombstone the old
        // ones; a crash in between can leave both subtrees (documented
        // best-effort semantics)
        for old_sub in &subtree {
            let new_sub = format!("{new_path}{}", &old_sub[old_path.len()..]);
            let stored = &nodes[old_sub];
            let copied = StoredNode {
                owner: stored.owner.clone(),
                visibility: stored.visibility,
                last_modified: stored.last_modified,
                tombstone: false,
                values: stored.values.clone(),
                children: Self::live_children(&nodes, old_sub, stored)
                    .into_iter()
                    .collect(),
            };
            nodes.insert(new_sub, copied);
        }
        if let Some(parent_record) = nodes.get_mut(&new_parent) {
            parent_record
                .children
                .insert(path::name_of(new_path).to_string());
        }
        for old_sub in subtree.iter().rev() {
            let visibility = nodes[old_sub].visibility;
            nodes.insert(
                old_sub.clone(),
                StoredNode {
                    owner: None,
                    visibility,
                    last_modified: self.clock.now_millis(),
                    tombstone: true,
                    values: BTreeMap::new(),
                    children: BTreeSet::new(),
                },
            );
        }
        Ok(())
    }

    fn search(&self, criteria: &SearchCriteria) -> crate::Result<Vec<Node>> {
        let nodes = self.nodes.read().unwrap();
        let loader = self.current_loader();
        let mut result = Vec::new();
        for (node_path, stored) in nodes.iter() {
            let node = Self::build_node(&nodes, node_path, stored, &loader);
            if criteria.evaluate(&node)? {
                result.push(node);
            }
        }
        result.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(result)
    }

    fn flush(&self) -> crate::Result<()> {
        // nothing buffered, state lives in memory only
        Ok(())
    }

    fn close(&self) -> crate::Result<()> {
        Ok(())
    }

    fn zap(&self) -> crate::Result<()> {
        let mut nodes = self.nodes.write().unwrap();
        nodes.clear();
        nodes.insert(String::new(), StoredNode::root());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
